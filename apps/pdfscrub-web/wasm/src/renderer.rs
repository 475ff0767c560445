//! Page rasterization through a JavaScript callback
//!
//! The callback receives `(page, scale, width, height)` and returns (or
//! resolves to) an ImageData-like object `{ width, height, data }` holding
//! straight RGBA pixels, which is what pdf.js plus `getImageData` produce.
//! Pages are drawn as displayed, `/Rotate` included, as pdf.js
//! `getViewport({ scale })` does by default.

use async_trait::async_trait;
use js_sys::{Array, Function, Promise, Reflect, Uint8Array};
use pdfscrub_core::render::{check_bitmap_size, PageRenderer};
use pdfscrub_core::{RenderError, Surface, Viewport};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

pub struct JsPageRenderer {
    callback: Function,
}

impl JsPageRenderer {
    pub fn new(callback: Function) -> Self {
        Self { callback }
    }
}

#[async_trait(?Send)]
impl PageRenderer for JsPageRenderer {
    async fn render_page(&self, page: u32, viewport: &Viewport) -> Result<Surface, RenderError> {
        let (width, height) = viewport.pixel_size();
        let args = Array::of4(
            &JsValue::from(page),
            &JsValue::from(viewport.scale()),
            &JsValue::from(width),
            &JsValue::from(height),
        );

        let result = self
            .callback
            .apply(&JsValue::NULL, &args)
            .map_err(|e| RenderError::Failed(js_error_message(&e)))?;

        // Plain values resolve immediately
        let image = JsFuture::from(Promise::resolve(&result))
            .await
            .map_err(|e| RenderError::Failed(js_error_message(&e)))?;

        let (got_width, got_height, data) = read_image_data(&image)?;
        check_bitmap_size(viewport, got_width, got_height)?;
        Surface::from_rgba(got_width, got_height, data)
    }
}

fn read_image_data(image: &JsValue) -> Result<(u32, u32, Vec<u8>), RenderError> {
    if image.is_null() || image.is_undefined() {
        return Err(RenderError::Failed(
            "render callback returned no image".to_string(),
        ));
    }

    let width = read_dimension(image, "width")?;
    let height = read_dimension(image, "height")?;
    let data = Reflect::get(image, &JsValue::from_str("data"))
        .map_err(|e| RenderError::Failed(js_error_message(&e)))?;
    if data.is_null() || data.is_undefined() {
        return Err(RenderError::Failed("image has no pixel data".to_string()));
    }

    // Copies out of a Uint8ClampedArray or Uint8Array alike
    let bytes = Uint8Array::new(&data).to_vec();
    Ok((width, height, bytes))
}

fn read_dimension(image: &JsValue, key: &str) -> Result<u32, RenderError> {
    let value = Reflect::get(image, &JsValue::from_str(key))
        .map_err(|e| RenderError::Failed(js_error_message(&e)))?;
    match value.as_f64() {
        Some(n) if n.is_finite() && n >= 1.0 && n.fract() == 0.0 => Ok(n as u32),
        _ => Err(RenderError::Failed(format!("image has no valid {key}"))),
    }
}

/// Best-effort message from a thrown JS value
pub(crate) fn js_error_message(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    Reflect::get(value, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}
