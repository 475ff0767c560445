//! Stateful editor session exposed to JavaScript
//!
//! The core session sits behind `Rc<RefCell<..>>` so that renders and
//! exports can run as promises while the UI keeps calling in. No borrow is
//! held across an await: the session hands out an owned render request or
//! export job and the async part works on that.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Object, Promise, Reflect, Uint8Array, Uint8ClampedArray};
use pdfscrub_core::edits::EditLog;
use pdfscrub_core::{
    CanvasPoint, EditorSession, FontBook, PdfPoint, RenderError, ScrubConfig, Surface, TextStyle,
    Tool,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::renderer::JsPageRenderer;

/// Editor session for one open document
#[wasm_bindgen]
pub struct ScrubSession {
    inner: Rc<RefCell<EditorSession>>,
    fonts: Rc<FontBook>,
}

#[wasm_bindgen]
impl ScrubSession {
    /// Create a new session with browser defaults
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        // No font directories in the browser; fonts arrive via registerFont
        let config = ScrubConfig::default();
        Self {
            inner: Rc::new(RefCell::new(EditorSession::new(&config))),
            fonts: Rc::new(FontBook::new()),
        }
    }

    /// Open a document, replacing the current one and its edits.
    ///
    /// Returns the document info (name, page count, page sizes).
    #[wasm_bindgen(js_name = openDocument)]
    pub fn open_document(
        &self,
        name: &str,
        mime: Option<String>,
        bytes: &[u8],
    ) -> Result<JsValue, JsValue> {
        let mut session = self.inner.borrow_mut();
        let info = session
            .open(name, mime.as_deref(), bytes.to_vec())
            .map_err(to_js_error)?;
        to_js_value(info)
    }

    #[wasm_bindgen(js_name = closeDocument)]
    pub fn close_document(&self) {
        self.inner.borrow_mut().close();
    }

    #[wasm_bindgen(getter, js_name = isLoaded)]
    pub fn is_loaded(&self) -> bool {
        self.inner.borrow().is_loaded()
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.inner.borrow().page_count()
    }

    #[wasm_bindgen(getter, js_name = currentPage)]
    pub fn current_page(&self) -> u32 {
        self.inner.borrow().page()
    }

    #[wasm_bindgen(getter)]
    pub fn zoom(&self) -> f64 {
        self.inner.borrow().zoom()
    }

    #[wasm_bindgen(getter)]
    pub fn tool(&self) -> String {
        self.inner.borrow().tool().name().to_string()
    }

    /// True while an export runs; editing controls should be disabled
    #[wasm_bindgen(getter, js_name = isBusy)]
    pub fn is_busy(&self) -> bool {
        self.inner.borrow().is_busy()
    }

    #[wasm_bindgen(getter, js_name = lastError)]
    pub fn last_error(&self) -> Option<String> {
        self.inner.borrow().last_error().map(str::to_string)
    }

    #[wasm_bindgen(js_name = clearError)]
    pub fn clear_error(&self) {
        self.inner.borrow_mut().clear_error();
    }

    /// Document info of the open document, or null
    #[wasm_bindgen(js_name = documentInfo)]
    pub fn document_info(&self) -> Result<JsValue, JsValue> {
        match self.inner.borrow().info() {
            Some(info) => to_js_value(info),
            None => Ok(JsValue::NULL),
        }
    }

    /// Source bytes of the open document, for handing to pdf.js
    #[wasm_bindgen(js_name = getDocumentBytes)]
    pub fn get_document_bytes(&self) -> Option<Vec<u8>> {
        self.inner
            .borrow()
            .document()
            .map(|doc| doc.bytes().to_vec())
    }

    /// Select "cursor", "blur", "erase" or "text"
    #[wasm_bindgen(js_name = setTool)]
    pub fn set_tool(&self, name: &str) -> Result<(), JsValue> {
        let tool = parse_tool(name)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown tool: {}", name)))?;
        self.inner.borrow_mut().set_tool(tool);
        Ok(())
    }

    /// Returns the zoom actually applied after clamping
    #[wasm_bindgen(js_name = setZoom)]
    pub fn set_zoom(&self, zoom: f64) -> Result<f64, JsValue> {
        self.inner.borrow_mut().set_zoom(zoom).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = zoomIn)]
    pub fn zoom_in(&self) -> Result<f64, JsValue> {
        self.inner.borrow_mut().zoom_in().map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = zoomOut)]
    pub fn zoom_out(&self) -> Result<f64, JsValue> {
        self.inner.borrow_mut().zoom_out().map_err(to_js_error)
    }

    /// Go to a page (1-indexed)
    #[wasm_bindgen(js_name = setPage)]
    pub fn set_page(&self, page: u32) -> Result<(), JsValue> {
        self.inner.borrow_mut().set_page(page).map_err(to_js_error)
    }

    /// Size of the current view: `{ width, height, scale }` in canvas pixels
    #[wasm_bindgen(js_name = viewSize)]
    pub fn view_size(&self) -> Result<JsValue, JsValue> {
        let viewport = self.inner.borrow().viewport().map_err(to_js_error)?;
        let (width, height) = viewport.pixel_size();
        let obj = Object::new();
        set_field(&obj, "width", &JsValue::from(width))?;
        set_field(&obj, "height", &JsValue::from(height))?;
        set_field(&obj, "scale", &JsValue::from(viewport.scale()))?;
        Ok(obj.into())
    }

    #[wasm_bindgen(js_name = canvasToPdf)]
    pub fn canvas_to_pdf(&self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        let viewport = self.inner.borrow().viewport().map_err(to_js_error)?;
        to_js_value(&viewport.canvas_to_pdf(CanvasPoint::new(x, y)))
    }

    #[wasm_bindgen(js_name = pdfToCanvas)]
    pub fn pdf_to_canvas(&self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        let viewport = self.inner.borrow().viewport().map_err(to_js_error)?;
        to_js_value(&viewport.pdf_to_canvas(PdfPoint::new(x, y)))
    }

    /// Finish a blur/erase drag between two canvas points.
    ///
    /// Returns the new edit id, or undefined when the drag had no area.
    #[wasm_bindgen(js_name = commitDrag)]
    pub fn commit_drag(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Option<u64>, JsValue> {
        self.inner
            .borrow_mut()
            .commit_drag(CanvasPoint::new(x1, y1), CanvasPoint::new(x2, y2))
            .map_err(to_js_error)
    }

    /// Start placing text at a canvas click. Returns `{ page, anchor, canvas }`.
    #[wasm_bindgen(js_name = beginText)]
    pub fn begin_text(&self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        let pending = self
            .inner
            .borrow_mut()
            .begin_text(CanvasPoint::new(x, y))
            .map_err(to_js_error)?;
        to_js_value(&pending)
    }

    /// Confirm the pending text. Missing style fields keep their last value.
    #[wasm_bindgen(js_name = confirmText)]
    pub fn confirm_text(
        &self,
        text: &str,
        font_size: Option<f64>,
        font_family: Option<String>,
        color: Option<String>,
    ) -> Result<Option<u64>, JsValue> {
        let mut session = self.inner.borrow_mut();
        let style = merge_style(session.text_style(), font_size, font_family, color);
        session.confirm_text(text, Some(style)).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = cancelText)]
    pub fn cancel_text(&self) {
        self.inner.borrow_mut().cancel_text();
    }

    /// Current text style `{ font_size, font_family, color }`
    #[wasm_bindgen(js_name = textStyle)]
    pub fn text_style(&self) -> Result<JsValue, JsValue> {
        to_js_value(self.inner.borrow().text_style())
    }

    /// Edits on the current page, in drawing order
    #[wasm_bindgen(js_name = pageEdits)]
    pub fn page_edits(&self) -> Result<JsValue, JsValue> {
        let session = self.inner.borrow();
        let edits: Vec<_> = session.page_edits().collect();
        to_js_value(&edits)
    }

    #[wasm_bindgen(getter, js_name = editCount)]
    pub fn edit_count(&self) -> usize {
        self.inner.borrow().edits().len()
    }

    /// Serialize all edits as JSON
    #[wasm_bindgen(js_name = getEditsJson)]
    pub fn get_edits_json(&self) -> Result<String, JsValue> {
        self.inner
            .borrow()
            .edits()
            .to_json()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Append edits from JSON to the open document. Returns how many were added.
    ///
    /// Nothing is added when any edit targets a page the document lacks.
    #[wasm_bindgen(js_name = loadEditsJson)]
    pub fn load_edits_json(&self, json: &str) -> Result<usize, JsValue> {
        let log = EditLog::from_json(json).map_err(to_js_error)?;
        let ids = self.inner.borrow_mut().add_edits(&log).map_err(to_js_error)?;
        Ok(ids.len())
    }

    /// Make a font available for text edits under `family`
    #[wasm_bindgen(js_name = registerFont)]
    pub fn register_font(&mut self, family: &str, bytes: &[u8]) -> Result<(), JsValue> {
        let fonts = Rc::get_mut(&mut self.fonts)
            .ok_or_else(|| JsValue::from_str("Cannot register fonts while rendering"))?;
        fonts
            .register(family, bytes.to_vec())
            .map_err(to_js_error)
    }

    /// Render the current page with its edits.
    ///
    /// `callback(page, scale, width, height)` must resolve to ImageData for
    /// the bare page. The promise resolves to `{ width, height, data }`, or
    /// to null when a later render, page change or zoom change superseded it.
    #[wasm_bindgen(js_name = renderPage)]
    pub fn render_page(&self, callback: Function) -> Result<Promise, JsValue> {
        let request = self
            .inner
            .borrow_mut()
            .begin_render()
            .map_err(to_js_error)?;
        let fonts = Rc::clone(&self.fonts);
        let renderer = JsPageRenderer::new(callback);

        Ok(future_to_promise(async move {
            match request.render(&renderer, &fonts).await {
                Ok(surface) => image_data(&surface),
                Err(RenderError::Cancelled) => Ok(JsValue::NULL),
                Err(e) => {
                    web_sys::console::warn_1(&JsValue::from_str(&format!(
                        "Page {} failed to render: {}",
                        request.page, e
                    )));
                    Err(to_js_error(e))
                }
            }
        }))
    }

    /// Drop any render in flight
    #[wasm_bindgen(js_name = cancelRender)]
    pub fn cancel_render(&self) {
        self.inner.borrow_mut().cancel_render();
    }

    /// Flatten all pages with their edits into a new PDF.
    ///
    /// Resolves to the PDF bytes. `progress(done, total)` is called after
    /// each page. The session is busy until the promise settles.
    #[wasm_bindgen(js_name = exportPdf)]
    pub fn export_pdf(&self, callback: Function, progress: Option<Function>) -> Result<Promise, JsValue> {
        let job = self
            .inner
            .borrow_mut()
            .begin_export()
            .map_err(to_js_error)?;
        let inner = Rc::clone(&self.inner);
        let fonts = Rc::clone(&self.fonts);
        let renderer = JsPageRenderer::new(callback);

        Ok(future_to_promise(async move {
            let mut report = |done: u32, total: u32| {
                if let Some(cb) = &progress {
                    let _ = cb.call2(&JsValue::NULL, &JsValue::from(done), &JsValue::from(total));
                }
            };
            let result = job.run(&renderer, &fonts, &mut report).await;
            let bytes = inner
                .borrow_mut()
                .finish_export(result)
                .map_err(to_js_error)?;
            Ok(Uint8Array::from(bytes.as_slice()).into())
        }))
    }

    /// Suggested download name, e.g. "report_edited.pdf"
    #[wasm_bindgen(js_name = exportFileName)]
    pub fn export_file_name(&self) -> String {
        self.inner.borrow().export_file_name()
    }
}

impl Default for ScrubSession {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_tool(name: &str) -> Option<Tool> {
    match name.to_ascii_lowercase().as_str() {
        "cursor" | "select" => Some(Tool::Cursor),
        "blur" => Some(Tool::Blur),
        "erase" => Some(Tool::Erase),
        "text" => Some(Tool::Text),
        _ => None,
    }
}

fn merge_style(
    current: &TextStyle,
    font_size: Option<f64>,
    font_family: Option<String>,
    color: Option<String>,
) -> TextStyle {
    TextStyle {
        font_size: font_size
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(current.font_size),
        font_family: font_family
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| current.font_family.clone()),
        color: color
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| current.color.clone()),
    }
}

fn image_data(surface: &Surface) -> Result<JsValue, JsValue> {
    let (width, height) = surface.size();
    let obj = Object::new();
    set_field(&obj, "width", &JsValue::from(width))?;
    set_field(&obj, "height", &JsValue::from(height))?;
    let data = Uint8ClampedArray::from(surface.to_rgba().as_slice());
    set_field(&obj, "data", &data.into())?;
    Ok(obj.into())
}

fn set_field(obj: &Object, key: &str, value: &JsValue) -> Result<(), JsValue> {
    Reflect::set(obj, &JsValue::from_str(key), value).map(|_| ())
}

fn to_js_value<T: serde::Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}
