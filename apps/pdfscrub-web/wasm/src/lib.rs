//! WASM bindings for the PDF blur/erase/text editor
//!
//! All editor state lives in Rust behind [`ScrubSession`]. JavaScript handles
//! DOM events, file I/O, and page rasterization through pdf.js, which it
//! exposes to Rust as a render callback.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { ScrubSession } from './pkg/pdfscrub_wasm.js';
//!
//! await init();
//!
//! const session = new ScrubSession();
//! session.openDocument(file.name, file.type, bytes);
//!
//! // pdf.js draws the page; Rust composites the edits on top
//! const renderPage = async (page, scale, width, height) => {
//!     const pdfPage = await pdf.getPage(page);
//!     // ... render to an offscreen canvas of width x height ...
//!     return ctx.getImageData(0, 0, width, height);
//! };
//!
//! session.setTool("erase");
//! session.commitDrag(x1, y1, x2, y2);
//! const image = await session.renderPage(renderPage); // null if superseded
//!
//! const pdfBytes = await session.exportPdf(renderPage, (done, total) => updateUI(done, total));
//! downloadBlob(pdfBytes, session.exportFileName());
//! ```

pub mod renderer;
pub mod session;

use pdfscrub_core::session::{FONT_FAMILIES, FONT_SIZES, ZOOM_LEVELS};
use wasm_bindgen::prelude::*;

pub use renderer::JsPageRenderer;
pub use session::ScrubSession;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Quick validation check for a PDF file
/// Returns Ok(()) if valid, Err with message if not
#[wasm_bindgen]
pub fn quick_validate(bytes: &[u8]) -> Result<(), JsValue> {
    pdfscrub_core::document::quick_validate(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Get page count from PDF bytes (convenience function)
#[wasm_bindgen]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    pdfscrub_core::get_page_count(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Zoom steps for the toolbar select
#[wasm_bindgen(js_name = zoomLevels)]
pub fn zoom_levels() -> Vec<f64> {
    ZOOM_LEVELS.to_vec()
}

/// Font sizes (points) for the text style picker
#[wasm_bindgen(js_name = fontSizes)]
pub fn font_sizes() -> Vec<f64> {
    FONT_SIZES.to_vec()
}

#[wasm_bindgen(js_name = fontFamilies)]
pub fn font_families() -> Vec<String> {
    FONT_FAMILIES.iter().map(|f| f.to_string()).collect()
}

/// Format bytes as human-readable string
#[wasm_bindgen]
pub fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
