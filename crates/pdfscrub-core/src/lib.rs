//! Blur, erase and text overlays for PDF pages
//!
//! This crate holds the editor engine: edits are recorded in PDF user space,
//! drawn onto rendered page bitmaps, and flattened into an image-only copy
//! of the document on export.
//!
//! Page rasterization is not done here; callers supply a [`PageRenderer`]
//! (pdf.js in the browser, PDFium with the `pdfium` feature, or
//! [`BlankPageRenderer`] for geometry-only output).

pub mod color;
pub mod compositor;
pub mod config;
pub mod coords;
pub mod document;
pub mod edits;
pub mod error;
pub mod export;
pub mod font;
pub mod render;
pub mod session;
pub mod surface;
pub mod task;
pub mod writer;

pub use color::Rgba;
pub use compositor::{composite_page, BlurSettings};
pub use config::ScrubConfig;
pub use coords::{CanvasPoint, PageBox, PdfPoint, PdfRegion, PixelRect, Viewport};
pub use document::{DocumentInfo, PageGeometry, PdfDocument};
pub use edits::{Edit, EditId, EditKind, EditLog, TextStyle};
pub use error::{
    CompositeError, DocumentError, EditLogError, ExportError, FontError, RenderError,
    SessionError, WriteError,
};
pub use export::{export_document, ExportContext, ExportOptions};
pub use font::FontBook;
pub use render::{BlankPageRenderer, PageRenderer};
#[cfg(feature = "pdfium")]
pub use render::PdfiumRenderer;
pub use session::{EditorSession, Tool};
pub use surface::Surface;
pub use task::{render_view, RenderSlot, RenderTicket};
pub use writer::{FlatPdfWriter, ImageEncoding};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, DocumentError> {
    document::quick_validate(bytes)?;
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| DocumentError::LoadFailed(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}
