//! Page rasterization
//!
//! Turning PDF content into pixels is delegated to a [`PageRenderer`]. The
//! browser build implements it on top of a JavaScript rasterizer; native
//! builds can enable the `pdfium` feature.

use async_trait::async_trait;

use crate::color::Rgba;
use crate::coords::Viewport;
use crate::error::RenderError;
use crate::surface::Surface;

/// Rasterizes one page at the size given by a viewport.
///
/// Implementations must return a surface of exactly `viewport.pixel_size()`
/// showing the page as displayed: `/Rotate` applied and the displayed
/// top-left corner at pixel (0, 0). Futures are not required
/// to be `Send` so JavaScript promises can back them.
#[async_trait(?Send)]
pub trait PageRenderer {
    async fn render_page(&self, page: u32, viewport: &Viewport) -> Result<Surface, RenderError>;
}

/// Renders every page as blank paper.
///
/// Useful for exporting edits alone, and as the fallback on builds without
/// a rasterizer.
#[derive(Debug, Clone)]
pub struct BlankPageRenderer {
    page_count: u32,
    paper: Rgba,
}

impl BlankPageRenderer {
    pub fn new(page_count: u32) -> Self {
        Self {
            page_count,
            paper: Rgba::WHITE,
        }
    }

    pub fn with_paper(mut self, paper: Rgba) -> Self {
        self.paper = paper;
        self
    }
}

#[async_trait(?Send)]
impl PageRenderer for BlankPageRenderer {
    async fn render_page(&self, page: u32, viewport: &Viewport) -> Result<Surface, RenderError> {
        if page == 0 || page > self.page_count {
            return Err(RenderError::PageNotFound(page));
        }
        let (width, height) = viewport.pixel_size();
        Surface::filled(width, height, self.paper)
    }
}

/// Check a bitmap returned by an external rasterizer against the viewport
pub fn check_bitmap_size(viewport: &Viewport, width: u32, height: u32) -> Result<(), RenderError> {
    let expected = viewport.pixel_size();
    if (width, height) != expected {
        return Err(RenderError::Failed(format!(
            "rasterizer returned {}x{}, expected {}x{}",
            width, height, expected.0, expected.1
        )));
    }
    Ok(())
}

#[cfg(feature = "pdfium")]
pub use self::pdfium::PdfiumRenderer;

#[cfg(feature = "pdfium")]
mod pdfium {
    use async_trait::async_trait;
    use pdfium_render::prelude::*;

    use super::{check_bitmap_size, PageRenderer};
    use crate::coords::Viewport;
    use crate::error::RenderError;
    use crate::surface::Surface;

    /// Native rasterizer backed by the PDFium library
    pub struct PdfiumRenderer {
        pdfium: Pdfium,
        bytes: Vec<u8>,
    }

    impl PdfiumRenderer {
        /// Bind to PDFium in `library_dir`, or to the system library when `None`
        pub fn new(bytes: Vec<u8>, library_dir: Option<&str>) -> Result<Self, RenderError> {
            let bindings = match library_dir {
                Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
                None => Pdfium::bind_to_system_library(),
            }
            .map_err(|e| RenderError::Failed(format!("failed to bind PDFium: {e}")))?;

            Ok(Self {
                pdfium: Pdfium::new(bindings),
                bytes,
            })
        }
    }

    #[async_trait(?Send)]
    impl PageRenderer for PdfiumRenderer {
        async fn render_page(
            &self,
            page: u32,
            viewport: &Viewport,
        ) -> Result<Surface, RenderError> {
            let document = self
                .pdfium
                .load_pdf_from_byte_slice(&self.bytes, None)
                .map_err(|e| RenderError::Failed(e.to_string()))?;

            let index = page
                .checked_sub(1)
                .and_then(|i| u16::try_from(i).ok())
                .ok_or(RenderError::PageNotFound(page))?;
            let pdf_page = document
                .pages()
                .get(index)
                .map_err(|_| RenderError::PageNotFound(page))?;

            // PDFium applies /Rotate itself
            let (width, height) = viewport.pixel_size();
            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_target_height(height as i32);
            let bitmap = pdf_page
                .render_with_config(&config)
                .map_err(|e| RenderError::Failed(e.to_string()))?;

            let (out_w, out_h) = (bitmap.width() as u32, bitmap.height() as u32);
            check_bitmap_size(viewport, out_w, out_h)?;
            Surface::from_rgba(out_w, out_h, bitmap.as_rgba_bytes())
        }
    }
}
