//! Flatten a document and its edits into a new image-only PDF
//!
//! Every page is rendered, composited with the edits on that page and
//! embedded as a bitmap, so nothing under an erased or blurred area
//! survives in the output.

use serde::{Deserialize, Serialize};

use crate::compositor::{composite_page, BlurSettings};
use crate::document::PageGeometry;
use crate::edits::EditLog;
use crate::error::{ExportError, RenderError};
use crate::font::FontBook;
use crate::render::PageRenderer;
use crate::writer::{FlatPdfWriter, ImageEncoding};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportOptions {
    /// Pages are never rendered below this scale, whatever the zoom
    pub min_scale: f64,
    pub encoding: ImageEncoding,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            min_scale: 1.5,
            encoding: ImageEncoding::default(),
        }
    }
}

impl ExportOptions {
    /// Render scale for an export started at `zoom`
    pub fn scale_for_zoom(&self, zoom: f64) -> f64 {
        if zoom.is_finite() {
            self.min_scale.max(zoom)
        } else {
            self.min_scale
        }
    }
}

/// Everything an export needs besides the pages themselves
pub struct ExportContext<'a> {
    pub edits: &'a EditLog,
    pub fonts: &'a FontBook,
    pub blur: &'a BlurSettings,
    pub options: &'a ExportOptions,
    /// Zoom level at the time the export was started
    pub zoom: f64,
}

/// Render, composite and write every page in order.
///
/// `progress` is called with `(pages_done, total)` after each page. Pages
/// are processed one at a time to keep peak memory at a single bitmap.
pub async fn export_document<R>(
    pages: &[PageGeometry],
    renderer: &R,
    ctx: &ExportContext<'_>,
    progress: &mut dyn FnMut(u32, u32),
) -> Result<Vec<u8>, ExportError>
where
    R: PageRenderer + ?Sized,
{
    if pages.is_empty() {
        return Err(ExportError::NoPages);
    }

    let scale = ctx.options.scale_for_zoom(ctx.zoom);
    let total = pages.len() as u32;
    let mut writer = FlatPdfWriter::new(ctx.options.encoding);

    tracing::info!(pages = total, scale, edits = ctx.edits.len(), "Export started");

    for (done, geometry) in pages.iter().enumerate() {
        let page = geometry.page_num;
        let viewport = geometry.viewport(scale).ok_or_else(|| ExportError::Render {
            page,
            source: RenderError::Failed(format!(
                "page has unusable size {}x{}",
                geometry.width(),
                geometry.height()
            )),
        })?;

        let mut surface = renderer
            .render_page(page, &viewport)
            .await
            .map_err(|source| ExportError::Render { page, source })?;

        composite_page(
            &mut surface,
            &viewport,
            ctx.edits.for_page(page),
            ctx.fonts,
            ctx.blur,
        )
        .map_err(|source| ExportError::Composite { page, source })?;

        // Rotation is baked into the bitmap, so the page is written upright
        let (width, height) = viewport.display_size();
        writer.add_page(&surface, width, height)?;
        progress(done as u32 + 1, total);

        tracing::debug!(page, "Page flattened");
    }

    let bytes = writer.finish()?;
    tracing::info!(bytes = bytes.len(), "Export finished");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{PageBox, PdfPoint, PdfRegion};
    use crate::document::PageOrientation;
    use crate::edits::{Edit, TextStyle};
    use crate::error::CompositeError;
    use crate::render::BlankPageRenderer;

    fn geometry(page_num: u32, width: f64, height: f64) -> PageGeometry {
        PageGeometry {
            page_num,
            media_box: PageBox::from_size(width, height),
            rotation: 0,
            orientation: PageOrientation::Portrait,
        }
    }

    fn context<'a>(
        edits: &'a EditLog,
        fonts: &'a FontBook,
        blur: &'a BlurSettings,
        options: &'a ExportOptions,
    ) -> ExportContext<'a> {
        ExportContext {
            edits,
            fonts,
            blur,
            options,
            zoom: 1.0,
        }
    }

    #[test]
    fn test_scale_never_below_minimum() {
        let options = ExportOptions::default();
        assert_eq!(options.scale_for_zoom(0.5), 1.5);
        assert_eq!(options.scale_for_zoom(1.5), 1.5);
        assert_eq!(options.scale_for_zoom(3.0), 3.0);
        assert_eq!(options.scale_for_zoom(f64::NAN), 1.5);
    }

    #[tokio::test]
    async fn test_export_reports_progress_per_page() {
        let pages = vec![geometry(1, 100.0, 100.0), geometry(2, 200.0, 100.0)];
        let renderer = BlankPageRenderer::new(2);
        let edits = EditLog::new();
        let fonts = FontBook::new();
        let blur = BlurSettings::default();
        let options = ExportOptions::default();
        let ctx = context(&edits, &fonts, &blur, &options);

        let mut calls = Vec::new();
        let bytes = export_document(&pages, &renderer, &ctx, &mut |done, total| {
            calls.push((done, total))
        })
        .await
        .unwrap();

        assert_eq!(calls, vec![(1, 2), (2, 2)]);
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[tokio::test]
    async fn test_export_without_pages_fails() {
        let renderer = BlankPageRenderer::new(0);
        let edits = EditLog::new();
        let fonts = FontBook::new();
        let blur = BlurSettings::default();
        let options = ExportOptions::default();
        let ctx = context(&edits, &fonts, &blur, &options);

        let result = export_document(&[], &renderer, &ctx, &mut |_, _| {}).await;
        assert_eq!(result, Err(ExportError::NoPages));
    }

    #[tokio::test]
    async fn test_render_failure_names_the_page() {
        // Renderer only knows one page
        let pages = vec![geometry(1, 100.0, 100.0), geometry(2, 100.0, 100.0)];
        let renderer = BlankPageRenderer::new(1);
        let edits = EditLog::new();
        let fonts = FontBook::new();
        let blur = BlurSettings::default();
        let options = ExportOptions::default();
        let ctx = context(&edits, &fonts, &blur, &options);

        let mut last = 0;
        let result = export_document(&pages, &renderer, &ctx, &mut |done, _| last = done).await;
        assert_eq!(
            result,
            Err(ExportError::Render {
                page: 2,
                source: RenderError::PageNotFound(2)
            })
        );
        assert_eq!(last, 1);
    }

    #[tokio::test]
    async fn test_missing_font_fails_export() {
        let pages = vec![geometry(1, 100.0, 100.0)];
        let renderer = BlankPageRenderer::new(1);
        let mut edits = EditLog::new();
        edits.add(Edit::erase(1, PdfRegion::new(0.0, 100.0, 10.0, 10.0).unwrap()));
        edits.add(Edit::text(
            1,
            PdfPoint::new(10.0, 90.0),
            "Hi",
            TextStyle::default(),
        ));
        let fonts = FontBook::new();
        let blur = BlurSettings::default();
        let options = ExportOptions::default();
        let ctx = context(&edits, &fonts, &blur, &options);

        let result = export_document(&pages, &renderer, &ctx, &mut |_, _| {}).await;
        assert_eq!(
            result,
            Err(ExportError::Composite {
                page: 1,
                source: CompositeError::FontUnavailable("Arial".to_string())
            })
        );
    }
}
