//! Editor session state
//!
//! One session drives one editor view: the open document, its edit log,
//! where the user is looking and what the current tool does with a click
//! or drag.

use serde::{Deserialize, Serialize};

use crate::compositor::BlurSettings;
use crate::config::{ScrubConfig, ViewConfig};
use crate::coords::{CanvasPoint, PdfPoint, PdfRegion, Viewport};
use crate::document::{quick_validate, validate_input, DocumentInfo, PageGeometry, PdfDocument};
use crate::edits::{Edit, EditId, EditLog, TextStyle};
use crate::error::{ExportError, RenderError, SessionError};
use crate::export::{export_document, ExportContext, ExportOptions};
use crate::font::FontBook;
use crate::render::PageRenderer;
use crate::surface::Surface;
use crate::task::{render_view, RenderSlot, RenderTicket};

/// Zoom steps offered by the toolbar
pub const ZOOM_LEVELS: [f64; 7] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0, 3.0];

/// Font sizes offered for text edits, in points
pub const FONT_SIZES: [f64; 9] = [8.0, 10.0, 12.0, 14.0, 16.0, 18.0, 24.0, 32.0, 48.0];

/// Font families offered for text edits
pub const FONT_FAMILIES: [&str; 6] = [
    "Arial",
    "Verdana",
    "Times New Roman",
    "Courier New",
    "Georgia",
    "Comic Sans MS",
];

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Tool {
    #[default]
    Cursor,
    Blur,
    Erase,
    Text,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::Cursor => "cursor",
            Tool::Blur => "blur",
            Tool::Erase => "erase",
            Tool::Text => "text",
        }
    }
}

/// A click with the text tool waiting for the user to type
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PendingText {
    pub page: u32,
    pub anchor: PdfPoint,
    /// Where the click landed, for positioning the input box
    pub canvas: CanvasPoint,
}

/// Everything needed to draw one page view, detached from the session so
/// it can be awaited without holding a borrow.
#[derive(Debug, Clone)]
pub struct ViewRequest {
    pub ticket: RenderTicket,
    pub page: u32,
    pub viewport: Viewport,
    pub edits: Vec<Edit>,
    pub blur: BlurSettings,
}

impl ViewRequest {
    pub async fn render<R>(&self, renderer: &R, fonts: &FontBook) -> Result<Surface, RenderError>
    where
        R: PageRenderer + ?Sized,
    {
        render_view(
            renderer,
            self.page,
            &self.viewport,
            &self.edits,
            fonts,
            &self.blur,
            &self.ticket,
        )
        .await
    }
}

/// Snapshot of the document and edits taken when an export starts
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub pages: Vec<PageGeometry>,
    pub edits: EditLog,
    pub zoom: f64,
    pub options: ExportOptions,
    pub blur: BlurSettings,
}

impl ExportJob {
    pub async fn run<R>(
        &self,
        renderer: &R,
        fonts: &FontBook,
        progress: &mut dyn FnMut(u32, u32),
    ) -> Result<Vec<u8>, ExportError>
    where
        R: PageRenderer + ?Sized,
    {
        let ctx = ExportContext {
            edits: &self.edits,
            fonts,
            blur: &self.blur,
            options: &self.options,
            zoom: self.zoom,
        };
        export_document(&self.pages, renderer, &ctx, progress).await
    }
}

#[derive(Debug)]
pub struct EditorSession {
    document: Option<PdfDocument>,
    edits: EditLog,
    page: u32,
    zoom: f64,
    tool: Tool,
    text_style: TextStyle,
    pending_text: Option<PendingText>,
    busy: bool,
    last_error: Option<String>,
    renders: RenderSlot,
    view: ViewConfig,
    export: ExportOptions,
    blur: BlurSettings,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(&ScrubConfig::default())
    }
}

impl EditorSession {
    pub fn new(config: &ScrubConfig) -> Self {
        Self {
            document: None,
            edits: EditLog::new(),
            page: 1,
            zoom: config.view.default_zoom,
            tool: Tool::default(),
            text_style: config.text_defaults(),
            pending_text: None,
            busy: false,
            last_error: None,
            renders: RenderSlot::new(),
            view: config.view.clone(),
            export: config.export,
            blur: config.blur,
        }
    }

    /// Load a document, replacing the current one.
    ///
    /// Input that is not a PDF is rejected before anything changes. A PDF
    /// that fails to parse leaves the session empty.
    pub fn open(
        &mut self,
        name: &str,
        mime: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<&DocumentInfo, SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }

        if let Err(e) = validate_input(name, mime).and_then(|_| quick_validate(&bytes)) {
            self.last_error = Some(e.to_string());
            return Err(e.into());
        }

        match PdfDocument::load(name, bytes) {
            Ok(document) => {
                self.reset();
                let document = self.document.insert(document);
                tracing::info!(name, pages = document.page_count(), "Document opened");
                Ok(document.info())
            }
            Err(e) => {
                self.reset();
                self.last_error = Some(e.to_string());
                tracing::warn!(name, error = %e, "Failed to open document");
                Err(e.into())
            }
        }
    }

    /// Drop the document and its edits
    pub fn close(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.renders.cancel();
        self.document = None;
        self.edits.clear();
        self.page = 1;
        self.zoom = self.view.default_zoom;
        self.pending_text = None;
        self.last_error = None;
    }

    pub fn document(&self) -> Option<&PdfDocument> {
        self.document.as_ref()
    }

    pub fn info(&self) -> Option<&DocumentInfo> {
        self.document.as_ref().map(PdfDocument::info)
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(PdfDocument::page_count)
            .unwrap_or(0)
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn edits(&self) -> &EditLog {
        &self.edits
    }

    /// Edits on the current page, in compositing order
    pub fn page_edits(&self) -> impl Iterator<Item = &Edit> + '_ {
        self.edits.for_page(self.page)
    }

    pub fn pending_text(&self) -> Option<&PendingText> {
        self.pending_text.as_ref()
    }

    pub fn text_style(&self) -> &TextStyle {
        &self.text_style
    }

    pub fn set_text_style(&mut self, style: TextStyle) {
        self.text_style = style;
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if tool != Tool::Text {
            self.pending_text = None;
        }
        self.tool = tool;
    }

    /// Set the zoom, clamped to the configured range. Returns the zoom applied.
    pub fn set_zoom(&mut self, zoom: f64) -> Result<f64, SessionError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(SessionError::InvalidZoom(zoom));
        }
        let zoom = zoom.clamp(self.view.min_zoom, self.view.max_zoom);
        if zoom != self.zoom {
            self.renders.cancel();
            self.pending_text = None;
            self.zoom = zoom;
        }
        Ok(zoom)
    }

    /// Next toolbar zoom step above the current zoom
    pub fn zoom_in(&mut self) -> Result<f64, SessionError> {
        let next = ZOOM_LEVELS
            .iter()
            .copied()
            .find(|&z| z > self.zoom)
            .unwrap_or(self.zoom);
        self.set_zoom(next)
    }

    /// Next toolbar zoom step below the current zoom
    pub fn zoom_out(&mut self) -> Result<f64, SessionError> {
        let prev = ZOOM_LEVELS
            .iter()
            .rev()
            .copied()
            .find(|&z| z < self.zoom)
            .unwrap_or(self.zoom);
        self.set_zoom(prev)
    }

    pub fn set_page(&mut self, page: u32) -> Result<(), SessionError> {
        let count = self.document.as_ref().ok_or(SessionError::NoDocument)?.page_count();
        if page == 0 || page > count {
            return Err(SessionError::InvalidPage { page, count });
        }
        if page != self.page {
            self.renders.cancel();
            self.pending_text = None;
            self.page = page;
        }
        Ok(())
    }

    /// Viewport of the current page at the current zoom
    pub fn viewport(&self) -> Result<Viewport, SessionError> {
        let document = self.document.as_ref().ok_or(SessionError::NoDocument)?;
        let geometry = document.page(self.page).ok_or(SessionError::InvalidPage {
            page: self.page,
            count: document.page_count(),
        })?;
        geometry.viewport(self.zoom).ok_or_else(|| {
            RenderError::Failed(format!("page {} has no usable size", self.page)).into()
        })
    }

    /// Append an edit built elsewhere (e.g. loaded from a file)
    pub fn add_edit(&mut self, edit: Edit) -> Result<EditId, SessionError> {
        self.check_edit_pages([&edit])?;
        let page = edit.page();
        let id = self.edits.add(edit);
        tracing::debug!(id, page, "Edit added");
        Ok(id)
    }

    /// Append every edit of `log`, or none of them.
    ///
    /// All page numbers are checked before anything is recorded, so a log
    /// with one bad edit leaves the session as it was.
    pub fn add_edits(&mut self, log: &EditLog) -> Result<Vec<EditId>, SessionError> {
        self.check_edit_pages(log.edits())?;
        let ids: Vec<EditId> = log
            .edits()
            .iter()
            .map(|edit| self.edits.add(edit.clone()))
            .collect();
        tracing::debug!(count = ids.len(), "Edit log replayed");
        Ok(ids)
    }

    fn check_edit_pages<'a>(
        &self,
        edits: impl IntoIterator<Item = &'a Edit>,
    ) -> Result<(), SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        let count = self.document.as_ref().ok_or(SessionError::NoDocument)?.page_count();
        for edit in edits {
            if edit.page() == 0 || edit.page() > count {
                return Err(SessionError::InvalidPage {
                    page: edit.page(),
                    count,
                });
            }
        }
        Ok(())
    }

    /// Turn a finished drag into a blur or erase edit on the current page.
    ///
    /// A drag with no area is ignored and yields `Ok(None)`.
    pub fn commit_drag(
        &mut self,
        start: CanvasPoint,
        end: CanvasPoint,
    ) -> Result<Option<EditId>, SessionError> {
        let make: fn(u32, PdfRegion) -> Edit = match self.tool {
            Tool::Blur => Edit::blur,
            Tool::Erase => Edit::erase,
            tool => {
                return Err(SessionError::WrongTool {
                    tool: tool.name(),
                    action: "draw regions",
                })
            }
        };
        if self.busy {
            return Err(SessionError::Busy);
        }

        let viewport = self.viewport()?;
        match viewport.region_from_canvas_drag(start, end) {
            Some(region) => self.add_edit(make(self.page, region)).map(Some),
            None => Ok(None),
        }
    }

    /// Start placing text at a canvas click
    pub fn begin_text(&mut self, at: CanvasPoint) -> Result<PendingText, SessionError> {
        if self.tool != Tool::Text {
            return Err(SessionError::WrongTool {
                tool: self.tool.name(),
                action: "place text",
            });
        }
        if self.busy {
            return Err(SessionError::Busy);
        }

        let viewport = self.viewport()?;
        let pending = PendingText {
            page: self.page,
            anchor: viewport.canvas_to_pdf(at),
            canvas: at,
        };
        self.pending_text = Some(pending);
        Ok(pending)
    }

    /// Finish text placement. Blank text is discarded and yields `Ok(None)`.
    ///
    /// `style` becomes the default for the next placement.
    pub fn confirm_text(
        &mut self,
        text: &str,
        style: Option<TextStyle>,
    ) -> Result<Option<EditId>, SessionError> {
        let pending = self.pending_text.take().ok_or(SessionError::NoPendingText)?;
        if let Some(style) = style {
            self.text_style = style;
        }
        if text.trim().is_empty() {
            return Ok(None);
        }
        let edit = Edit::text(pending.page, pending.anchor, text, self.text_style.clone());
        self.add_edit(edit).map(Some)
    }

    pub fn cancel_text(&mut self) {
        self.pending_text = None;
    }

    /// Start drawing the current view, superseding any render in flight
    pub fn begin_render(&mut self) -> Result<ViewRequest, SessionError> {
        let viewport = self.viewport()?;
        let ticket = self.renders.begin();
        Ok(ViewRequest {
            ticket,
            page: self.page,
            viewport,
            edits: self.page_edits().cloned().collect(),
            blur: self.blur,
        })
    }

    pub fn is_current_render(&self, ticket: &RenderTicket) -> bool {
        self.renders.is_current(ticket)
    }

    pub fn cancel_render(&mut self) {
        self.renders.cancel();
    }

    /// Enter the modal export state and snapshot what to export
    pub fn begin_export(&mut self) -> Result<ExportJob, SessionError> {
        let document = self.document.as_ref().ok_or(SessionError::NoDocument)?;
        if self.busy {
            return Err(SessionError::Busy);
        }
        let job = ExportJob {
            pages: document.pages().to_vec(),
            edits: self.edits.clone(),
            zoom: self.zoom,
            options: self.export,
            blur: self.blur,
        };
        self.busy = true;
        self.last_error = None;
        Ok(job)
    }

    /// Leave the modal export state, recording a failure for display
    pub fn finish_export(
        &mut self,
        result: Result<Vec<u8>, ExportError>,
    ) -> Result<Vec<u8>, SessionError> {
        self.busy = false;
        match result {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                tracing::warn!(error = %e, "Export failed");
                self.last_error = Some(format!("Export failed: {e}"));
                Err(e.into())
            }
        }
    }

    /// Export the document with all edits flattened into it
    pub async fn export<R>(
        &mut self,
        renderer: &R,
        fonts: &FontBook,
        progress: &mut dyn FnMut(u32, u32),
    ) -> Result<Vec<u8>, SessionError>
    where
        R: PageRenderer + ?Sized,
    {
        let job = self.begin_export()?;
        let result = job.run(renderer, fonts, progress).await;
        self.finish_export(result)
    }

    /// Suggested file name for the exported copy
    pub fn export_file_name(&self) -> String {
        let name = self
            .document
            .as_ref()
            .map(PdfDocument::name)
            .unwrap_or("document.pdf");
        let stem = name
            .strip_suffix(".pdf")
            .or_else(|| name.strip_suffix(".PDF"))
            .unwrap_or(name);
        format!("{stem}_edited.pdf")
    }
}
