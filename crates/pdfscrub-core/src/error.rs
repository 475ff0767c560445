use thiserror::Error;

use crate::edits::EditId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Not a PDF file: {0}")]
    InvalidInput(String),

    #[error("Failed to load PDF: {0}")]
    LoadFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The render task was superseded before it finished. Not a fault.
    #[error("Rendering cancelled")]
    Cancelled,

    #[error("Invalid render size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("Page {0} does not exist")]
    PageNotFound(u32),

    #[error("Page rendering failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Composite(#[from] CompositeError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompositeError {
    #[error("No font available for family '{0}'")]
    FontUnavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FontError {
    #[error("Invalid font data for '{family}': {reason}")]
    InvalidFont { family: String, reason: String },
}

#[derive(Error, Debug)]
pub enum EditLogError {
    #[error("Invalid edit log JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Edit {0} has an empty or non-finite region")]
    InvalidRegion(EditId),

    #[error("Edit {0} has blank text")]
    BlankText(EditId),

    #[error("Duplicate edit id {0}")]
    DuplicateId(EditId),

    #[error("Edit {id} targets page 0")]
    InvalidPage { id: EditId },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WriteError {
    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("PDF serialization failed: {0}")]
    Save(String),

    #[error("No pages to write")]
    Empty,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    #[error("Document has no pages")]
    NoPages,

    #[error("Failed to render page {page}: {source}")]
    Render { page: u32, source: RenderError },

    #[error("Failed to apply edits to page {page}: {source}")]
    Composite { page: u32, source: CompositeError },

    #[error(transparent)]
    Write(#[from] WriteError),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No document loaded")]
    NoDocument,

    #[error("Export in progress")]
    Busy,

    #[error("The {tool} tool cannot {action}")]
    WrongTool {
        tool: &'static str,
        action: &'static str,
    },

    #[error("Page {page} is out of range (1-{count})")]
    InvalidPage { page: u32, count: u32 },

    #[error("Invalid zoom level: {0}")]
    InvalidZoom(f64),

    #[error("No text placement in progress")]
    NoPendingText,

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
