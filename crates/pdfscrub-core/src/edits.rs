//! Edit log for tracking visual edits
//!
//! Edits are stored in PDF user space so they stay valid when the zoom
//! level changes. The log is append-only and its order is the order in
//! which edits are composited.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::coords::{PdfPoint, PdfRegion};
use crate::error::EditLogError;

pub type EditId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStyle {
    /// Font size in PDF points
    pub font_size: f64,
    pub font_family: String,
    /// CSS color string, e.g. "#000000"
    pub color: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            font_family: "Arial".to_string(),
            color: "#000000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EditKind {
    Blur,
    Erase,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Edit {
    /// Blur the content under a region
    Blur {
        id: EditId,
        page: u32,
        region: PdfRegion,
    },
    /// Cover a region with opaque white
    Erase {
        id: EditId,
        page: u32,
        region: PdfRegion,
    },
    /// Draw a line of text with its top-left corner at `anchor`
    Text {
        id: EditId,
        page: u32,
        anchor: PdfPoint,
        text: String,
        style: TextStyle,
    },
}

impl Edit {
    pub fn blur(page: u32, region: PdfRegion) -> Self {
        Edit::Blur { id: 0, page, region }
    }

    pub fn erase(page: u32, region: PdfRegion) -> Self {
        Edit::Erase { id: 0, page, region }
    }

    pub fn text(page: u32, anchor: PdfPoint, text: impl Into<String>, style: TextStyle) -> Self {
        Edit::Text {
            id: 0,
            page,
            anchor,
            text: text.into(),
            style,
        }
    }

    pub fn id(&self) -> EditId {
        match self {
            Edit::Blur { id, .. } => *id,
            Edit::Erase { id, .. } => *id,
            Edit::Text { id, .. } => *id,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            Edit::Blur { page, .. } => *page,
            Edit::Erase { page, .. } => *page,
            Edit::Text { page, .. } => *page,
        }
    }

    pub fn kind(&self) -> EditKind {
        match self {
            Edit::Blur { .. } => EditKind::Blur,
            Edit::Erase { .. } => EditKind::Erase,
            Edit::Text { .. } => EditKind::Text,
        }
    }

    fn set_id(&mut self, new_id: EditId) {
        match self {
            Edit::Blur { id, .. } => *id = new_id,
            Edit::Erase { id, .. } => *id = new_id,
            Edit::Text { id, .. } => *id = new_id,
        }
    }

    fn validate(&self) -> Result<(), EditLogError> {
        if self.page() == 0 {
            return Err(EditLogError::InvalidPage { id: self.id() });
        }
        match self {
            Edit::Blur { id, region, .. } | Edit::Erase { id, region, .. } => {
                if !region.is_valid() {
                    return Err(EditLogError::InvalidRegion(*id));
                }
            }
            Edit::Text { id, text, .. } => {
                if text.trim().is_empty() {
                    return Err(EditLogError::BlankText(*id));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditLog {
    #[serde(default)]
    next_id: EditId,
    edits: Vec<Edit>,
}

impl EditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an edit, assigning it the next id.
    ///
    /// Geometry is validated by whoever builds the edit (see
    /// [`PdfRegion::new`]); the log only sequences.
    pub fn add(&mut self, mut edit: Edit) -> EditId {
        let id = self.next_id;
        self.next_id += 1;
        edit.set_id(id);
        self.edits.push(edit);
        id
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Edits belonging to `page`, in insertion order
    pub fn for_page(&self, page: u32) -> impl Iterator<Item = &Edit> + '_ {
        self.edits.iter().filter(move |edit| edit.page() == page)
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Drop every edit; ids keep increasing so stale ids never alias.
    pub fn clear(&mut self) {
        self.edits.clear();
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse and validate a log produced by [`EditLog::to_json`] or written by hand.
    pub fn from_json(json: &str) -> Result<Self, EditLogError> {
        let mut log: EditLog = serde_json::from_str(json)?;

        let mut seen = HashSet::new();
        for edit in &log.edits {
            edit.validate()?;
            if !seen.insert(edit.id()) {
                return Err(EditLogError::DuplicateId(edit.id()));
            }
        }

        let max_id = log.edits.iter().map(Edit::id).max();
        if let Some(max_id) = max_id {
            log.next_id = log.next_id.max(max_id + 1);
        }
        Ok(log)
    }
}
