//! PDF intake: input validation and page geometry
//!
//! Only page geometry is extracted here; rasterizing page content is the
//! job of a [`crate::render::PageRenderer`].

use lopdf::{Dictionary, Document, Object};
use serde::Serialize;

use crate::coords::{PageBox, Viewport};
use crate::error::DocumentError;

pub const PDF_MIME: &str = "application/pdf";

/// Guard against reference cycles in malformed page trees
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Page orientation
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum PageOrientation {
    Portrait,
    Landscape,
    Square,
}

/// Geometry of a single page
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PageGeometry {
    /// Page number (1-indexed)
    pub page_num: u32,
    /// MediaBox in points (1 point = 1/72 inch)
    pub media_box: PageBox,
    /// Page rotation in degrees (0, 90, 180, 270)
    pub rotation: i32,
    pub orientation: PageOrientation,
}

impl PageGeometry {
    pub fn width(&self) -> f64 {
        self.media_box.width
    }

    pub fn height(&self) -> f64 {
        self.media_box.height
    }

    /// The page as displayed at `scale`, with its rotation applied
    pub fn viewport(&self, scale: f64) -> Option<Viewport> {
        Viewport::new(self.media_box, scale).map(|vp| vp.with_rotation(self.rotation))
    }
}

/// Summary handed to the UI after a successful load
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    pub encrypted: bool,
    pub size_bytes: usize,
    pub pages: Vec<PageGeometry>,
}

/// A loaded source document
#[derive(Debug, Clone)]
pub struct PdfDocument {
    info: DocumentInfo,
    bytes: Vec<u8>,
}

impl PdfDocument {
    /// Validate and parse `bytes`.
    ///
    /// Header problems are reported as [`DocumentError::InvalidInput`];
    /// anything that fails after the header looks right is
    /// [`DocumentError::LoadFailed`].
    pub fn load(name: &str, bytes: Vec<u8>) -> Result<Self, DocumentError> {
        quick_validate(&bytes)?;

        let document =
            Document::load_mem(&bytes).map_err(|e| DocumentError::LoadFailed(e.to_string()))?;

        let page_ids = document.get_pages();
        if page_ids.is_empty() {
            return Err(DocumentError::LoadFailed("PDF has no pages".to_string()));
        }

        let mut pages = Vec::with_capacity(page_ids.len());
        for (&page_num, page_id) in &page_ids {
            let dict = document
                .get_object(*page_id)
                .and_then(Object::as_dict)
                .map_err(|_| {
                    DocumentError::LoadFailed(format!("Page {} is not a dictionary", page_num))
                })?;
            pages.push(page_geometry(&document, dict, page_num)?);
        }

        let info = DocumentInfo {
            name: name.to_string(),
            page_count: pages.len() as u32,
            version: extract_version(&bytes),
            encrypted: document.is_encrypted(),
            size_bytes: bytes.len(),
            pages,
        };

        tracing::debug!(
            name = %info.name,
            pages = info.page_count,
            version = %info.version,
            "Loaded PDF"
        );

        Ok(Self { info, bytes })
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> u32 {
        self.info.page_count
    }

    pub fn pages(&self) -> &[PageGeometry] {
        &self.info.pages
    }

    /// Geometry for a 1-based page number
    pub fn page(&self, page_num: u32) -> Option<&PageGeometry> {
        page_num
            .checked_sub(1)
            .and_then(|idx| self.info.pages.get(idx as usize))
    }
}

/// Accept a file by MIME type or, failing that, by extension
pub fn validate_input(name: &str, mime: Option<&str>) -> Result<(), DocumentError> {
    let mime_ok = mime
        .map(|m| m.trim().eq_ignore_ascii_case(PDF_MIME))
        .unwrap_or(false);
    let ext_ok = name.to_ascii_lowercase().ends_with(".pdf");

    if mime_ok || ext_ok {
        Ok(())
    } else {
        Err(DocumentError::InvalidInput(format!(
            "{} (type {})",
            name,
            mime.unwrap_or("unknown")
        )))
    }
}

/// Quick validation without full parsing
pub fn quick_validate(bytes: &[u8]) -> Result<(), DocumentError> {
    // Check minimum size
    if bytes.len() < 8 {
        return Err(DocumentError::InvalidInput(
            "File too small to be a valid PDF".to_string(),
        ));
    }

    // Check PDF magic bytes
    if !bytes.starts_with(b"%PDF-") {
        return Err(DocumentError::InvalidInput(
            "Missing %PDF- header".to_string(),
        ));
    }

    Ok(())
}

/// Extract PDF version from header
fn extract_version(bytes: &[u8]) -> String {
    // Header format: %PDF-1.7
    if bytes.len() >= 8 && bytes.starts_with(b"%PDF-") {
        if let Ok(version) = std::str::from_utf8(&bytes[5..8]) {
            return version.trim().to_string();
        }
    }
    "1.4".to_string()
}

fn page_geometry(
    doc: &Document,
    page_dict: &Dictionary,
    page_num: u32,
) -> Result<PageGeometry, DocumentError> {
    let media_box = match inherited(doc, page_dict, b"MediaBox") {
        Some(obj) => parse_box(doc, obj).map_err(|reason| {
            DocumentError::LoadFailed(format!("Page {}: {}", page_num, reason))
        })?,
        // Default to US Letter size
        None => PageBox::from_size(612.0, 792.0),
    };

    let rotation = inherited(doc, page_dict, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .map(|angle| normalize_rotation(angle as i32))
        .unwrap_or(0);

    let (w, h) = if rotation == 90 || rotation == 270 {
        (media_box.height, media_box.width)
    } else {
        (media_box.width, media_box.height)
    };
    let orientation = if (w - h).abs() < 1.0 {
        PageOrientation::Square
    } else if w > h {
        PageOrientation::Landscape
    } else {
        PageOrientation::Portrait
    };

    Ok(PageGeometry {
        page_num,
        media_box,
        rotation,
        orientation,
    })
}

/// Look up an inheritable page attribute, walking up the page tree
fn inherited<'a>(doc: &'a Document, page_dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut dict = page_dict;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        let parent_id = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        dict = doc.get_object(parent_id).and_then(Object::as_dict).ok()?;
    }
    None
}

/// Parse a box array [x1, y1, x2, y2] into origin + size
fn parse_box(doc: &Document, obj: &Object) -> Result<PageBox, String> {
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).map_err(|e| e.to_string())?,
        other => other,
    };
    let array = obj
        .as_array()
        .map_err(|_| "MediaBox is not an array".to_string())?;
    if array.len() != 4 {
        return Err("MediaBox must have 4 elements".to_string());
    }

    let mut v = [0.0f64; 4];
    for (i, item) in array.iter().enumerate() {
        v[i] = match item {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => return Err(format!("MediaBox element {} is not a number", i)),
        };
    }

    let (x0, x1) = (v[0].min(v[2]), v[0].max(v[2]));
    let (y0, y1) = (v[1].min(v[3]), v[1].max(v[3]));
    if x1 - x0 <= 0.0 || y1 - y0 <= 0.0 {
        return Err("MediaBox has zero area".to_string());
    }

    Ok(PageBox {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

/// Normalize rotation to 0, 90, 180, or 270
fn normalize_rotation(angle: i32) -> i32 {
    let normalized = angle % 360;
    if normalized < 0 {
        normalized + 360
    } else {
        normalized
    }
}
