//! Font lookup for text edits
//!
//! Families resolve in this order: fonts registered at runtime (the only
//! source in the browser), then fonts found in the configured and system
//! font directories, then the generic fallbacks for the family's class.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use ttf_parser::Face;

use crate::error::FontError;

const MAX_SCAN_DEPTH: usize = 6;

const SANS_FALLBACKS: &[&str] = &[
    "Arial",
    "Helvetica",
    "Liberation Sans",
    "DejaVu Sans",
    "Noto Sans",
    "FreeSans",
    "Verdana",
];
const SERIF_FALLBACKS: &[&str] = &[
    "Times New Roman",
    "Times",
    "Liberation Serif",
    "DejaVu Serif",
    "Noto Serif",
    "FreeSerif",
    "Georgia",
];
const MONO_FALLBACKS: &[&str] = &[
    "Courier New",
    "Courier",
    "Liberation Mono",
    "DejaVu Sans Mono",
    "Noto Sans Mono",
    "FreeMono",
];

/// Broad class of a font family, used to pick fallbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericFamily {
    SansSerif,
    Serif,
    Monospace,
}

impl GenericFamily {
    fn fallbacks(self) -> &'static [&'static str] {
        match self {
            GenericFamily::SansSerif => SANS_FALLBACKS,
            GenericFamily::Serif => SERIF_FALLBACKS,
            GenericFamily::Monospace => MONO_FALLBACKS,
        }
    }
}

/// Map a family name to its generic class
pub fn classify_family(name: &str) -> GenericFamily {
    let lower = name.to_lowercase();

    // Handle CSS generic font families
    match lower.as_str() {
        "serif" => return GenericFamily::Serif,
        "sans-serif" | "system-ui" | "cursive" | "fantasy" => return GenericFamily::SansSerif,
        "monospace" => return GenericFamily::Monospace,
        _ => {}
    }

    if lower.contains("courier")
        || lower.contains("mono")
        || lower.contains("consolas")
        || lower.contains("monaco")
    {
        return GenericFamily::Monospace;
    }

    if lower.contains("times") || lower.contains("georgia") || lower.contains("garamond") {
        return GenericFamily::Serif;
    }

    // Serif check has to come after "sans" so "Liberation Sans" stays sans
    if lower.contains("serif") && !lower.contains("sans") {
        return GenericFamily::Serif;
    }

    GenericFamily::SansSerif
}

/// Parsed-once font program
#[derive(Debug)]
pub struct FontData {
    family: String,
    bytes: Vec<u8>,
}

impl FontData {
    pub fn new(family: impl Into<String>, bytes: Vec<u8>) -> Result<Self, FontError> {
        let family = family.into();
        if let Err(e) = Face::parse(&bytes, 0) {
            return Err(FontError::InvalidFont {
                family,
                reason: e.to_string(),
            });
        }
        Ok(Self { family, bytes })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// Parse the face. Validated in [`FontData::new`], so this only fails if
    /// the bytes were somehow corrupted afterwards.
    pub fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.bytes, 0).ok()
    }
}

#[derive(Debug, Clone)]
struct IndexedFont {
    path: PathBuf,
    regular: bool,
}

#[derive(Debug, Default)]
pub struct FontBook {
    registered: BTreeMap<String, Arc<FontData>>,
    dirs: Vec<PathBuf>,
    index: OnceLock<BTreeMap<String, IndexedFont>>,
    loaded: Mutex<HashMap<PathBuf, Option<Arc<FontData>>>>,
}

impl FontBook {
    /// A font book with no directories; fonts must be registered explicitly
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            ..Self::default()
        }
    }

    /// Configured directories followed by the platform font directories
    pub fn system(extra_dirs: &[PathBuf]) -> Self {
        let mut dirs = extra_dirs.to_vec();
        dirs.extend(system_font_dirs());
        Self::with_dirs(dirs)
    }

    /// Make `bytes` available under `family`, replacing any earlier registration
    pub fn register(&mut self, family: &str, bytes: Vec<u8>) -> Result<(), FontError> {
        let data = FontData::new(family, bytes)?;
        self.registered
            .insert(normalize_family(family), Arc::new(data));
        Ok(())
    }

    pub fn has_registered_fonts(&self) -> bool {
        !self.registered.is_empty()
    }

    /// Resolve a family (or a CSS family list) to a font program
    pub fn resolve(&self, family: &str) -> Option<Arc<FontData>> {
        for candidate in family_candidates(family) {
            let key = normalize_family(&candidate);
            if let Some(font) = self.registered.get(&key) {
                return Some(font.clone());
            }
            if let Some(font) = self.load_indexed(&key) {
                return Some(font);
            }
        }

        // Last resort: anything we have, in a stable order
        if let Some(font) = self.registered.values().next() {
            tracing::warn!(family, fallback = font.family(), "Font family not found");
            return Some(font.clone());
        }
        let any = self.index().keys().next().cloned();
        if let Some(key) = any {
            let font = self.load_indexed(&key)?;
            tracing::warn!(family, fallback = font.family(), "Font family not found");
            return Some(font);
        }
        None
    }

    fn index(&self) -> &BTreeMap<String, IndexedFont> {
        self.index.get_or_init(|| {
            let mut index = BTreeMap::new();
            for dir in &self.dirs {
                scan_dir(dir, 0, &mut index);
            }
            tracing::debug!(fonts = index.len(), "Font directory index built");
            index
        })
    }

    fn load_indexed(&self, key: &str) -> Option<Arc<FontData>> {
        let entry = self.index().get(key)?;

        if let Ok(cache) = self.loaded.lock() {
            if let Some(cached) = cache.get(&entry.path) {
                return cached.clone();
            }
        }

        let loaded = std::fs::read(&entry.path)
            .ok()
            .and_then(|bytes| FontData::new(key, bytes).ok())
            .map(Arc::new);
        if let Ok(mut cache) = self.loaded.lock() {
            cache.insert(entry.path.clone(), loaded.clone());
        }
        loaded
    }
}

/// Requested families in order, followed by the class fallbacks of the first one
fn family_candidates(font_name: &str) -> Vec<String> {
    let mut out: Vec<String> = font_name
        .split(',')
        .map(|part| part.trim().trim_matches('"').trim_matches('\'').trim())
        .filter(|family| !family.is_empty())
        .map(str::to_string)
        .collect();

    let class = classify_family(out.first().map(String::as_str).unwrap_or(""));
    for fallback in class.fallbacks() {
        if !out.iter().any(|f| f.eq_ignore_ascii_case(fallback)) {
            out.push(fallback.to_string());
        }
    }
    out
}

fn normalize_family(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_lowercase()
}

fn scan_dir(dir: &Path, depth: usize, index: &mut BTreeMap<String, IndexedFont>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_dir(&path, depth + 1, index);
            continue;
        }
        let is_font = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"))
            .unwrap_or(false);
        if !is_font {
            continue;
        }
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        let Ok(face) = Face::parse(&bytes, 0) else {
            continue;
        };
        let Some(family) = family_name(&face) else {
            continue;
        };

        let regular = !face.is_bold() && !face.is_italic();
        let key = normalize_family(&family);
        let replace = match index.get(&key) {
            None => true,
            Some(existing) => regular && !existing.regular,
        };
        if replace {
            index.insert(key, IndexedFont { path, regular });
        }
    }
}

fn family_name(face: &Face<'_>) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::FAMILY)
        .find_map(|name| name.to_string())
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_css_generic_families() {
        assert_eq!(classify_family("serif"), GenericFamily::Serif);
        assert_eq!(classify_family("sans-serif"), GenericFamily::SansSerif);
        assert_eq!(classify_family("monospace"), GenericFamily::Monospace);
        assert_eq!(classify_family("cursive"), GenericFamily::SansSerif);
    }

    #[test]
    fn test_classify_named_families() {
        assert_eq!(classify_family("Arial"), GenericFamily::SansSerif);
        assert_eq!(classify_family("Verdana"), GenericFamily::SansSerif);
        assert_eq!(classify_family("Times New Roman"), GenericFamily::Serif);
        assert_eq!(classify_family("Georgia"), GenericFamily::Serif);
        assert_eq!(classify_family("Courier New"), GenericFamily::Monospace);
        assert_eq!(classify_family("Comic Sans MS"), GenericFamily::SansSerif);
        assert_eq!(classify_family("Liberation Sans"), GenericFamily::SansSerif);
        assert_eq!(classify_family("DejaVu Serif"), GenericFamily::Serif);
    }

    #[test]
    fn test_family_candidates_split_css_list() {
        let candidates = family_candidates("\"Courier New\", monospace");
        assert_eq!(candidates[0], "Courier New");
        assert_eq!(candidates[1], "monospace");
        assert!(candidates.iter().any(|c| c == "Liberation Mono"));
        assert_eq!(
            candidates
                .iter()
                .filter(|c| c.eq_ignore_ascii_case("courier new"))
                .count(),
            1
        );
    }

    #[test]
    fn test_register_rejects_non_font_bytes() {
        let mut book = FontBook::new();
        let err = book.register("Arial", b"definitely not a font".to_vec());
        assert!(matches!(err, Err(FontError::InvalidFont { .. })));
        assert!(!book.has_registered_fonts());
    }

    #[test]
    fn test_empty_book_resolves_nothing() {
        let book = FontBook::new();
        assert!(book.resolve("Arial").is_none());
    }

    #[test]
    fn test_missing_directory_is_ignored() {
        let book = FontBook::with_dirs(vec![PathBuf::from("/nonexistent/pdfscrub/fonts")]);
        assert!(book.resolve("Arial").is_none());
    }
}
