//! Configuration parsing
//!
//! Every section and field is optional; an empty file yields the same
//! behaviour as the browser build.
//!
//! ```toml
//! [view]
//! default_zoom = 1.5
//!
//! [export]
//! min_scale = 1.5
//! encoding = { format = "flate" }
//!
//! [blur]
//! base_radius = 5.0
//!
//! [fonts]
//! dirs = ["./fonts"]
//! default_family = "Arial"
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::compositor::BlurSettings;
use crate::edits::TextStyle;
use crate::export::ExportOptions;
use crate::font::FontBook;

/// Largest accepted blur radius, in pixels at the reference scale
pub const MAX_BLUR_RADIUS: f64 = 100.0;

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScrubConfig {
    /// Zoom behaviour of the editor view
    #[serde(default)]
    pub view: ViewConfig,
    /// Flattened output settings
    #[serde(default)]
    pub export: ExportOptions,
    /// Blur strength
    #[serde(default)]
    pub blur: BlurSettings,
    /// Font lookup and text defaults
    #[serde(default)]
    pub fonts: FontConfig,
}

impl ScrubConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - A value is out of range (see [`ScrubConfig::validate`])
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make rendering meaningless
    pub fn validate(&self) -> anyhow::Result<()> {
        let view = &self.view;
        anyhow::ensure!(
            view.min_zoom > 0.0 && view.min_zoom <= view.max_zoom,
            "view.min_zoom must be positive and not above view.max_zoom"
        );
        anyhow::ensure!(
            (view.min_zoom..=view.max_zoom).contains(&view.default_zoom),
            "view.default_zoom must lie between view.min_zoom and view.max_zoom"
        );
        anyhow::ensure!(
            self.export.min_scale.is_finite() && self.export.min_scale > 0.0,
            "export.min_scale must be positive"
        );
        let blur = &self.blur;
        anyhow::ensure!(
            blur.reference_scale.is_finite() && blur.reference_scale > 0.0,
            "blur.reference_scale must be positive"
        );
        let radius_ok = |r: f64| (0.0..=MAX_BLUR_RADIUS).contains(&r);
        anyhow::ensure!(
            radius_ok(blur.base_radius) && radius_ok(blur.min_radius),
            "blur.base_radius and blur.min_radius must lie between 0 and {}",
            MAX_BLUR_RADIUS
        );
        anyhow::ensure!(
            self.fonts.default_size > 0.0,
            "fonts.default_size must be positive"
        );
        Ok(())
    }

    /// Font book over the configured directories (and the system ones unless disabled)
    pub fn font_book(&self) -> FontBook {
        if self.fonts.system_fonts {
            FontBook::system(&self.fonts.dirs)
        } else {
            FontBook::with_dirs(self.fonts.dirs.clone())
        }
    }

    /// Style offered for new text edits
    pub fn text_defaults(&self) -> TextStyle {
        TextStyle {
            font_size: self.fonts.default_size,
            font_family: self.fonts.default_family.clone(),
            color: self.fonts.default_color.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewConfig {
    /// Zoom applied when a document is opened (default: 1.5)
    #[serde(default = "default_zoom")]
    pub default_zoom: f64,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_zoom: default_zoom(),
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FontConfig {
    /// Searched before the system font directories
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
    /// Also search the platform font directories (default: true)
    #[serde(default = "default_true")]
    pub system_fonts: bool,
    #[serde(default = "default_family")]
    pub default_family: String,
    /// Points
    #[serde(default = "default_size")]
    pub default_size: f64,
    #[serde(default = "default_color")]
    pub default_color: String,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            system_fonts: true,
            default_family: default_family(),
            default_size: default_size(),
            default_color: default_color(),
        }
    }
}

fn default_zoom() -> f64 {
    1.5
}

fn default_min_zoom() -> f64 {
    0.25
}

fn default_max_zoom() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

fn default_family() -> String {
    "Arial".to_string()
}

fn default_size() -> f64 {
    16.0
}

fn default_color() -> String {
    "#000000".to_string()
}
