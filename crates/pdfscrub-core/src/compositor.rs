//! Apply edits to a rendered page bitmap
//!
//! The same routine draws the on-screen overlay and the export pages, so
//! what the user sees is what gets flattened.

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::coords::{PdfPoint, PdfRegion, Viewport};
use crate::edits::{Edit, TextStyle};
use crate::error::CompositeError;
use crate::font::FontBook;
use crate::surface::Surface;

/// Blur strength, defined at a reference scale and grown linearly with zoom
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlurSettings {
    /// Radius in pixels at `reference_scale`
    pub base_radius: f64,
    pub reference_scale: f64,
    /// Floor so small zoom levels still obscure content
    pub min_radius: f64,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            base_radius: 5.0,
            reference_scale: 1.5,
            min_radius: 2.0,
        }
    }
}

impl BlurSettings {
    /// Blur radius in pixels for a bitmap rendered at `scale`
    pub fn radius_at(&self, scale: f64) -> f64 {
        let reference = if self.reference_scale > 0.0 {
            self.reference_scale
        } else {
            1.0
        };
        (self.base_radius * scale / reference).max(self.min_radius)
    }
}

/// Composite `edits` onto `surface`, in order.
///
/// `surface` holds the page rendered through `viewport`. Edits are drawn in
/// the order given, so later edits cover earlier ones.
pub fn composite_page<'a>(
    surface: &mut Surface,
    viewport: &Viewport,
    edits: impl IntoIterator<Item = &'a Edit>,
    fonts: &FontBook,
    blur: &BlurSettings,
) -> Result<usize, CompositeError> {
    let mut applied = 0;
    for edit in edits {
        if apply_single_edit(surface, viewport, edit, fonts, blur)? {
            applied += 1;
        }
    }
    Ok(applied)
}

fn apply_single_edit(
    surface: &mut Surface,
    viewport: &Viewport,
    edit: &Edit,
    fonts: &FontBook,
    blur: &BlurSettings,
) -> Result<bool, CompositeError> {
    match edit {
        Edit::Blur { region, .. } => Ok(apply_blur(surface, viewport, region, blur)),
        Edit::Erase { region, .. } => Ok(apply_erase(surface, viewport, region)),
        Edit::Text {
            anchor,
            text,
            style,
            ..
        } => apply_text(surface, viewport, *anchor, text, style, fonts),
    }
}

fn apply_blur(
    surface: &mut Surface,
    viewport: &Viewport,
    region: &PdfRegion,
    blur: &BlurSettings,
) -> bool {
    let Some(rect) = viewport.region_to_pixels(region, surface.size()) else {
        return false;
    };
    let radius = blur.radius_at(viewport.scale());
    surface.blur_rect(rect, radius as f32);
    true
}

fn apply_erase(surface: &mut Surface, viewport: &Viewport, region: &PdfRegion) -> bool {
    let Some(rect) = viewport.region_to_pixels(region, surface.size()) else {
        return false;
    };
    surface.fill_rect(rect, Rgba::WHITE);
    true
}

fn apply_text(
    surface: &mut Surface,
    viewport: &Viewport,
    anchor: PdfPoint,
    text: &str,
    style: &TextStyle,
    fonts: &FontBook,
) -> Result<bool, CompositeError> {
    let font = fonts
        .resolve(&style.font_family)
        .ok_or_else(|| CompositeError::FontUnavailable(style.font_family.clone()))?;

    let color = Rgba::parse(&style.color).unwrap_or_else(|| {
        tracing::warn!(color = %style.color, "Unparseable text color, using black");
        Rgba::BLACK
    });

    let origin = viewport.pdf_to_canvas(anchor);
    let px_size = style.font_size * viewport.scale();
    let drawn = surface.draw_text(
        origin.x as f32,
        origin.y as f32,
        text,
        &font,
        px_size as f32,
        color,
    );
    Ok(drawn > 0)
}
