//! Raster surface that page bitmaps are composited on

use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Rect, Transform};
use ttf_parser::{GlyphId, OutlineBuilder};

use crate::color::Rgba;
use crate::coords::PixelRect;
use crate::error::RenderError;
use crate::font::FontData;

/// Largest edge we are willing to allocate, in pixels
pub const MAX_DIMENSION: u32 = 16_384;

/// Line advance for multi-line text, as a multiple of the font size
const LINE_HEIGHT: f32 = 1.2;

/// An RGBA bitmap. Pixels are stored premultiplied, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pixmap: Pixmap,
}

impl Surface {
    /// Opaque white surface
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        Self::filled(width, height, Rgba::WHITE)
    }

    pub fn filled(width: u32, height: u32, color: Rgba) -> Result<Self, RenderError> {
        let mut pixmap = allocate(width, height)?;
        pixmap.fill(sk_color(color));
        Ok(Self { pixmap })
    }

    /// Build from straight (non-premultiplied) RGBA rows, the layout of
    /// canvas `ImageData` and most rasterizers.
    pub fn from_rgba(width: u32, height: u32, mut data: Vec<u8>) -> Result<Self, RenderError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(RenderError::Failed(format!(
                "bitmap is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        validate_size(width, height)?;

        for px in data.chunks_exact_mut(4) {
            let a = px[3] as u16;
            if a < 255 {
                px[0] = premultiply(px[0], a);
                px[1] = premultiply(px[1], a);
                px[2] = premultiply(px[2], a);
            }
        }

        let size = tiny_skia::IntSize::from_wh(width, height)
            .ok_or(RenderError::InvalidSize { width, height })?;
        let pixmap =
            Pixmap::from_vec(data, size).ok_or(RenderError::InvalidSize { width, height })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Straight-alpha color of one pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        // Pixmap::pixel only bounds-checks the flat index
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some(Rgba {
            r: c.red(),
            g: c.green(),
            b: c.blue(),
            a: c.alpha(),
        })
    }

    /// Straight-alpha RGBA rows
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixmap.data().len());
        for px in self.pixmap.pixels() {
            let c = px.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }

    /// RGB rows flattened onto white paper
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width() as usize * self.height() as usize * 3);
        for px in self.pixmap.pixels() {
            // Premultiplied source over opaque white: c + 255 * (1 - a)
            let under = 255 - px.alpha();
            out.extend_from_slice(&[
                px.red().saturating_add(under),
                px.green().saturating_add(under),
                px.blue().saturating_add(under),
            ]);
        }
        out
    }

    /// Paint a rectangle with `color`, blended source-over
    pub fn fill_rect(&mut self, rect: PixelRect, color: Rgba) {
        let Some(rect) = Rect::from_xywh(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
        ) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(sk_color(color));
        paint.anti_alias = false;
        self.pixmap
            .fill_rect(rect, &paint, Transform::identity(), None);
    }

    /// Gaussian blur of the pixels inside `rect`.
    ///
    /// Pixels around the rectangle feed the kernel but are left untouched,
    /// so the blurred area blends with its surroundings at the edges.
    pub fn blur_rect(&mut self, rect: PixelRect, sigma: f32) {
        if sigma <= 0.0 || rect.width == 0 || rect.height == 0 {
            return;
        }

        let (width, height) = self.size();
        // Wider kernels than the surface change nothing but cost
        let sigma = sigma.min(width.max(height) as f32);
        let margin = (sigma * 3.0).ceil() as u32;
        let x0 = rect.x.saturating_sub(margin);
        let y0 = rect.y.saturating_sub(margin);
        let x1 = rect.x.saturating_add(rect.width).saturating_add(margin).min(width);
        let y1 = rect.y.saturating_add(rect.height).saturating_add(margin).min(height);
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let stride = width as usize * 4;
        let src_w = (x1 - x0) as usize;
        let mut patch = Vec::with_capacity(src_w * (y1 - y0) as usize * 4);
        let data = self.pixmap.data();
        for y in y0..y1 {
            let start = y as usize * stride + x0 as usize * 4;
            patch.extend_from_slice(&data[start..start + src_w * 4]);
        }

        let Some(patch) = image::RgbaImage::from_raw(x1 - x0, y1 - y0, patch) else {
            return;
        };
        let blurred = image::imageops::blur(&patch, sigma);

        // Write back only the requested rectangle
        let data = self.pixmap.data_mut();
        let x_end = rect.x.saturating_add(rect.width).min(width);
        let y_end = rect.y.saturating_add(rect.height).min(height);
        for y in rect.y..y_end {
            for x in rect.x..x_end {
                let p = blurred.get_pixel(x - x0, y - y0).0;
                let i = y as usize * stride + x as usize * 4;
                // Keep premultiplied invariants intact after rounding
                let a = p[3];
                data[i] = p[0].min(a);
                data[i + 1] = p[1].min(a);
                data[i + 2] = p[2].min(a);
                data[i + 3] = a;
            }
        }
    }

    /// Draw `text` with the top of its em box at `(x, y)`.
    ///
    /// Lines split on `\n`. Returns the number of glyph outlines painted.
    pub fn draw_text(
        &mut self,
        x: f32,
        y: f32,
        text: &str,
        font: &FontData,
        px_size: f32,
        color: Rgba,
    ) -> usize {
        if px_size <= 0.0 || !px_size.is_finite() {
            return 0;
        }
        let Some(face) = font.face() else {
            return 0;
        };

        let upem = face.units_per_em().max(1) as f32;
        let scale = px_size / upem;
        let ascent = face.ascender() as f32 * scale;

        let mut paint = Paint::default();
        paint.set_color(sk_color(color));
        paint.anti_alias = true;

        let mut drawn = 0;
        for (line_no, line) in text.lines().enumerate() {
            let baseline = y + ascent + line_no as f32 * px_size * LINE_HEIGHT;
            let mut pen_x = x;
            for ch in line.chars() {
                let gid = face.glyph_index(ch).unwrap_or(GlyphId(0));
                let mut builder = GlyphPathBuilder::new(pen_x, baseline, scale);
                if face.outline_glyph(gid, &mut builder).is_some() {
                    if let Some(path) = builder.finish() {
                        self.pixmap.fill_path(
                            &path,
                            &paint,
                            FillRule::Winding,
                            Transform::identity(),
                            None,
                        );
                        drawn += 1;
                    }
                }
                let advance = face.glyph_hor_advance(gid).unwrap_or(0) as f32;
                pen_x += advance * scale;
            }
        }
        drawn
    }
}

fn validate_size(width: u32, height: u32) -> Result<(), RenderError> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(RenderError::InvalidSize { width, height });
    }
    Ok(())
}

fn allocate(width: u32, height: u32) -> Result<Pixmap, RenderError> {
    validate_size(width, height)?;
    Pixmap::new(width, height).ok_or(RenderError::InvalidSize { width, height })
}

fn premultiply(c: u8, a: u16) -> u8 {
    ((c as u16 * a + 127) / 255) as u8
}

fn sk_color(color: Rgba) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

/// Font outlines are y-up; the surface is y-down, so y is negated.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}
