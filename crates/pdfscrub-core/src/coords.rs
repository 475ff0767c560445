//! Coordinate transformation between canvas and PDF coordinate systems
//!
//! Canvas space has its origin at the top-left and y growing downward, in
//! device pixels. PDF user space has its origin at the bottom-left of the
//! page box and y growing upward, in points. A [`Viewport`] ties the two
//! together for one render pass.

use serde::{Deserialize, Serialize};

/// A point in canvas pixels (origin top-left, y down)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}

impl CanvasPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A point in PDF user space (origin bottom-left, y up)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PdfPoint {
    pub x: f64,
    pub y: f64,
}

impl PdfPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rectangle in PDF points.
///
/// `(x, y)` is the top-left corner in y-up space. The rectangle covers
/// `x..x + width` horizontally and `y - height..y` vertically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PdfRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PdfRegion {
    /// Returns `None` for zero-area or non-finite rectangles.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Option<Self> {
        let region = Self {
            x,
            y,
            width,
            height,
        };
        region.is_valid().then_some(region)
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    pub fn top_left(&self) -> PdfPoint {
        PdfPoint::new(self.x, self.y)
    }

    pub fn bottom_right(&self) -> PdfPoint {
        PdfPoint::new(self.x + self.width, self.y - self.height)
    }
}

/// Page box (MediaBox) in PDF points
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PageBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageBox {
    pub fn from_size(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }
}

/// Whole-pixel rectangle on a raster surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Affine map between canvas and PDF space for one page at one scale.
///
/// The canvas shows the page the way a viewer displays it: a page with
/// `/Rotate 90` is turned a quarter clockwise, so its canvas is as wide as
/// the page box is tall.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Viewport {
    page: PageBox,
    scale: f64,
    rotation: u16,
}

impl Viewport {
    /// Returns `None` unless the scale is finite and positive and the page box
    /// has a positive size.
    pub fn new(page: PageBox, scale: f64) -> Option<Self> {
        let valid = scale.is_finite()
            && scale > 0.0
            && page.width.is_finite()
            && page.height.is_finite()
            && page.width > 0.0
            && page.height > 0.0;
        valid.then_some(Self {
            page,
            scale,
            rotation: 0,
        })
    }

    /// Display the page turned clockwise by `degrees`, snapped to a quarter turn
    pub fn with_rotation(mut self, degrees: i32) -> Self {
        let quarter = (degrees as f64 / 90.0).round() as i64;
        self.rotation = (quarter.rem_euclid(4) * 90) as u16;
        self
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn page(&self) -> PageBox {
        self.page
    }

    /// Clockwise display rotation: 0, 90, 180 or 270
    pub fn rotation(&self) -> u16 {
        self.rotation
    }

    fn quarter_turned(&self) -> bool {
        self.rotation == 90 || self.rotation == 270
    }

    /// Displayed page size in points, after rotation
    pub fn display_size(&self) -> (f64, f64) {
        if self.quarter_turned() {
            (self.page.height, self.page.width)
        } else {
            (self.page.width, self.page.height)
        }
    }

    /// Canvas size in (fractional) pixels
    pub fn canvas_size(&self) -> (f64, f64) {
        let (w, h) = self.display_size();
        (w * self.scale, h * self.scale)
    }

    /// Canvas size rounded to whole pixels, at least 1x1
    pub fn pixel_size(&self) -> (u32, u32) {
        let (w, h) = self.canvas_size();
        (w.round().max(1.0) as u32, h.round().max(1.0) as u32)
    }

    /// Convert canvas coordinates to PDF coordinates (flip Y axis)
    pub fn canvas_to_pdf(&self, point: CanvasPoint) -> PdfPoint {
        let (ws, hs) = (self.page.width * self.scale, self.page.height * self.scale);
        // Undo the display rotation first
        let (ux, uy) = match self.rotation {
            90 => (point.y, hs - point.x),
            180 => (ws - point.x, hs - point.y),
            270 => (ws - point.y, point.x),
            _ => (point.x, point.y),
        };
        PdfPoint {
            x: ux / self.scale + self.page.x,
            y: self.page.height - uy / self.scale + self.page.y,
        }
    }

    /// Convert PDF coordinates to canvas coordinates
    pub fn pdf_to_canvas(&self, point: PdfPoint) -> CanvasPoint {
        let (ws, hs) = (self.page.width * self.scale, self.page.height * self.scale);
        let ux = (point.x - self.page.x) * self.scale;
        let uy = self.scale * (self.page.height - (point.y - self.page.y));
        let (x, y) = match self.rotation {
            90 => (hs - uy, ux),
            180 => (ws - ux, hs - uy),
            270 => (uy, ws - ux),
            _ => (ux, uy),
        };
        CanvasPoint { x, y }
    }

    /// Turn a drag gesture (in any direction) into a top-left anchored region.
    ///
    /// Zero-area drags yield `None` and must not be stored.
    pub fn region_from_canvas_drag(&self, start: CanvasPoint, end: CanvasPoint) -> Option<PdfRegion> {
        let a = self.canvas_to_pdf(start);
        let b = self.canvas_to_pdf(end);
        PdfRegion::new(
            a.x.min(b.x),
            a.y.max(b.y),
            (a.x - b.x).abs(),
            (a.y - b.y).abs(),
        )
    }

    /// Canvas rectangle of a region as fractional pixels: `(x, y, width, height)`
    pub fn region_to_canvas(&self, region: &PdfRegion) -> (f64, f64, f64, f64) {
        let tl = self.pdf_to_canvas(region.top_left());
        let br = self.pdf_to_canvas(region.bottom_right());
        (
            tl.x.min(br.x),
            tl.y.min(br.y),
            (br.x - tl.x).abs(),
            (br.y - tl.y).abs(),
        )
    }

    /// Region snapped to whole pixels and clipped to a `bounds` sized surface.
    ///
    /// `None` when nothing of the region survives rounding and clipping.
    pub fn region_to_pixels(&self, region: &PdfRegion, bounds: (u32, u32)) -> Option<PixelRect> {
        let (x, y, w, h) = self.region_to_canvas(region);
        let clamp_x = |v: f64| v.round().clamp(0.0, bounds.0 as f64) as u32;
        let clamp_y = |v: f64| v.round().clamp(0.0, bounds.1 as f64) as u32;

        let x0 = clamp_x(x);
        let y0 = clamp_y(y);
        let x1 = clamp_x(x + w);
        let y1 = clamp_y(y + h);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(scale: f64) -> Viewport {
        Viewport::new(PageBox::from_size(612.0, 792.0), scale).unwrap()
    }

    #[test]
    fn test_canvas_to_pdf_matches_formula() {
        let vp = letter(2.0);
        let p = vp.canvas_to_pdf(CanvasPoint::new(100.0, 200.0));
        assert_eq!(p, PdfPoint::new(50.0, 692.0));
    }

    #[test]
    fn test_pdf_to_canvas_matches_formula() {
        let vp = letter(1.5);
        let c = vp.pdf_to_canvas(PdfPoint::new(100.0, 100.0));
        assert!((c.x - 150.0).abs() < 1e-9);
        assert!((c.y - 1.5 * 692.0).abs() < 1e-9);
    }

    #[test]
    fn test_corners() {
        let vp = letter(1.0);

        // Top-left canvas (0, 0) should map to top-left PDF (0, 792)
        let p = vp.canvas_to_pdf(CanvasPoint::new(0.0, 0.0));
        assert_eq!(p, PdfPoint::new(0.0, 792.0));

        // Bottom-right canvas should map to bottom-right PDF
        let p = vp.canvas_to_pdf(CanvasPoint::new(612.0, 792.0));
        assert_eq!(p, PdfPoint::new(612.0, 0.0));
    }

    #[test]
    fn test_media_box_origin_offset() {
        let page = PageBox {
            x: 10.0,
            y: 20.0,
            width: 200.0,
            height: 300.0,
        };
        let vp = Viewport::new(page, 1.0).unwrap();
        assert_eq!(
            vp.canvas_to_pdf(CanvasPoint::new(0.0, 0.0)),
            PdfPoint::new(10.0, 320.0)
        );
        assert_eq!(
            vp.pdf_to_canvas(PdfPoint::new(10.0, 20.0)),
            CanvasPoint::new(0.0, 300.0)
        );
    }

    #[test]
    fn test_quarter_turn_swaps_canvas_size() {
        let vp = letter(1.5).with_rotation(90);
        assert_eq!(vp.rotation(), 90);
        assert_eq!(vp.display_size(), (792.0, 612.0));
        assert_eq!(vp.pixel_size(), (1188, 918));
        assert_eq!(letter(1.5).with_rotation(180).pixel_size(), (918, 1188));
    }

    #[test]
    fn test_rotation_snaps_to_quarter_turns() {
        assert_eq!(letter(1.0).with_rotation(-90).rotation(), 270);
        assert_eq!(letter(1.0).with_rotation(450).rotation(), 90);
        assert_eq!(letter(1.0).with_rotation(360).rotation(), 0);
    }

    #[test]
    fn test_rotated_page_corners() {
        // Turned clockwise, the PDF origin lands top-left and the
        // page's top-left corner lands top-right
        let vp = letter(1.0).with_rotation(90);
        assert_eq!(vp.pdf_to_canvas(PdfPoint::new(0.0, 0.0)), CanvasPoint::new(0.0, 0.0));
        assert_eq!(vp.pdf_to_canvas(PdfPoint::new(0.0, 792.0)), CanvasPoint::new(792.0, 0.0));
        assert_eq!(vp.pdf_to_canvas(PdfPoint::new(612.0, 0.0)), CanvasPoint::new(0.0, 612.0));

        let vp = letter(1.0).with_rotation(180);
        assert_eq!(vp.pdf_to_canvas(PdfPoint::new(0.0, 0.0)), CanvasPoint::new(612.0, 0.0));

        let vp = letter(1.0).with_rotation(270);
        assert_eq!(vp.pdf_to_canvas(PdfPoint::new(0.0, 0.0)), CanvasPoint::new(792.0, 612.0));
        assert_eq!(vp.canvas_to_pdf(CanvasPoint::new(0.0, 0.0)), PdfPoint::new(612.0, 792.0));
    }

    #[test]
    fn test_rotated_drag_stays_on_page() {
        let vp = letter(2.0).with_rotation(90);
        // Top-left 200x100 canvas pixels of the turned page
        let region = vp
            .region_from_canvas_drag(CanvasPoint::new(0.0, 0.0), CanvasPoint::new(200.0, 100.0))
            .unwrap();
        assert_eq!(region, PdfRegion::new(0.0, 100.0, 50.0, 100.0).unwrap());
        assert_eq!(vp.region_to_canvas(&region), (0.0, 0.0, 200.0, 100.0));
    }

    #[test]
    fn test_invalid_viewports_rejected() {
        let page = PageBox::from_size(612.0, 792.0);
        assert!(Viewport::new(page, 0.0).is_none());
        assert!(Viewport::new(page, -1.0).is_none());
        assert!(Viewport::new(page, f64::NAN).is_none());
        assert!(Viewport::new(PageBox::from_size(0.0, 792.0), 1.0).is_none());
    }

    #[test]
    fn test_pixel_size_rounds() {
        assert_eq!(letter(1.5).pixel_size(), (918, 1188));
        assert_eq!(letter(0.001).pixel_size(), (1, 1));
    }

    #[test]
    fn test_drag_normalizes_direction() {
        let vp = letter(2.0);
        let forward = vp
            .region_from_canvas_drag(CanvasPoint::new(100.0, 100.0), CanvasPoint::new(300.0, 140.0))
            .unwrap();
        let backward = vp
            .region_from_canvas_drag(CanvasPoint::new(300.0, 140.0), CanvasPoint::new(100.0, 100.0))
            .unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, PdfRegion::new(50.0, 742.0, 100.0, 20.0).unwrap());
    }

    #[test]
    fn test_zero_area_drag_discarded() {
        let vp = letter(1.5);
        let start = CanvasPoint::new(40.0, 40.0);
        assert!(vp.region_from_canvas_drag(start, start).is_none());
        assert!(vp
            .region_from_canvas_drag(start, CanvasPoint::new(90.0, 40.0))
            .is_none());
        assert!(vp
            .region_from_canvas_drag(start, CanvasPoint::new(40.0, 90.0))
            .is_none());
    }

    #[test]
    fn test_region_to_canvas_height_measured_downward() {
        let vp = letter(1.0);
        let region = PdfRegion::new(50.0, 700.0, 100.0, 20.0).unwrap();
        let (x, y, w, h) = vp.region_to_canvas(&region);
        assert_eq!((x, y, w, h), (50.0, 92.0, 100.0, 20.0));
    }

    #[test]
    fn test_region_to_pixels_clips_to_bounds() {
        let vp = letter(1.0);
        let region = PdfRegion::new(600.0, 10.0, 50.0, 50.0).unwrap();
        let rect = vp.region_to_pixels(&region, (612, 792)).unwrap();
        assert_eq!(
            rect,
            PixelRect {
                x: 600,
                y: 782,
                width: 12,
                height: 10
            }
        );
    }

    #[test]
    fn test_region_that_rounds_to_nothing_is_not_drawn() {
        let vp = letter(0.5);
        let region = PdfRegion::new(100.0, 100.0, 0.4, 30.0).unwrap();
        assert!(vp.region_to_pixels(&region, vp.pixel_size()).is_none());

        let offpage = PdfRegion::new(700.0, 100.0, 50.0, 30.0).unwrap();
        assert!(vp.region_to_pixels(&offpage, vp.pixel_size()).is_none());
    }

    #[test]
    fn test_region_new_rejects_degenerate() {
        assert!(PdfRegion::new(0.0, 0.0, 0.0, 10.0).is_none());
        assert!(PdfRegion::new(0.0, 0.0, 10.0, -1.0).is_none());
        assert!(PdfRegion::new(f64::INFINITY, 0.0, 10.0, 10.0).is_none());
        assert!(PdfRegion::new(0.0, 0.0, 10.0, 10.0).is_some());
    }
}
