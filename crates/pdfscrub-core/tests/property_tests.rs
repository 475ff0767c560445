//! Property-based tests for compositing
//!
//! Uses proptest to check that edits land exactly where the coordinate
//! mapping says they should, at any zoom.

use pdfscrub_core::{
    composite_page, BlurSettings, Edit, FontBook, PageBox, PdfRegion, Rgba, Surface, Viewport,
};
use proptest::prelude::*;

const PAPER: Rgba = Rgba::opaque(90, 90, 90);

fn page_viewport(scale: f64) -> Viewport {
    Viewport::new(PageBox::from_size(300.0, 200.0), scale).unwrap()
}

fn paper(viewport: &Viewport) -> Surface {
    let (w, h) = viewport.pixel_size();
    Surface::filled(w, h, PAPER).unwrap()
}

/// Regions fully inside a 300x200 page
fn region_strategy() -> impl Strategy<Value = PdfRegion> {
    (0.0..250.0f64, 50.0..200.0f64, 1.0..50.0f64, 1.0..50.0f64)
        .prop_map(|(x, y, w, h)| PdfRegion::new(x, y, w, h).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn erase_covers_exactly_its_pixel_rect(
        region in region_strategy(),
        scale in prop::sample::select(vec![0.5, 1.0, 1.5, 2.0]),
    ) {
        let viewport = page_viewport(scale);
        let mut surface = paper(&viewport);
        let edit = Edit::erase(1, region);
        composite_page(&mut surface, &viewport, [&edit], &FontBook::new(), &BlurSettings::default())
            .unwrap();

        let (w, h) = surface.size();
        match viewport.region_to_pixels(&region, (w, h)) {
            Some(rect) => {
                for y in 0..h {
                    for x in 0..w {
                        let inside = x >= rect.x
                            && x < rect.x + rect.width
                            && y >= rect.y
                            && y < rect.y + rect.height;
                        let expected = if inside { Rgba::WHITE } else { PAPER };
                        prop_assert_eq!(surface.pixel(x, y), Some(expected));
                    }
                }
            }
            None => {
                prop_assert!(surface.to_rgba().chunks(4).all(|p| p == [90u8, 90, 90, 255].as_slice()));
            }
        }
    }

    #[test]
    fn blur_never_leaks_outside_its_rect(region in region_strategy()) {
        let viewport = page_viewport(1.5);
        let (w, h) = viewport.pixel_size();
        // Checkerboard so blurring visibly changes pixels
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                let v = if (x + y) % 2 == 0 { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let original = Surface::from_rgba(w, h, data).unwrap();
        let mut surface = original.clone();
        let edit = Edit::blur(1, region);
        composite_page(&mut surface, &viewport, [&edit], &FontBook::new(), &BlurSettings::default())
            .unwrap();

        let rect = viewport.region_to_pixels(&region, (w, h));
        for y in 0..h {
            for x in 0..w {
                let inside = rect
                    .map(|r| x >= r.x && x < r.x + r.width && y >= r.y && y < r.y + r.height)
                    .unwrap_or(false);
                if !inside {
                    prop_assert_eq!(surface.pixel(x, y), original.pixel(x, y));
                }
            }
        }
    }

    #[test]
    fn compositing_is_deterministic(
        regions in prop::collection::vec(region_strategy(), 1..5),
    ) {
        let viewport = page_viewport(1.0);
        let edits: Vec<Edit> = regions
            .iter()
            .enumerate()
            .map(|(i, r)| if i % 2 == 0 { Edit::blur(1, *r) } else { Edit::erase(1, *r) })
            .collect();

        let mut a = paper(&viewport);
        let mut b = paper(&viewport);
        let fonts = FontBook::new();
        composite_page(&mut a, &viewport, &edits, &fonts, &BlurSettings::default()).unwrap();
        composite_page(&mut b, &viewport, &edits, &fonts, &BlurSettings::default()).unwrap();
        prop_assert_eq!(a.to_rgba(), b.to_rgba());
    }
}
