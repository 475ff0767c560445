//! Build an image-only PDF from page bitmaps

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};

use crate::error::WriteError;
use crate::surface::Surface;

/// How page bitmaps are compressed inside the output PDF
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum ImageEncoding {
    /// Lossless (FlateDecode)
    Flate,
    /// Lossy (DCTDecode), quality 1-100
    Jpeg { quality: u8 },
}

impl Default for ImageEncoding {
    fn default() -> Self {
        ImageEncoding::Jpeg { quality: 92 }
    }
}

/// Accumulates flattened pages and serializes them as a new document.
///
/// Each page is a single full-bleed image; the page size in points comes
/// from the source page, so the output matches the original's geometry.
pub struct FlatPdfWriter {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    encoding: ImageEncoding,
}

impl FlatPdfWriter {
    pub fn new(encoding: ImageEncoding) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            encoding,
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append a page of `width` x `height` points showing `bitmap` stretched over it
    pub fn add_page(&mut self, bitmap: &Surface, width: f64, height: f64) -> Result<(), WriteError> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(WriteError::Encode(format!(
                "invalid page size {width}x{height}"
            )));
        }

        let image = self.encode_image(bitmap)?;
        let image_id = self.doc.add_object(image);

        let content = format!(
            "q {} 0 0 {} 0 0 cm /Im0 Do Q",
            format_number(width),
            format_number(height)
        );
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(self.pages_id),
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(width as f32), Object::Real(height as f32)],
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => Object::Reference(image_id),
                },
            },
            "Contents" => Object::Reference(content_id),
        });
        self.kids.push(Object::Reference(page_id));
        Ok(())
    }

    /// Serialize the document
    pub fn finish(mut self) -> Result<Vec<u8>, WriteError> {
        if self.kids.is_empty() {
            return Err(WriteError::Empty);
        }

        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => count,
                "Kids" => self.kids,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(self.pages_id),
        });
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| WriteError::Save(e.to_string()))?;
        Ok(output)
    }

    fn encode_image(&self, bitmap: &Surface) -> Result<Stream, WriteError> {
        let (width, height) = bitmap.size();
        let rgb = bitmap.to_rgb();

        let (filter, data) = match self.encoding {
            ImageEncoding::Flate => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder
                    .write_all(&rgb)
                    .map_err(|e| WriteError::Encode(e.to_string()))?;
                let data = encoder
                    .finish()
                    .map_err(|e| WriteError::Encode(e.to_string()))?;
                ("FlateDecode", data)
            }
            ImageEncoding::Jpeg { quality } => {
                let mut data = Vec::new();
                JpegEncoder::new_with_quality(&mut data, quality.clamp(1, 100))
                    .encode(&rgb, width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| WriteError::Encode(e.to_string()))?;
                ("DCTDecode", data)
            }
        };

        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => filter,
        };
        // Already compressed; keep lopdf from compressing again
        Ok(Stream::new(dict, data).with_compression(false))
    }
}

/// Compact decimal for content streams
fn format_number(value: f64) -> String {
    let s = format!("{:.4}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;
    use std::io::Read;

    #[test]
    fn test_empty_writer_fails() {
        let writer = FlatPdfWriter::new(ImageEncoding::Flate);
        assert_eq!(writer.finish(), Err(WriteError::Empty));
    }

    #[test]
    fn test_rejects_bad_page_size() {
        let mut writer = FlatPdfWriter::new(ImageEncoding::Flate);
        let surface = Surface::new(2, 2).unwrap();
        assert!(writer.add_page(&surface, 0.0, 10.0).is_err());
        assert!(writer.add_page(&surface, f64::NAN, 10.0).is_err());
        assert_eq!(writer.page_count(), 0);
    }

    #[test]
    fn test_pages_keep_point_size() {
        let mut writer = FlatPdfWriter::new(ImageEncoding::Jpeg { quality: 80 });
        let surface = Surface::new(30, 40).unwrap();
        writer.add_page(&surface, 612.0, 792.0).unwrap();
        writer.add_page(&surface, 595.5, 842.0).unwrap();
        let bytes = writer.finish().unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);

        let page = doc.get_dictionary(pages[&2]).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert!((media_box[2].as_float().unwrap() - 595.5).abs() < 1e-3);
        assert!((media_box[3].as_float().unwrap() - 842.0).abs() < 1e-3);
    }

    #[test]
    fn test_flate_image_holds_exact_pixels() {
        let mut surface = Surface::filled(3, 2, Rgba::opaque(200, 100, 50)).unwrap();
        surface.fill_rect(
            crate::coords::PixelRect {
                x: 0,
                y: 0,
                width: 1,
                height: 1,
            },
            Rgba::WHITE,
        );
        let mut writer = FlatPdfWriter::new(ImageEncoding::Flate);
        writer.add_page(&surface, 100.0, 50.0).unwrap();
        let bytes = writer.finish().unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let image = doc
            .objects
            .values()
            .find_map(|obj| match obj {
                Object::Stream(s)
                    if s.dict.get(b"Subtype").and_then(|o| o.as_name()).ok()
                        == Some(b"Image".as_slice()) =>
                {
                    Some(s)
                }
                _ => None,
            })
            .unwrap();

        assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 3);
        assert_eq!(image.dict.get(b"Height").unwrap().as_i64().unwrap(), 2);

        let mut pixels = Vec::new();
        flate2::read::ZlibDecoder::new(image.content.as_slice())
            .read_to_end(&mut pixels)
            .unwrap();
        assert_eq!(pixels.len(), 3 * 2 * 3);
        assert_eq!(&pixels[0..3], &[255, 255, 255]);
        assert_eq!(&pixels[3..6], &[200, 100, 50]);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(612.0), "612");
        assert_eq!(format_number(595.5), "595.5");
        assert_eq!(format_number(0.125), "0.125");
    }
}
