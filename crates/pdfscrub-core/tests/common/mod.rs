//! Shared helpers for integration tests

#![allow(dead_code)]

use std::io::Read;

use lopdf::{dictionary, Document, Object};

pub const LETTER: (i64, i64) = (612, 792);

/// Minimal PDF with one empty page per entry of `sizes`
pub fn pdf_with_pages(sizes: &[(i64, i64)]) -> Vec<u8> {
    let pages: Vec<((i64, i64), i64)> = sizes.iter().map(|&size| (size, 0)).collect();
    pdf_with_rotated_pages(&pages)
}

/// Like [`pdf_with_pages`], with a `/Rotate` angle per page
pub fn pdf_with_rotated_pages(pages: &[((i64, i64), i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = pages
        .iter()
        .map(|&((w, h), rotate)| {
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
            };
            if rotate != 0 {
                page.set("Rotate", rotate);
            }
            Object::Reference(doc.add_object(page))
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => pages.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Decoded page image of an exported document
pub struct PageImage {
    pub width: u32,
    pub height: u32,
    pub media_box: (f32, f32),
    pub rgb: Vec<u8>,
}

impl PageImage {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.rgb[i], self.rgb[i + 1], self.rgb[i + 2]]
    }
}

/// Pull the full-page image out of every page of a Flate-encoded export
pub fn page_images(pdf: &[u8]) -> Vec<PageImage> {
    let doc = Document::load_mem(pdf).unwrap();
    let mut out = Vec::new();

    for page_id in doc.get_pages().values() {
        let page = doc.get_dictionary(*page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
        let image = doc.get_object(image_id).unwrap().as_stream().unwrap();

        assert_eq!(
            image.dict.get(b"Filter").unwrap().as_name().unwrap(),
            b"FlateDecode"
        );
        let mut rgb = Vec::new();
        flate2::read::ZlibDecoder::new(image.content.as_slice())
            .read_to_end(&mut rgb)
            .unwrap();

        out.push(PageImage {
            width: image.dict.get(b"Width").unwrap().as_i64().unwrap() as u32,
            height: image.dict.get(b"Height").unwrap().as_i64().unwrap() as u32,
            media_box: (
                media_box[2].as_float().unwrap(),
                media_box[3].as_float().unwrap(),
            ),
            rgb,
        });
    }
    out
}
