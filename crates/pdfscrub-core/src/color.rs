//! CSS-style color strings

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa` (leading `#` optional) or one of
    /// a handful of CSS color keywords.
    pub fn parse(color: &str) -> Option<Rgba> {
        let color = color.trim();
        if let Some(named) = named_color(color) {
            return Some(named);
        }

        let hex = color.strip_prefix('#').unwrap_or(color);
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();

        match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 17;
                }
                Some(Rgba::opaque(out[0], out[1], out[2]))
            }
            6 => Some(Rgba::opaque(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            8 => Some(Rgba {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
                a: channel(&hex[6..8])?,
            }),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

fn named_color(name: &str) -> Option<Rgba> {
    let color = match name.to_ascii_lowercase().as_str() {
        "black" => Rgba::BLACK,
        "white" => Rgba::WHITE,
        "red" => Rgba::opaque(255, 0, 0),
        "green" => Rgba::opaque(0, 128, 0),
        "blue" => Rgba::opaque(0, 0, 255),
        "yellow" => Rgba::opaque(255, 255, 0),
        "orange" => Rgba::opaque(255, 165, 0),
        "gray" | "grey" => Rgba::opaque(128, 128, 128),
        _ => return None,
    };
    Some(color)
}
