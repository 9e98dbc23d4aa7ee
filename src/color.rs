//! Color utilities for label rendering.
//!
//! Label volumes are colored through a lookup table built from a
//! `label -> "#RRGGBB"` map. Label 0 is always transparent black.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, ViewerError};

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Same color with a different alpha.
    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Pixel value for the `image` crate.
    pub fn to_pixel(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }
}

/// Parse a `#RRGGBB` (or `RRGGBB`) hex string.
pub fn hex_to_rgb(hex: &str) -> Result<[u8; 3]> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ViewerError::InvalidColor(hex.to_string()));
    }

    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map_err(|_| ViewerError::InvalidColor(hex.to_string()))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Lookup table from integer label to display color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    colors: BTreeMap<u32, Rgba>,
}

impl ColorTable {
    /// Build a table from a `label -> hex` map. Entries for label 0 are ignored.
    pub fn from_hex_map(map: &BTreeMap<String, String>) -> Result<Self> {
        let mut colors = BTreeMap::new();
        for (label, hex) in map {
            let label: u32 = label
                .trim()
                .parse()
                .map_err(|_| ViewerError::InvalidColor(format!("{label}: {hex}")))?;
            if label == 0 {
                continue;
            }
            let [r, g, b] = hex_to_rgb(hex)?;
            colors.insert(label, Rgba::new(r, g, b, 0xFF));
        }
        Ok(Self { colors })
    }

    /// Color for a label. Label 0 and unknown labels are transparent.
    pub fn color(&self, label: u32) -> Rgba {
        self.colors.get(&label).copied().unwrap_or(Rgba::TRANSPARENT)
    }

    /// Check whether a non-zero label has a color.
    pub fn contains(&self, label: u32) -> bool {
        self.colors.contains_key(&label)
    }

    /// All labels with a color, ascending.
    pub fn labels(&self) -> impl Iterator<Item = u32> + '_ {
        self.colors.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#FF0000").unwrap(), [255, 0, 0]);
        assert_eq!(hex_to_rgb("00f00f").unwrap(), [0, 240, 15]);
        assert!(hex_to_rgb("#FFF").is_err());
        assert!(hex_to_rgb("#GG0000").is_err());
    }

    #[test]
    fn test_label_zero_is_transparent() {
        let table = ColorTable::from_hex_map(&map(&[("0", "#FFFFFF"), ("1", "#FF0000")])).unwrap();
        assert_eq!(table.color(0), Rgba::TRANSPARENT);
        assert_eq!(table.color(1), Rgba::new(255, 0, 0, 255));
        assert!(!table.contains(0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unknown_label_is_transparent() {
        let table = ColorTable::from_hex_map(&map(&[("2", "#0000FF")])).unwrap();
        assert_eq!(table.color(7), Rgba::TRANSPARENT);
        assert_eq!(table.labels().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_invalid_label_key() {
        assert!(ColorTable::from_hex_map(&map(&[("one", "#FF0000")])).is_err());
    }
}
