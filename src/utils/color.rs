use std::{fmt::Display, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Colors offered by default when creating a habit.
pub const PALETTE: [HexColor; 5] = [
    HexColor([0x40, 0x59, 0x52]),
    HexColor([0x9C, 0x9B, 0x7A]),
    HexColor([0xFF, 0xD3, 0x93]),
    HexColor([0xFF, 0x97, 0x4F]),
    HexColor([0xF5, 0x4F, 0x29]),
];

/// Used when a habit is created without picking a color.
pub const DEFAULT_COLOR: HexColor = HexColor([0xFF, 0x3B, 0x30]);

/// An opaque RGB color. Always serialized as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor([u8; 3]);

impl HexColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    pub fn red(&self) -> u8 {
        self.0[0]
    }

    pub fn green(&self) -> u8 {
        self.0[1]
    }

    pub fn blue(&self) -> u8 {
        self.0[2]
    }
}

impl Display for HexColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02X}{g:02X}{b:02X}")
    }
}

impl FromStr for HexColor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(anyhow!("Can't parse {s} into a #RRGGBB color"));
        }
        let value = u32::from_str_radix(hex, 16)?;
        Ok(Self([
            ((value >> 16) & 0xFF) as u8,
            ((value >> 8) & 0xFF) as u8,
            (value & 0xFF) as u8,
        ]))
    }
}

impl TryFrom<String> for HexColor {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.to_string()
    }
}

/// Accepts either a hex color or a 1-based index into [PALETTE].
pub fn parse_color_choice(s: &str) -> anyhow::Result<HexColor> {
    // "123456" is a color, not an index
    if s.len() > 2 {
        return s.parse();
    }
    match s.parse::<usize>() {
        Ok(index) if (1..=PALETTE.len()).contains(&index) => Ok(PALETTE[index - 1]),
        Ok(index) => Err(anyhow!(
            "Palette index {index} is out of range 1..={}",
            PALETTE.len()
        )),
        Err(_) => s.parse(),
    }
}
