// SPDX-License-Identifier: MIT
//
// Terminal colors.
//
// A cell color is one of three things the terminal understands natively:
// the terminal's own default, an index into the 16/256-color palette, or a
// 24-bit RGB triple. Anything fancier (gradients, blending, themes) lives
// above this layer and resolves to one of these before it reaches a cell.
//
// Size: 4 bytes. Comparison is a plain derived `PartialEq`, which is what
// the diff engine leans on when it compares millions of cells per second.

use std::fmt;

// ─── Color ───────────────────────────────────────────────────────────────────

/// A fully resolved terminal color.
///
/// # Examples
///
/// ```
/// use weft_term::color::Color;
///
/// assert_eq!(Color::hex("#ff8000"), Some(Color::Rgb(255, 128, 0)));
/// assert_eq!(Color::RED, Color::Ansi256(1));
/// assert!(Color::Default.is_default());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// The terminal's configured default (SGR 39 / 49).
    #[default]
    Default,
    /// Palette index. 0–7 standard, 8–15 bright, 16–255 extended.
    Ansi256(u8),
    /// 24-bit `TrueColor`.
    Rgb(u8, u8, u8),
}

impl Color {
    pub const BLACK: Self = Self::Ansi256(0);
    pub const RED: Self = Self::Ansi256(1);
    pub const GREEN: Self = Self::Ansi256(2);
    pub const YELLOW: Self = Self::Ansi256(3);
    pub const BLUE: Self = Self::Ansi256(4);
    pub const MAGENTA: Self = Self::Ansi256(5);
    pub const CYAN: Self = Self::Ansi256(6);
    pub const WHITE: Self = Self::Ansi256(7);
    pub const BRIGHT_BLACK: Self = Self::Ansi256(8);
    pub const BRIGHT_RED: Self = Self::Ansi256(9);
    pub const BRIGHT_GREEN: Self = Self::Ansi256(10);
    pub const BRIGHT_YELLOW: Self = Self::Ansi256(11);
    pub const BRIGHT_BLUE: Self = Self::Ansi256(12);
    pub const BRIGHT_MAGENTA: Self = Self::Ansi256(13);
    pub const BRIGHT_CYAN: Self = Self::Ansi256(14);
    pub const BRIGHT_WHITE: Self = Self::Ansi256(15);

    /// Whether this is the terminal default color.
    #[inline]
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }

    /// Parse `#rgb`, `#rrggbb`, `rgb` or `rrggbb` into an RGB color.
    ///
    /// Returns `None` for anything else.
    #[must_use]
    pub fn hex(s: &str) -> Option<Self> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        match digits.len() {
            3 => {
                let mut rgb = [0u8; 3];
                for (slot, ch) in rgb.iter_mut().zip(digits.chars()) {
                    let v = u8::try_from(ch.to_digit(16)?).ok()?;
                    *slot = v * 17;
                }
                Some(Self::Rgb(rgb[0], rgb[1], rgb[2]))
            }
            6 => {
                let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
                let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
                let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
                Some(Self::Rgb(r, g, b))
            }
            _ => None,
        }
    }

    /// Approximate RGB value for palette colors (xterm defaults).
    ///
    /// Returns `None` for [`Color::Default`], whose value only the terminal knows.
    #[must_use]
    pub const fn to_rgb(self) -> Option<(u8, u8, u8)> {
        match self {
            Self::Default => None,
            Self::Rgb(r, g, b) => Some((r, g, b)),
            Self::Ansi256(idx) => Some(ansi256_to_rgb(idx)),
        }
    }
}

/// xterm's default palette for indices 0–255.
const fn ansi256_to_rgb(idx: u8) -> (u8, u8, u8) {
    const BASE: [(u8, u8, u8); 16] = [
        (0, 0, 0),
        (205, 0, 0),
        (0, 205, 0),
        (205, 205, 0),
        (0, 0, 238),
        (205, 0, 205),
        (0, 205, 205),
        (229, 229, 229),
        (127, 127, 127),
        (255, 0, 0),
        (0, 255, 0),
        (255, 255, 0),
        (92, 92, 255),
        (255, 0, 255),
        (0, 255, 255),
        (255, 255, 255),
    ];
    const fn cube(v: u8) -> u8 {
        if v == 0 { 0 } else { 55 + v * 40 }
    }

    if idx < 16 {
        BASE[idx as usize]
    } else if idx < 232 {
        let i = idx - 16;
        (cube(i / 36), cube((i / 6) % 6), cube(i % 6))
    } else {
        let v = 8 + (idx - 232) * 10;
        (v, v, v)
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::Ansi256(idx) => write!(f, "Ansi256({idx})"),
            Self::Rgb(r, g, b) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<(u8, u8, u8)> for Color {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::Rgb(r, g, b)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_is_4_bytes() {
        assert_eq!(std::mem::size_of::<Color>(), 4);
    }

    #[test]
    fn default_is_default() {
        assert_eq!(Color::default(), Color::Default);
        assert!(Color::Default.is_default());
        assert!(!Color::RED.is_default());
    }

    #[test]
    fn hex_long_form() {
        assert_eq!(Color::hex("#102030"), Some(Color::Rgb(0x10, 0x20, 0x30)));
        assert_eq!(Color::hex("A0B0C0"), Some(Color::Rgb(0xA0, 0xB0, 0xC0)));
    }

    #[test]
    fn hex_short_form_expands() {
        assert_eq!(Color::hex("#f80"), Some(Color::Rgb(255, 136, 0)));
    }

    #[test]
    fn hex_rejects_garbage() {
        assert_eq!(Color::hex("#12345"), None);
        assert_eq!(Color::hex("#gg0000"), None);
        assert_eq!(Color::hex(""), None);
    }

    #[test]
    fn palette_to_rgb() {
        assert_eq!(Color::BLACK.to_rgb(), Some((0, 0, 0)));
        assert_eq!(Color::BRIGHT_WHITE.to_rgb(), Some((255, 255, 255)));
        // 16 is the first cube entry (black), 231 the last (white).
        assert_eq!(Color::Ansi256(16).to_rgb(), Some((0, 0, 0)));
        assert_eq!(Color::Ansi256(231).to_rgb(), Some((255, 255, 255)));
        assert_eq!(Color::Ansi256(232).to_rgb(), Some((8, 8, 8)));
        assert_eq!(Color::Default.to_rgb(), None);
    }

    #[test]
    fn debug_formats_rgb_as_hex() {
        assert_eq!(format!("{:?}", Color::Rgb(255, 0, 16)), "#ff0010");
        assert_eq!(format!("{}", Color::Ansi256(42)), "Ansi256(42)");
    }

    #[test]
    fn from_tuple() {
        assert_eq!(Color::from((1, 2, 3)), Color::Rgb(1, 2, 3));
    }
}
