// SPDX-License-Identifier: MIT
//
// Cell — the atomic unit of terminal rendering.
//
// Every character position on screen is a Cell: one Unicode codepoint plus
// a Style (foreground, background, attribute bits). The whole pipeline exists
// to produce grids of these, diff them, and encode the difference.
//
// Size: 16 bytes per cell, Copy, compared with a derived PartialEq. Two
// cells are equal iff both character and style are equal.
//
// Wide characters (CJK, some emoji) occupy two columns. The first cell
// holds the codepoint; the second is a continuation cell (ch = 0) that
// carries the owner's style. The diff engine never treats a continuation
// cell as a visible change on its own.

use crate::color::Color;

// ─── Text Attributes ─────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Text attributes stored as a compact bitfield.
    ///
    /// Each flag maps to an SGR parameter. Combine with bitwise OR:
    ///
    /// ```
    /// use weft_term::cell::Attr;
    ///
    /// let attrs = Attr::BOLD | Attr::UNDERLINE;
    /// assert!(attrs.contains(Attr::BOLD));
    /// assert!(!attrs.contains(Attr::DIM));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u8 {
        /// SGR 1, cleared by SGR 22.
        const BOLD          = 1 << 0;
        /// SGR 2, cleared by SGR 22.
        const DIM           = 1 << 1;
        /// SGR 3, cleared by SGR 23.
        const ITALIC        = 1 << 2;
        /// SGR 4, cleared by SGR 24.
        const UNDERLINE     = 1 << 3;
        /// SGR 7, cleared by SGR 27.
        const REVERSE       = 1 << 4;
        /// SGR 9, cleared by SGR 29.
        const STRIKETHROUGH = 1 << 5;
    }
}

// ─── Style ───────────────────────────────────────────────────────────────────

/// Foreground, background and attributes: everything about a cell except
/// its character.
///
/// Immutable value type. Builders return a modified copy:
///
/// ```
/// use weft_term::cell::{Attr, Style};
/// use weft_term::color::Color;
///
/// let warn = Style::new().fg(Color::YELLOW).attrs(Attr::BOLD);
/// assert_eq!(warn.fg, Color::YELLOW);
/// assert_ne!(warn, Style::default());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    /// Foreground (text) color.
    pub fg: Color,
    /// Background color.
    pub bg: Color,
    /// Attribute bits.
    pub attrs: Attr,
}

impl Style {
    /// The terminal's default rendition.
    pub const DEFAULT: Self = Self {
        fg: Color::Default,
        bg: Color::Default,
        attrs: Attr::empty(),
    };

    /// Same as [`Style::DEFAULT`].
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::DEFAULT
    }

    #[inline]
    #[must_use]
    pub const fn fg(self, fg: Color) -> Self {
        Self { fg, ..self }
    }

    #[inline]
    #[must_use]
    pub const fn bg(self, bg: Color) -> Self {
        Self { bg, ..self }
    }

    /// Replace the attribute set.
    #[inline]
    #[must_use]
    pub const fn attrs(self, attrs: Attr) -> Self {
        Self { attrs, ..self }
    }

    /// Add attributes to the existing set.
    #[inline]
    #[must_use]
    pub const fn add(self, attrs: Attr) -> Self {
        Self {
            attrs: self.attrs.union(attrs),
            ..self
        }
    }

    #[inline]
    #[must_use]
    pub const fn bold(self) -> Self {
        self.add(Attr::BOLD)
    }

    #[inline]
    #[must_use]
    pub const fn dim(self) -> Self {
        self.add(Attr::DIM)
    }

    #[inline]
    #[must_use]
    pub const fn italic(self) -> Self {
        self.add(Attr::ITALIC)
    }

    #[inline]
    #[must_use]
    pub const fn underline(self) -> Self {
        self.add(Attr::UNDERLINE)
    }

    #[inline]
    #[must_use]
    pub const fn reverse(self) -> Self {
        self.add(Attr::REVERSE)
    }

    /// Whether this is the terminal default rendition.
    #[inline]
    #[must_use]
    pub const fn is_default(self) -> bool {
        self.fg.is_default() && self.bg.is_default() && self.attrs.is_empty()
    }
}

// ─── Cell ────────────────────────────────────────────────────────────────────

/// A single terminal cell.
///
/// # Layout (16 bytes)
///
/// ```text
/// ┌──────────┬──────────┬──────────┬───────┬─────────┐
/// │ ch: u32  │ fg: 4 B  │ bg: 4 B  │ attrs │ padding │
/// └──────────┴──────────┴──────────┴───────┴─────────┘
/// ```
///
/// # Wide Characters
///
/// The first column of a wide character holds the codepoint; the second
/// is a **continuation cell** with `ch = 0`. Build those with
/// [`Cell::continuation`] or, better, let [`Grid`](crate::grid::Grid)
/// do it for you.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Unicode codepoint to display.
    ///
    /// - `0` = continuation cell (second column of a wide character)
    /// - `b' '` (32) = blank (the default)
    pub ch: u32,

    /// Colors and attributes.
    pub style: Style,
}

/// Continuation marker.
const CONTINUATION: u32 = 0;

/// Default character for blank cells.
const SPACE: u32 = b' ' as u32;

impl Cell {
    /// A blank cell: space with the default style.
    pub const BLANK: Self = Self {
        ch: SPACE,
        style: Style::DEFAULT,
    };

    /// A cell with a character and default styling.
    #[inline]
    #[must_use]
    pub const fn new(ch: char) -> Self {
        Self {
            ch: ch as u32,
            style: Style::DEFAULT,
        }
    }

    /// A cell with a character and a style.
    #[inline]
    #[must_use]
    pub const fn styled(ch: char, style: Style) -> Self {
        Self { ch: ch as u32, style }
    }

    /// Second column of a wide character. Carries the owner's style so the
    /// background fills both columns.
    #[inline]
    #[must_use]
    pub const fn continuation(style: Style) -> Self {
        Self {
            ch: CONTINUATION,
            style,
        }
    }

    /// Whether this is a continuation cell.
    #[inline]
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        self.ch == CONTINUATION
    }

    /// Whether this cell is a space with the default style.
    #[inline]
    #[must_use]
    pub const fn is_blank(self) -> bool {
        self.ch == SPACE && self.style.is_default()
    }

    /// The codepoint as a `char`. `None` for continuation cells and invalid
    /// scalar values.
    #[inline]
    #[must_use]
    pub const fn character(self) -> Option<char> {
        if self.ch == CONTINUATION {
            return None;
        }
        char::from_u32(self.ch)
    }

    #[inline]
    #[must_use]
    pub const fn with_style(self, style: Style) -> Self {
        Self { style, ..self }
    }

    /// Reset to a blank cell.
    #[inline]
    pub const fn reset(&mut self) {
        *self = Self::BLANK;
    }
}

impl Default for Cell {
    #[inline]
    fn default() -> Self {
        Self::BLANK
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_continuation() {
            return write!(f, "Cell(continuation)");
        }
        let ch = char::from_u32(self.ch).unwrap_or('?');
        write!(f, "Cell({ch:?}")?;
        if !self.style.fg.is_default() {
            write!(f, ", fg={:?}", self.style.fg)?;
        }
        if !self.style.bg.is_default() {
            write!(f, ", bg={:?}", self.style.bg)?;
        }
        if !self.style.attrs.is_empty() {
            write!(f, ", {:?}", self.style.attrs)?;
        }
        write!(f, ")")
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
