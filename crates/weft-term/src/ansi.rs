// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit; that is the encoder's job. This module
// only knows the byte-level encoding of every terminal command we need.
//
// All cursor positions are 0-indexed in our API and converted to 1-indexed
// for the terminal (ANSI standard uses 1-based coordinates).
//
// All functions return `io::Result` propagated from the underlying writer.
// In practice they never fail when writing to `OutputBuffer` (backed by a Vec).

use std::io::{self, Write};

use crate::cell::{Attr, Style};
use crate::color::Color;

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(x, y)` using the CUP (Cursor Position) sequence.
///
/// Our coordinates are 0-indexed; ANSI CUP is 1-indexed.
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2). Uses the current background color, so
/// callers reset SGR first.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Reset all SGR attributes to terminal defaults (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── Style (SGR) ─────────────────────────────────────────────────────────────

/// Collects SGR parameters and writes them as one `CSI … m` sequence.
struct Params<'a, W: Write> {
    w: &'a mut W,
    first: bool,
}

impl<'a, W: Write> Params<'a, W> {
    const fn new(w: &'a mut W) -> Self {
        Self { w, first: true }
    }

    fn push(&mut self, args: std::fmt::Arguments<'_>) -> io::Result<()> {
        if self.first {
            self.w.write_all(b"\x1b[")?;
            self.first = false;
        } else {
            self.w.write_all(b";")?;
        }
        self.w.write_fmt(args)
    }

    fn finish(self) -> io::Result<()> {
        if self.first {
            Ok(())
        } else {
            self.w.write_all(b"m")
        }
    }
}

/// Foreground SGR parameters, without the `CSI` / `m` framing.
///
/// Compact codes for the 16 standard colors (30–37, 90–97), `38;5;N` for
/// palette indices 16–255, `38;2;R;G;B` for RGB, `39` for the default.
fn fg_params(p: &mut Params<'_, impl Write>, color: Color) -> io::Result<()> {
    match color {
        Color::Default => p.push(format_args!("39")),
        Color::Ansi256(idx @ 0..=7) => p.push(format_args!("{}", 30 + u16::from(idx))),
        Color::Ansi256(idx @ 8..=15) => p.push(format_args!("{}", 82 + u16::from(idx))),
        Color::Ansi256(idx) => p.push(format_args!("38;5;{idx}")),
        Color::Rgb(r, g, b) => p.push(format_args!("38;2;{r};{g};{b}")),
    }
}

/// Background counterpart of [`fg_params`] (40–47, 100–107, 48;…, 49).
fn bg_params(p: &mut Params<'_, impl Write>, color: Color) -> io::Result<()> {
    match color {
        Color::Default => p.push(format_args!("49")),
        Color::Ansi256(idx @ 0..=7) => p.push(format_args!("{}", 40 + u16::from(idx))),
        Color::Ansi256(idx @ 8..=15) => p.push(format_args!("{}", 92 + u16::from(idx))),
        Color::Ansi256(idx) => p.push(format_args!("48;5;{idx}")),
        Color::Rgb(r, g, b) => p.push(format_args!("48;2;{r};{g};{b}")),
    }
}

/// On-codes for each attribute, in emission order.
const ATTR_ON: [(Attr, u8); 6] = [
    (Attr::BOLD, 1),
    (Attr::DIM, 2),
    (Attr::ITALIC, 3),
    (Attr::UNDERLINE, 4),
    (Attr::REVERSE, 7),
    (Attr::STRIKETHROUGH, 9),
];

/// Switch the terminal from style `from` to style `to` in one SGR sequence.
///
/// `from = None` means the terminal state is unknown; the sequence then
/// starts with `0` and sets everything `to` needs. Otherwise only the
/// differences are emitted:
///
/// - removed attributes use their dedicated off-codes (22, 23, 24, 27, 29).
///   Bold and dim share 22, so removing one re-adds the other if it stays.
/// - colors are written only when they change.
///
/// Writes nothing when the styles are equal.
///
/// ```
/// use weft_term::ansi::style;
/// use weft_term::cell::Style;
/// use weft_term::color::Color;
///
/// let mut out = Vec::new();
/// let from = Style::new().fg(Color::RED).bold();
/// let to = Style::new().fg(Color::RED).italic();
/// style(&mut out, Some(from), to).unwrap();
/// assert_eq!(out, b"\x1b[22;3m");
/// ```
pub fn style(w: &mut impl Write, from: Option<Style>, to: Style) -> io::Result<()> {
    let mut p = Params::new(w);

    let from = if let Some(from) = from {
        if from == to {
            return Ok(());
        }
        from
    } else {
        p.push(format_args!("0"))?;
        Style::DEFAULT
    };

    let removed = from.attrs.difference(to.attrs);
    let mut added = to.attrs.difference(from.attrs);

    if removed.intersects(Attr::BOLD | Attr::DIM) {
        p.push(format_args!("22"))?;
        // SGR 22 clears both; put back whichever survives.
        added |= to.attrs & (Attr::BOLD | Attr::DIM);
    }
    if removed.contains(Attr::ITALIC) {
        p.push(format_args!("23"))?;
    }
    if removed.contains(Attr::UNDERLINE) {
        p.push(format_args!("24"))?;
    }
    if removed.contains(Attr::REVERSE) {
        p.push(format_args!("27"))?;
    }
    if removed.contains(Attr::STRIKETHROUGH) {
        p.push(format_args!("29"))?;
    }
    for (flag, code) in ATTR_ON {
        if added.contains(flag) {
            p.push(format_args!("{code}"))?;
        }
    }

    if to.fg != from.fg {
        fg_params(&mut p, to.fg)?;
    }
    if to.bg != from.bg {
        bg_params(&mut p, to.bg)?;
    }

    p.finish()
}

// ─── Synchronized Output ─────────────────────────────────────────────────────

/// Begin synchronized output (DEC Private Mode 2026).
///
/// Tells the terminal to buffer all subsequent output until [`end_sync`],
/// so a half-written frame is never displayed. Terminals without support
/// ignore it.
#[inline]
pub fn begin_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2026h")
}

/// End synchronized output. The terminal renders the buffered frame.
#[inline]
pub fn end_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2026l")
}

// ─── Alternate Screen ───────────────────────────────────────────────────────

/// Enter the alternate screen buffer (DEC Private Mode 1049).
///
/// The original terminal content is preserved and comes back on exit.
#[inline]
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

/// Exit the alternate screen buffer and restore original content.
#[inline]
pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}

// ─── Mouse Protocol ─────────────────────────────────────────────────────────

/// Mouse tracking granularity for SGR mouse protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MouseMode {
    /// Report button press and release events (DEC 1000).
    #[default]
    Click,
    /// Report button events and drag motion (DEC 1000 + 1002).
    Drag,
}

/// Enable SGR mouse tracking at the specified granularity.
///
/// SGR format (DEC 1006) goes first so the terminal never sends a report
/// in the legacy X10 encoding, which cannot represent columns past 223.
pub fn enable_mouse(w: &mut impl Write, mode: MouseMode) -> io::Result<()> {
    w.write_all(b"\x1b[?1006h")?;
    w.write_all(b"\x1b[?1000h")?;
    if mode == MouseMode::Drag {
        w.write_all(b"\x1b[?1002h")?;
    }
    Ok(())
}

/// Disable all mouse tracking, in reverse order of [`enable_mouse`].
pub fn disable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1002l")?;
    w.write_all(b"\x1b[?1000l")?;
    w.write_all(b"\x1b[?1006l")
}

// ─── Bracketed Paste ────────────────────────────────────────────────────────

/// Enable bracketed paste mode (DEC 2004).
///
/// Pasted text arrives wrapped in `\x1b[200~` / `\x1b[201~`, so the
/// application can tell typed input from clipboard content.
#[inline]
pub fn enable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2004h")
}

/// Disable bracketed paste mode.
#[inline]
pub fn disable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2004l")
}

// ─── Focus Reporting ────────────────────────────────────────────────────────

/// Enable terminal focus reporting (DEC 1004).
///
/// The terminal sends `\x1b[I` on focus gain and `\x1b[O` on focus loss.
#[inline]
pub fn enable_focus_reporting(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1004h")
}

/// Disable terminal focus reporting.
#[inline]
pub fn disable_focus_reporting(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1004l")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Helper: run an ANSI function and return its output as a string.
    fn emit<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    #[test]
    fn cursor_to_origin() {
        assert_eq!(emit(|w| cursor_to(w, 0, 0)), "\x1b[1;1H");
    }

    #[test]
    fn cursor_to_is_row_then_column() {
        assert_eq!(emit(|w| cursor_to(w, 9, 4)), "\x1b[5;10H");
    }

    #[test]
    fn cursor_to_max_does_not_overflow() {
        assert_eq!(emit(|w| cursor_to(w, u16::MAX, u16::MAX)), "\x1b[65536;65536H");
    }

    #[test]
    fn cursor_visibility() {
        assert_eq!(emit(|w| cursor_hide(w)), "\x1b[?25l");
        assert_eq!(emit(|w| cursor_show(w)), "\x1b[?25h");
    }

    // ── Screen ──────────────────────────────────────────────────────────

    #[test]
    fn clear_and_reset() {
        assert_eq!(emit(|w| clear_screen(w)), "\x1b[2J");
        assert_eq!(emit(|w| reset(w)), "\x1b[0m");
    }

    // ── Colors ──────────────────────────────────────────────────────────

    /// A style change where only the foreground differs.
    fn fg_only(color: Color) -> String {
        let from = Style::new().fg(Color::Rgb(1, 2, 3));
        emit(|w| style(w, Some(from), Style::new().fg(color)))
    }

    fn bg_only(color: Color) -> String {
        let from = Style::new().bg(Color::Rgb(1, 2, 3));
        emit(|w| style(w, Some(from), Style::new().bg(color)))
    }

    #[test]
    fn fg_encodings() {
        assert_eq!(fg_only(Color::Default), "\x1b[39m");
        assert_eq!(fg_only(Color::BLACK), "\x1b[30m");
        assert_eq!(fg_only(Color::WHITE), "\x1b[37m");
        assert_eq!(fg_only(Color::BRIGHT_BLACK), "\x1b[90m");
        assert_eq!(fg_only(Color::BRIGHT_WHITE), "\x1b[97m");
        assert_eq!(fg_only(Color::Ansi256(16)), "\x1b[38;5;16m");
        assert_eq!(fg_only(Color::Ansi256(255)), "\x1b[38;5;255m");
        assert_eq!(fg_only(Color::Rgb(255, 128, 0)), "\x1b[38;2;255;128;0m");
    }

    #[test]
    fn bg_encodings() {
        assert_eq!(bg_only(Color::Default), "\x1b[49m");
        assert_eq!(bg_only(Color::GREEN), "\x1b[42m");
        assert_eq!(bg_only(Color::BRIGHT_GREEN), "\x1b[102m");
        assert_eq!(bg_only(Color::Ansi256(200)), "\x1b[48;5;200m");
        assert_eq!(bg_only(Color::Rgb(0, 0, 0)), "\x1b[48;2;0;0;0m");
    }

    // ── Attributes ──────────────────────────────────────────────────────

    fn attrs_on(attr: Attr) -> String {
        emit(|w| style(w, Some(Style::DEFAULT), Style::new().attrs(attr)))
    }

    #[test]
    fn attrs_empty_emits_nothing() {
        assert_eq!(attrs_on(Attr::empty()), "");
    }

    #[test]
    fn attrs_combined() {
        assert_eq!(attrs_on(Attr::BOLD), "\x1b[1m");
        assert_eq!(
            attrs_on(Attr::BOLD | Attr::ITALIC | Attr::STRIKETHROUGH),
            "\x1b[1;3;9m"
        );
        assert_eq!(attrs_on(Attr::all()), "\x1b[1;2;3;4;7;9m");
    }

    // ── Style transitions ───────────────────────────────────────────────

    #[test]
    fn style_equal_emits_nothing() {
        let s = Style::new().fg(Color::RED).bold();
        assert_eq!(emit(|w| style(w, Some(s), s)), "");
    }

    #[test]
    fn style_from_unknown_resets_first() {
        assert_eq!(emit(|w| style(w, None, Style::new())), "\x1b[0m");
        assert_eq!(
            emit(|w| style(w, None, Style::new().fg(Color::RED).underline())),
            "\x1b[0;4;31m"
        );
    }

    #[test]
    fn style_changes_only_what_differs() {
        let from = Style::new().fg(Color::RED).bg(Color::BLUE);
        let to = from.bg(Color::Rgb(1, 2, 3));
        assert_eq!(emit(|w| style(w, Some(from), to)), "\x1b[48;2;1;2;3m");
    }

    #[test]
    fn style_attribute_off_codes() {
        let all = Style::new().attrs(Attr::all());
        assert_eq!(
            emit(|w| style(w, Some(all), Style::new())),
            "\x1b[22;23;24;27;29m"
        );
    }

    #[test]
    fn style_removing_bold_keeps_dim() {
        let from = Style::new().bold().dim();
        let to = Style::new().dim();
        assert_eq!(emit(|w| style(w, Some(from), to)), "\x1b[22;2m");
    }

    #[test]
    fn style_back_to_default_colors() {
        let from = Style::new().fg(Color::RED).bg(Color::RED);
        assert_eq!(emit(|w| style(w, Some(from), Style::new())), "\x1b[39;49m");
    }

    // ── Modes ───────────────────────────────────────────────────────────

    #[test]
    fn sync_sequences() {
        assert_eq!(emit(|w| begin_sync(w)), "\x1b[?2026h");
        assert_eq!(emit(|w| end_sync(w)), "\x1b[?2026l");
    }

    #[test]
    fn alt_screen_sequences() {
        assert_eq!(emit(|w| enter_alt_screen(w)), "\x1b[?1049h");
        assert_eq!(emit(|w| exit_alt_screen(w)), "\x1b[?1049l");
    }

    #[test]
    fn mouse_click_mode() {
        assert_eq!(
            emit(|w| enable_mouse(w, MouseMode::Click)),
            "\x1b[?1006h\x1b[?1000h"
        );
    }

    #[test]
    fn mouse_drag_mode() {
        let output = emit(|w| enable_mouse(w, MouseMode::Drag));
        assert!(output.contains("\x1b[?1002h"));
        assert!(output.ends_with("\x1b[?1002h"));
    }

    #[test]
    fn mouse_disable_is_reverse_of_enable() {
        assert_eq!(
            emit(|w| disable_mouse(w)),
            "\x1b[?1002l\x1b[?1000l\x1b[?1006l"
        );
    }

    #[test]
    fn paste_and_focus_sequences() {
        assert_eq!(emit(|w| enable_bracketed_paste(w)), "\x1b[?2004h");
        assert_eq!(emit(|w| disable_bracketed_paste(w)), "\x1b[?2004l");
        assert_eq!(emit(|w| enable_focus_reporting(w)), "\x1b[?1004h");
        assert_eq!(emit(|w| disable_focus_reporting(w)), "\x1b[?1004l");
    }
}
