// SPDX-License-Identifier: MIT
//
// Escape encoder — diff instructions in, terminal bytes out.
//
// Two components work together to minimize terminal I/O:
//
//   OutputBuffer — accumulates all bytes of a frame in memory so the frame
//   goes out in a single write() syscall.
//
//   Encoder — remembers what the terminal currently looks like (cursor
//   position, SGR state, cursor visibility) and skips every escape sequence
//   that would not change anything. Consecutive runs in one style produce
//   no SGR at all; a run starting exactly where the previous one ended
//   produces no cursor move.
//
// Frame shape:
//
//   [sync begin] [SGR 0 + clear, full redraw only] runs… [SGR 0]
//   [cursor restore] [sync end]
//
// A frame that changes nothing encodes to zero bytes.
//
// The last column is special. After a character is printed there the
// terminal enters a "pending wrap" state whose cursor position differs
// between terminals, so the cached position is dropped and the next run
// always positions explicitly.

use std::io::{self, Write};

use crate::ansi;
use crate::cell::Style;
use crate::diff::Instruction;
use crate::grid::string_width;

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// A byte buffer that accumulates one frame for a single `write()` syscall.
///
/// Default capacity: 16 KB, enough for most frames without reallocation.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 16_384;

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn push_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Clear the buffer for reuse (keeps allocated capacity).
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write accumulated output to `w`, flush it, and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails. The buffer is left intact
    /// in that case.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if !self.buf.is_empty() {
            w.write_all(&self.buf)?;
            w.flush()?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Real flushing goes through flush_to().
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── EncodeStats ─────────────────────────────────────────────────────────────

/// Counters from the most recent frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeStats {
    /// Cursor position sequences emitted.
    pub cursor_moves: usize,
    /// Cursor moves avoided because the cursor was already in place.
    pub cursor_moves_skipped: usize,
    /// SGR sequences emitted.
    pub style_changes: usize,
    /// Bytes in the frame.
    pub bytes: usize,
}

// ─── Encoder ─────────────────────────────────────────────────────────────────

/// Stateful instruction encoder.
///
/// # Usage
///
/// ```
/// use weft_term::cell::Style;
/// use weft_term::diff::Instruction;
/// use weft_term::encode::Encoder;
///
/// let mut enc = Encoder::new(80);
/// enc.set_sync_output(false);
/// enc.begin_frame(false);
/// enc.encode(&[Instruction::WriteStyledRun {
///     x: 2,
///     y: 0,
///     text: "hi".into(),
///     style: Style::new(),
/// }]);
/// enc.finish_frame(Some((0, 1)));
/// // SGR state starts unknown, so the first run resets it.
/// assert_eq!(enc.output(), b"\x1b[1;3H\x1b[0mhi\x1b[2;1H\x1b[?25h");
/// ```
#[derive(Debug, Clone)]
pub struct Encoder {
    out: OutputBuffer,
    /// Where the terminal cursor is, if known.
    cursor: Option<(u16, u16)>,
    /// Current SGR state, if known.
    style: Option<Style>,
    /// Whether the cursor is visible, if known.
    cursor_visible: Option<bool>,
    width: u16,
    sync_output: bool,
    hide_idle_cursor: bool,
    /// Output length right after the frame prologue.
    body_start: usize,
    full: bool,
    stats: EncodeStats,
}

impl Encoder {
    /// An encoder for a screen `width` columns wide. All terminal state
    /// starts unknown.
    #[must_use]
    pub fn new(width: u16) -> Self {
        Self {
            out: OutputBuffer::new(),
            cursor: None,
            style: None,
            cursor_visible: None,
            width,
            sync_output: true,
            hide_idle_cursor: true,
            body_start: 0,
            full: false,
            stats: EncodeStats::default(),
        }
    }

    /// Update the screen width after a resize. Invalidates the cursor cache.
    pub const fn set_width(&mut self, width: u16) {
        self.width = width;
        self.cursor = None;
    }

    /// Wrap frames in synchronized output (DEC 2026). On by default.
    pub const fn set_sync_output(&mut self, on: bool) {
        self.sync_output = on;
    }

    /// Hide the cursor in frames that do not place it. On by default.
    pub const fn set_hide_idle_cursor(&mut self, on: bool) {
        self.hide_idle_cursor = on;
    }

    /// Forget everything known about the terminal. The next frame sets
    /// position, style and visibility explicitly.
    pub const fn invalidate(&mut self) {
        self.cursor = None;
        self.style = None;
        self.cursor_visible = None;
    }

    /// Tell the encoder the terminal cursor visibility, e.g. after the
    /// terminal layer hid it during startup.
    pub const fn assume_cursor_visible(&mut self, visible: bool) {
        self.cursor_visible = Some(visible);
    }

    #[inline]
    #[must_use]
    pub const fn stats(&self) -> EncodeStats {
        self.stats
    }

    /// The bytes of the current frame.
    #[inline]
    #[must_use]
    pub fn output(&self) -> &[u8] {
        self.out.as_bytes()
    }

    /// Write the frame to `w` and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        self.out.flush_to(w)
    }

    /// Start a frame. A `full` frame resets SGR and clears the screen
    /// first; the diff for it must then be a full redraw.
    pub fn begin_frame(&mut self, full: bool) {
        self.out.clear();
        self.stats = EncodeStats::default();
        self.full = full;

        if self.sync_output {
            ansi::begin_sync(&mut self.out).ok();
        }
        self.body_start = self.out.len();

        if full {
            // Clearing paints with the current background, so reset first.
            ansi::reset(&mut self.out).ok();
            ansi::clear_screen(&mut self.out).ok();
            self.style = Some(Style::DEFAULT);
            self.cursor = None;
        }
    }

    /// Encode a batch of instructions.
    pub fn encode(&mut self, instructions: &[Instruction]) {
        for ins in instructions {
            self.apply(ins);
        }
    }

    /// Encode one instruction.
    pub fn apply(&mut self, ins: &Instruction) {
        match ins {
            Instruction::MoveCursorTo { x, y } => self.move_to(*x, *y),
            Instruction::WriteStyledRun { x, y, text, style } => {
                if text.is_empty() {
                    return;
                }
                self.move_to(*x, *y);
                self.set_style(*style);
                self.out.push_str(text);

                let end = usize::from(*x) + string_width(text);
                self.cursor = if end >= usize::from(self.width) {
                    None
                } else {
                    // end < width <= u16::MAX.
                    #[allow(clippy::cast_possible_truncation)]
                    Some((end as u16, *y))
                };
            }
        }
    }

    /// Finish the frame: reset SGR, put the cursor where the application
    /// wants it (or hide it), close synchronized output.
    ///
    /// Returns the frame's byte length. A frame with nothing to say is
    /// dropped entirely and returns 0.
    pub fn finish_frame(&mut self, cursor: Option<(u16, u16)>) -> usize {
        if self.style != Some(Style::DEFAULT) {
            ansi::reset(&mut self.out).ok();
            self.style = Some(Style::DEFAULT);
            self.stats.style_changes += 1;
        }

        match cursor {
            Some((x, y)) => {
                self.move_to(x, y);
                self.set_cursor_visible(true);
            }
            None if self.hide_idle_cursor => self.set_cursor_visible(false),
            None => {}
        }

        if self.out.len() == self.body_start && !self.full {
            self.out.clear();
        } else if self.sync_output {
            ansi::end_sync(&mut self.out).ok();
        }

        self.stats.bytes = self.out.len();
        self.out.len()
    }

    fn move_to(&mut self, x: u16, y: u16) {
        if self.cursor == Some((x, y)) {
            self.stats.cursor_moves_skipped += 1;
            return;
        }
        ansi::cursor_to(&mut self.out, x, y).ok();
        self.cursor = Some((x, y));
        self.stats.cursor_moves += 1;
    }

    fn set_style(&mut self, style: Style) {
        if self.style == Some(style) {
            return;
        }
        ansi::style(&mut self.out, self.style, style).ok();
        self.style = Some(style);
        self.stats.style_changes += 1;
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        if self.cursor_visible == Some(visible) {
            return;
        }
        if visible {
            ansi::cursor_show(&mut self.out).ok();
        } else {
            ansi::cursor_hide(&mut self.out).ok();
        }
        self.cursor_visible = Some(visible);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
