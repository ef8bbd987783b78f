// SPDX-License-Identifier: MIT
//
// Terminal input decoder.
//
// Turns raw stdin bytes into structured events: keys, mouse actions,
// paste content, and focus changes. Handles every protocol we enable
// in `terminal.rs`:
//
// - Legacy CSI sequences (arrows, function keys, editing keys) with
//   xterm modifier parameters (`ESC [ 1 ; 5 A` = Ctrl+Up)
// - SS3 sequences (F1-F4 and arrows in application cursor mode)
// - SGR mouse protocol (press / release / drag / wheel)
// - Bracketed paste (everything between the delimiters is one event)
// - Focus reporting (terminal gained / lost focus)
// - Alt+key (ESC followed by a key)
// - UTF-8 multi-byte characters
//
// # Design
//
// The decoder is a byte-at-a-time state machine:
//
//   Ground ──ESC──▶ Escape ──[──▶ Csi ──<──▶ CsiMouse
//     │               │            │            │
//     │               O            └─ 200~ ──▶ BracketedPaste
//     │               ▼                           │
//     │              Ss3                    ESC [ 201 ~
//     ▼                                           ▼
//   Utf8 (lead byte seen, waiting for            Ground
//         continuation bytes)
//
// Because the whole position in a sequence lives in `State` plus a small
// parameter buffer, a sequence split across any number of reads decodes
// exactly as if it had arrived in one piece.
//
// Bad input never stops decoding. A malformed or unsupported sequence is
// logged at debug level, counted, and dropped; the machine returns to
// Ground (or straight to Escape when the culprit was a fresh ESC).
//
// A lone ESC is ambiguous: it is either the Escape key or the first byte of
// a sequence still in flight. The caller resolves it by calling
// [`Decoder::flush`] once no more bytes have arrived for a short while.
//
// A paste is bounded too. It is handed out in `MAX_PASTE` chunks, and a
// paste whose end marker never arrives is closed by [`Decoder::end_paste`]
// after a longer quiet period, so keys (Ctrl-C included) reach the
// application again.

use bitflags::bitflags;

use crate::grid::char_width;

// ─── Event Types ────────────────────────────────────────────────────────────

/// A decoded terminal input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A key press.
    Key(KeyEvent),
    /// A mouse button, wheel or motion report.
    Mouse(MouseEvent),
    /// Bracketed paste content, delivered as one piece (or as consecutive
    /// chunks past [`MAX_PASTE`] bytes).
    Paste(String),
    /// Terminal window gained focus (`CSI I`).
    FocusGained,
    /// Terminal window lost focus (`CSI O`).
    FocusLost,
}

/// A key press with its modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// Which key was pressed.
    pub code: KeyCode,
    /// Active modifier keys.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    #[inline]
    #[must_use]
    pub const fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }

    /// A key with no modifiers.
    #[inline]
    #[must_use]
    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, Modifiers::empty())
    }

    /// The character for [`KeyCode::Char`] keys.
    #[inline]
    #[must_use]
    pub const fn rune(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c) => Some(c),
            _ => None,
        }
    }

    /// Whether this is Ctrl+C, the conventional interrupt key.
    #[inline]
    #[must_use]
    pub fn is_ctrl_c(&self) -> bool {
        self.code == KeyCode::Char('c') && self.modifiers == Modifiers::CTRL
    }
}

/// Identity of a key.
///
/// Printable characters use [`Char`](KeyCode::Char). Function keys
/// F1–F20 use [`F`](KeyCode::F). Shift+Tab arrives as `Tab` with
/// [`Modifiers::SHIFT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A Unicode character.
    Char(char),
    // ── Named keys ──────────────────────────────────────────────
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    Insert,
    // ── Navigation ──────────────────────────────────────────────
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    // ── Function keys ───────────────────────────────────────────
    /// F1 through F20.
    F(u8),
}

bitflags! {
    /// Keyboard modifier flags.
    ///
    /// Uses the xterm encoding, where a CSI modifier parameter is
    /// `1 + bitmask`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const CTRL  = 0b0000_0100;
        const SUPER = 0b0000_1000;
        const HYPER = 0b0001_0000;
        const META  = 0b0010_0000;
    }
}

/// A mouse report with 0-based cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseEvent {
    /// 0-indexed column.
    pub x: u16,
    /// 0-indexed row.
    pub y: u16,
    pub button: MouseButton,
    pub action: MouseAction,
    /// Modifier keys held during the event.
    pub modifiers: Modifiers,
}

/// Which button (or wheel direction) a mouse report is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    WheelLeft,
    WheelRight,
    /// Motion with no button held, or a release whose button the terminal
    /// did not say.
    None,
}

impl MouseButton {
    /// Whether this is a wheel direction rather than a real button.
    #[inline]
    #[must_use]
    pub const fn is_wheel(self) -> bool {
        matches!(
            self,
            Self::WheelUp | Self::WheelDown | Self::WheelLeft | Self::WheelRight
        )
    }
}

/// What a mouse report says happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseAction {
    /// Button pressed, or wheel turned one notch.
    Press,
    Release,
    /// Pointer moved (with `button` held, if any).
    Motion,
}

// ─── DecodeError ────────────────────────────────────────────────────────────

/// Why a byte sequence was dropped.
///
/// Never returned to callers: the decoder logs it, counts it, and carries
/// on. Exposed for [`Decoder::last_error`] and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("malformed SGR mouse report")]
    MalformedMouse,
    #[error("unsupported escape sequence")]
    Unsupported,
    #[error("escape sequence longer than {MAX_SEQUENCE} bytes")]
    Overflow,
    #[error("escape sequence interrupted by ESC")]
    Interrupted,
    #[error("bracketed paste never ended")]
    UnterminatedPaste,
}

// ─── Decoder ────────────────────────────────────────────────────────────────

/// Longest CSI parameter string accepted. Real sequences are well under
/// 20 bytes; anything longer is garbage and gets skipped.
pub const MAX_SEQUENCE: usize = 64;

/// Paste bytes held before they are handed out as a [`Event::Paste`]
/// chunk. A longer paste arrives as several consecutive paste events.
pub const MAX_PASTE: usize = 1 << 20;

/// Closing delimiter of a bracketed paste: `ESC [ 201 ~`.
const PASTE_END: &[u8] = b"\x1b[201~";

/// Position inside an escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between events.
    Ground,
    /// UTF-8 lead byte seen; `len` of `need` bytes collected.
    Utf8 {
        buf: [u8; 4],
        len: u8,
        need: u8,
        alt: bool,
    },
    /// Saw ESC.
    Escape,
    /// Saw `ESC [`; parameters accumulate in `params`.
    Csi,
    /// Saw `ESC [ <`; mouse parameters accumulate in `params`.
    CsiMouse,
    /// Saw `ESC O`.
    Ss3,
    /// Skipping the rest of a rejected sequence up to its final byte.
    Ignore,
    /// Inside a bracketed paste.
    BracketedPaste,
}

/// Incremental terminal input decoder.
///
/// Feed raw bytes via [`advance`](Decoder::advance) and collect the
/// events. Partial sequences are remembered and resumed on the next call.
///
/// ```
/// use weft_term::input::{Decoder, Event, KeyCode, KeyEvent, Modifiers};
///
/// let mut decoder = Decoder::new();
/// assert!(decoder.advance(b"\x1b[1;").is_empty());
/// assert_eq!(
///     decoder.advance(b"5A"),
///     [Event::Key(KeyEvent::new(KeyCode::Up, Modifiers::CTRL))]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Decoder {
    state: State,
    /// CSI / mouse parameter bytes of the sequence in progress.
    params: Vec<u8>,
    /// Paste content collected so far.
    paste: Vec<u8>,
    /// Bytes of `PASTE_END` matched at the end of `paste` input.
    paste_match: usize,
    /// Part of the current paste was already handed out.
    paste_chunked: bool,
    tab_width: u8,
    dropped: u64,
    last_error: Option<DecodeError>,
}

impl Decoder {
    /// A decoder in the Ground state, expanding pasted tabs to 4 columns.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            params: Vec::with_capacity(16),
            paste: Vec::new(),
            paste_match: 0,
            paste_chunked: false,
            tab_width: 4,
            dropped: 0,
            last_error: None,
        }
    }

    /// Tab stop width applied to pasted text. 0 keeps tabs as-is.
    #[must_use]
    pub const fn with_tab_width(mut self, width: u8) -> Self {
        self.tab_width = width;
        self
    }

    /// Decode `bytes`, returning every event they complete.
    pub fn advance(&mut self, bytes: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        self.advance_into(bytes, &mut events);
        events
    }

    /// Like [`advance`](Self::advance), appending to an existing vector.
    pub fn advance_into(&mut self, bytes: &[u8], events: &mut Vec<Event>) {
        for &b in bytes {
            self.step(b, events);
        }
    }

    /// Whether the decoder is partway through a sequence that a quiet
    /// period should resolve with [`flush`](Self::flush). A paste in
    /// progress does not count: pastes are never cut short by a timeout.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        !matches!(self.state, State::Ground | State::BracketedPaste)
    }

    /// Whether a bracketed paste is being collected.
    #[must_use]
    pub const fn in_paste(&self) -> bool {
        matches!(self.state, State::BracketedPaste)
    }

    /// Number of sequences dropped as malformed or unsupported.
    #[must_use]
    pub const fn dropped_sequences(&self) -> u64 {
        self.dropped
    }

    /// Why the most recent sequence was dropped.
    #[must_use]
    pub const fn last_error(&self) -> Option<DecodeError> {
        self.last_error
    }

    /// Resolve a sequence left hanging after a quiet period.
    ///
    /// A lone ESC becomes the Escape key; `ESC [` and `ESC O` become
    /// Alt+`[` and Alt+`O`. Anything longer is incomplete garbage and is
    /// dropped.
    pub fn flush(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        match self.state {
            State::Ground | State::BracketedPaste => return events,
            State::Escape => events.push(key(KeyCode::Escape, Modifiers::empty())),
            State::Csi if self.params.is_empty() => {
                events.push(key(KeyCode::Char('['), Modifiers::ALT));
            }
            State::Ss3 => events.push(key(KeyCode::Char('O'), Modifiers::ALT)),
            State::Utf8 { .. } => self.reject(DecodeError::InvalidUtf8),
            State::Csi | State::CsiMouse | State::Ignore => self.reject(DecodeError::Interrupted),
        }
        self.params.clear();
        self.state = State::Ground;
        events
    }

    /// Give up on a paste whose end marker never came.
    ///
    /// Whatever was collected is delivered as a final paste event and the
    /// decoder returns to Ground, so keys work again. Meant for a quiet
    /// period much longer than the ESC timeout. Does nothing outside a
    /// paste.
    pub fn end_paste(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.state != State::BracketedPaste {
            return events;
        }
        self.reject(DecodeError::UnterminatedPaste);
        // A partial end marker was content after all.
        self.paste.extend_from_slice(&PASTE_END[..self.paste_match]);
        self.finish_paste(&mut events);
        events
    }

    // ─── State Machine ──────────────────────────────────────────────────

    fn step(&mut self, b: u8, out: &mut Vec<Event>) {
        match self.state {
            State::Ground => self.ground(b, false, out),
            State::Utf8 { .. } => self.utf8(b, out),
            State::Escape => self.escape(b, out),
            State::Csi => self.csi(b, out),
            State::CsiMouse => self.csi_mouse(b, out),
            State::Ss3 => self.ss3(b, out),
            State::Ignore => match b {
                0x1B => self.state = State::Escape,
                0x40..=0x7E => self.state = State::Ground,
                _ => {}
            },
            State::BracketedPaste => self.paste_byte(b, out),
        }
    }

    fn ground(&mut self, b: u8, alt: bool, out: &mut Vec<Event>) {
        if b == 0x1B {
            self.state = State::Escape;
            return;
        }
        if let Some(need) = utf8_len(b) {
            self.state = State::Utf8 {
                buf: [b, 0, 0, 0],
                len: 1,
                need,
                alt,
            };
            return;
        }
        match single_byte_key(b) {
            Some(mut k) => {
                if alt {
                    k.modifiers |= Modifiers::ALT;
                }
                out.push(Event::Key(k));
            }
            None => self.reject(DecodeError::InvalidUtf8),
        }
    }

    fn utf8(&mut self, b: u8, out: &mut Vec<Event>) {
        let State::Utf8 {
            mut buf,
            mut len,
            need,
            alt,
        } = self.state
        else {
            return;
        };

        if b & 0xC0 != 0x80 {
            // Sequence cut short. Drop it and let `b` start over.
            self.reject(DecodeError::InvalidUtf8);
            self.state = State::Ground;
            self.step(b, out);
            return;
        }

        buf[usize::from(len)] = b;
        len += 1;
        if len < need {
            self.state = State::Utf8 {
                buf,
                len,
                need,
                alt,
            };
            return;
        }

        self.state = State::Ground;
        match std::str::from_utf8(&buf[..usize::from(len)])
            .ok()
            .and_then(|s| s.chars().next())
        {
            Some(ch) => {
                let mods = if alt { Modifiers::ALT } else { Modifiers::empty() };
                out.push(key(KeyCode::Char(ch), mods));
            }
            None => self.reject(DecodeError::InvalidUtf8),
        }
    }

    fn escape(&mut self, b: u8, out: &mut Vec<Event>) {
        self.state = State::Ground;
        match b {
            b'[' => {
                self.params.clear();
                self.state = State::Csi;
            }
            b'O' => self.state = State::Ss3,
            0x1B => {
                // Two presses of Escape: the second may start a sequence.
                out.push(key(KeyCode::Escape, Modifiers::empty()));
                self.state = State::Escape;
            }
            _ if utf8_len(b).is_some() || single_byte_key(b).is_some() => {
                self.ground(b, true, out);
            }
            _ => {
                // Not a key at all: the ESC stands alone.
                out.push(key(KeyCode::Escape, Modifiers::empty()));
                self.ground(b, false, out);
            }
        }
    }

    fn csi(&mut self, b: u8, out: &mut Vec<Event>) {
        match b {
            b'<' if self.params.is_empty() => self.state = State::CsiMouse,
            0x20..=0x3F => self.push_param(b),
            0x40..=0x7E => {
                self.state = State::Ground;
                self.dispatch_csi(b, out);
                self.params.clear();
            }
            0x1B => {
                self.reject(DecodeError::Interrupted);
                self.state = State::Escape;
            }
            _ => {
                self.reject(DecodeError::Unsupported);
                self.state = State::Ground;
            }
        }
    }

    fn csi_mouse(&mut self, b: u8, out: &mut Vec<Event>) {
        match b {
            b'0'..=b'9' | b';' => self.push_param(b),
            b'M' | b'm' => {
                self.state = State::Ground;
                match decode_sgr_mouse(&self.params, b == b'm') {
                    Ok(mouse) => out.push(Event::Mouse(mouse)),
                    Err(e) => self.reject(e),
                }
                self.params.clear();
            }
            0x1B => {
                self.reject(DecodeError::Interrupted);
                self.state = State::Escape;
            }
            0x40..=0x7E => {
                self.reject(DecodeError::MalformedMouse);
                self.state = State::Ground;
            }
            _ => {
                self.reject(DecodeError::MalformedMouse);
                self.state = State::Ignore;
            }
        }
    }

    fn ss3(&mut self, b: u8, out: &mut Vec<Event>) {
        self.state = State::Ground;
        let code = match b {
            b'A' => KeyCode::Up,
            b'B' => KeyCode::Down,
            b'C' => KeyCode::Right,
            b'D' => KeyCode::Left,
            b'H' => KeyCode::Home,
            b'F' => KeyCode::End,
            b'P' => KeyCode::F(1),
            b'Q' => KeyCode::F(2),
            b'R' => KeyCode::F(3),
            b'S' => KeyCode::F(4),
            0x1B => {
                self.reject(DecodeError::Interrupted);
                self.state = State::Escape;
                return;
            }
            _ => {
                self.reject(DecodeError::Unsupported);
                return;
            }
        };
        out.push(key(code, Modifiers::empty()));
    }

    fn push_param(&mut self, b: u8) {
        if self.params.len() >= MAX_SEQUENCE {
            self.reject(DecodeError::Overflow);
            self.state = State::Ignore;
            return;
        }
        self.params.push(b);
    }

    fn dispatch_csi(&mut self, final_byte: u8, out: &mut Vec<Event>) {
        // Private markers (`?`, `>`, `=`) and intermediates belong to
        // replies and protocols we never enable.
        if self
            .params
            .iter()
            .any(|&b| matches!(b, b'<'..=b'?' | 0x20..=0x2F))
        {
            self.reject(DecodeError::Unsupported);
            return;
        }
        let params = match parse_params(&self.params) {
            Ok(p) => p,
            Err(e) => {
                self.reject(e);
                return;
            }
        };
        let first = params.first().copied().unwrap_or(0);
        let mods = params.get(1).copied().map_or(Modifiers::empty(), decode_modifiers);

        let code = match final_byte {
            b'~' => match first {
                200 => {
                    self.paste.clear();
                    self.paste_match = 0;
                    self.paste_chunked = false;
                    self.state = State::BracketedPaste;
                    return;
                }
                201 => {
                    log::debug!("input: paste end without paste start");
                    return;
                }
                _ => match tilde_key(first) {
                    Some(code) => code,
                    None => {
                        self.reject(DecodeError::Unsupported);
                        return;
                    }
                },
            },
            b'I' if params.is_empty() => {
                out.push(Event::FocusGained);
                return;
            }
            b'O' if params.is_empty() => {
                out.push(Event::FocusLost);
                return;
            }
            b'Z' => {
                out.push(key(KeyCode::Tab, Modifiers::SHIFT | mods));
                return;
            }
            b'A' => KeyCode::Up,
            b'B' => KeyCode::Down,
            b'C' => KeyCode::Right,
            b'D' => KeyCode::Left,
            b'H' => KeyCode::Home,
            b'F' => KeyCode::End,
            b'P' => KeyCode::F(1),
            b'Q' => KeyCode::F(2),
            b'R' => KeyCode::F(3),
            b'S' => KeyCode::F(4),
            _ => {
                self.reject(DecodeError::Unsupported);
                return;
            }
        };
        out.push(key(code, mods));
    }

    fn paste_byte(&mut self, b: u8, out: &mut Vec<Event>) {
        if b == PASTE_END[self.paste_match] {
            self.paste_match += 1;
            if self.paste_match == PASTE_END.len() {
                self.finish_paste(out);
            }
            return;
        }

        // Partial delimiter turned out to be content.
        self.paste.extend_from_slice(&PASTE_END[..self.paste_match]);
        if b == PASTE_END[0] {
            self.paste_match = 1;
        } else {
            self.paste_match = 0;
            self.paste.push(b);
        }
        if self.paste.len() >= MAX_PASTE {
            self.paste_chunk(out);
        }
    }

    /// Deliver the rest of the paste and return to Ground. An empty tail
    /// of a chunked paste is not worth an event.
    fn finish_paste(&mut self, out: &mut Vec<Event>) {
        let text = normalize_paste(&self.paste, self.tab_width, true);
        if !(text.is_empty() && self.paste_chunked) {
            out.push(Event::Paste(text));
        }
        self.paste.clear();
        self.paste_match = 0;
        self.paste_chunked = false;
        self.state = State::Ground;
    }

    /// Hand out a full paste buffer as one chunk. A trailing CR or a
    /// partial UTF-8 character stays behind for the next chunk.
    fn paste_chunk(&mut self, out: &mut Vec<Event>) {
        let mut cut = self.paste.len();
        let tail = cut.saturating_sub(3);
        if let Some(lead) = (tail..cut).rev().find(|&i| self.paste[i] & 0xC0 != 0x80) {
            if utf8_len(self.paste[lead]).is_some_and(|need| lead + usize::from(need) > cut) {
                cut = lead;
            }
        }
        if cut > 0 && self.paste[cut - 1] == b'\r' {
            cut -= 1;
        }
        let rest = self.paste.split_off(cut);
        let chunk = std::mem::replace(&mut self.paste, rest);
        log::debug!("input: paste chunk of {} bytes", chunk.len());
        out.push(Event::Paste(normalize_paste(&chunk, self.tab_width, false)));
        self.paste_chunked = true;
    }

    fn reject(&mut self, err: DecodeError) {
        log::debug!("input: dropped sequence: {err}");
        self.dropped += 1;
        self.last_error = Some(err);
        self.params.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

const fn key(code: KeyCode, modifiers: Modifiers) -> Event {
    Event::Key(KeyEvent { code, modifiers })
}

/// Key for a byte that is complete on its own, or `None` for bytes that
/// only appear inside UTF-8 sequences.
const fn single_byte_key(b: u8) -> Option<KeyEvent> {
    let (code, modifiers) = match b {
        0x00 => (KeyCode::Char(' '), Modifiers::CTRL),
        0x09 => (KeyCode::Tab, Modifiers::empty()),
        0x0A | 0x0D => (KeyCode::Enter, Modifiers::empty()),
        0x08 | 0x7F => (KeyCode::Backspace, Modifiers::empty()),
        0x01..=0x1A => (KeyCode::Char((b - 1 + b'a') as char), Modifiers::CTRL),
        0x1C..=0x1F => (KeyCode::Char((b + 0x40) as char), Modifiers::CTRL),
        0x20..=0x7E => (KeyCode::Char(b as char), Modifiers::empty()),
        _ => return None,
    };
    Some(KeyEvent { code, modifiers })
}

/// Total length of a UTF-8 sequence from its lead byte, for multi-byte
/// leads only.
const fn utf8_len(b: u8) -> Option<u8> {
    match b {
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

/// Editing and function keys of the form `CSI n ~`.
const fn tilde_key(n: u16) -> Option<KeyCode> {
    Some(match n {
        1 | 7 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 | 8 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        11..=15 => KeyCode::F((n - 10) as u8),
        17..=21 => KeyCode::F((n - 11) as u8),
        23..=26 => KeyCode::F((n - 12) as u8),
        28 | 29 => KeyCode::F((n - 13) as u8),
        31..=34 => KeyCode::F((n - 14) as u8),
        _ => return None,
    })
}

/// xterm modifier parameter (`1 + bitmask`) to flags.
fn decode_modifiers(param: u16) -> Modifiers {
    u8::try_from(param.saturating_sub(1)).map_or(Modifiers::empty(), Modifiers::from_bits_truncate)
}

/// Split `;`-separated decimal parameters. Colon sub-parameters are
/// ignored; an empty parameter counts as 0.
fn parse_params(raw: &[u8]) -> Result<Vec<u16>, DecodeError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(|&b| b == b';')
        .map(|field| {
            let main = field.split(|&b| b == b':').next().unwrap_or_default();
            main.iter().try_fold(0u16, |acc, &d| {
                if !d.is_ascii_digit() {
                    return Err(DecodeError::Unsupported);
                }
                acc.checked_mul(10)
                    .and_then(|v| v.checked_add(u16::from(d - b'0')))
                    .ok_or(DecodeError::Overflow)
            })
        })
        .collect()
}

/// Decode `Cb ; Cx ; Cy` from an SGR mouse report.
///
/// Button byte layout: bits 0–1 button, bit 2 shift, bit 3 alt, bit 4 ctrl,
/// bit 5 motion, bit 6 wheel. Coordinates are 1-based on the wire.
fn decode_sgr_mouse(raw: &[u8], release: bool) -> Result<MouseEvent, DecodeError> {
    let params = parse_params(raw).map_err(|_| DecodeError::MalformedMouse)?;
    let [cb, cx, cy] = params[..] else {
        return Err(DecodeError::MalformedMouse);
    };
    if cb & 128 != 0 {
        // Buttons 8–11: not something a cell UI can act on.
        return Err(DecodeError::Unsupported);
    }

    let mut modifiers = Modifiers::empty();
    if cb & 4 != 0 {
        modifiers |= Modifiers::SHIFT;
    }
    if cb & 8 != 0 {
        modifiers |= Modifiers::ALT;
    }
    if cb & 16 != 0 {
        modifiers |= Modifiers::CTRL;
    }

    let base = cb & 3;
    let (button, action) = if cb & 64 != 0 {
        let wheel = match base {
            0 => MouseButton::WheelUp,
            1 => MouseButton::WheelDown,
            2 => MouseButton::WheelLeft,
            _ => MouseButton::WheelRight,
        };
        (wheel, MouseAction::Press)
    } else {
        let button = match base {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::None,
        };
        let action = if cb & 32 != 0 {
            MouseAction::Motion
        } else if release {
            MouseAction::Release
        } else {
            MouseAction::Press
        };
        (button, action)
    };

    Ok(MouseEvent {
        x: cx.saturating_sub(1),
        y: cy.saturating_sub(1),
        button,
        action,
        modifiers,
    })
}

/// Paste bytes to text: invalid UTF-8 is replaced, CR and CRLF become LF,
/// and tabs expand to the next multiple of `tab_width` (0 keeps them). On
/// the `last` chunk one trailing line break is dropped, so a pasted line is
/// not also a submit.
fn normalize_paste(raw: &[u8], tab_width: u8, last: bool) -> String {
    let text = String::from_utf8_lossy(raw);
    let tab = usize::from(tab_width);
    let mut out = String::with_capacity(text.len());
    let mut col = 0usize;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
                col = 0;
            }
            '\n' => {
                out.push('\n');
                col = 0;
            }
            '\t' if tab > 0 => {
                let n = tab - col % tab;
                out.extend(std::iter::repeat_n(' ', n));
                col += n;
            }
            _ => {
                out.push(ch);
                col += char_width(ch);
            }
        }
    }
    if last && out.ends_with('\n') {
        out.pop();
    }
    out
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(bytes: &[u8]) -> Vec<Event> {
        Decoder::new().advance(bytes)
    }

    fn parse_one(bytes: &[u8]) -> Event {
        let events = parse(bytes);
        assert_eq!(events.len(), 1, "expected one event from {bytes:?}, got {events:?}");
        events.into_iter().next().unwrap()
    }

    fn press(code: KeyCode) -> Event {
        key(code, Modifiers::empty())
    }

    fn mouse(x: u16, y: u16, button: MouseButton, action: MouseAction) -> Event {
        Event::Mouse(MouseEvent {
            x,
            y,
            button,
            action,
            modifiers: Modifiers::empty(),
        })
    }

    // ── Ground ──────────────────────────────────────────────────────────

    #[test]
    fn printable_ascii() {
        assert_eq!(
            parse(b"aZ~"),
            [
                press(KeyCode::Char('a')),
                press(KeyCode::Char('Z')),
                press(KeyCode::Char('~')),
            ]
        );
    }

    #[test]
    fn named_control_bytes() {
        assert_eq!(parse_one(b"\r"), press(KeyCode::Enter));
        assert_eq!(parse_one(b"\n"), press(KeyCode::Enter));
        assert_eq!(parse_one(b"\t"), press(KeyCode::Tab));
        assert_eq!(parse_one(b"\x7f"), press(KeyCode::Backspace));
        assert_eq!(parse_one(b"\x08"), press(KeyCode::Backspace));
    }

    #[test]
    fn ctrl_letters() {
        let e = parse_one(b"\x03");
        assert_eq!(e, key(KeyCode::Char('c'), Modifiers::CTRL));
        let Event::Key(k) = e else { unreachable!() };
        assert!(k.is_ctrl_c());
        assert_eq!(parse_one(b"\x01"), key(KeyCode::Char('a'), Modifiers::CTRL));
        assert_eq!(parse_one(b"\x1a"), key(KeyCode::Char('z'), Modifiers::CTRL));
        assert_eq!(parse_one(b"\x00"), key(KeyCode::Char(' '), Modifiers::CTRL));
        assert_eq!(parse_one(b"\x1c"), key(KeyCode::Char('\\'), Modifiers::CTRL));
    }

    #[test]
    fn utf8_multibyte() {
        assert_eq!(parse_one("é".as_bytes()), press(KeyCode::Char('é')));
        assert_eq!(parse_one("中".as_bytes()), press(KeyCode::Char('中')));
        assert_eq!(parse_one("🦀".as_bytes()), press(KeyCode::Char('🦀')));
    }

    #[test]
    fn utf8_split_across_reads() {
        let bytes = "🦀".as_bytes();
        let mut d = Decoder::new();
        for &b in &bytes[..3] {
            assert!(d.advance(&[b]).is_empty());
            assert!(d.has_pending());
        }
        assert_eq!(d.advance(&bytes[3..]), [press(KeyCode::Char('🦀'))]);
        assert!(!d.has_pending());
    }

    #[test]
    fn invalid_utf8_is_dropped_and_decoding_continues() {
        let mut d = Decoder::new();
        assert_eq!(d.advance(b"\x80a"), [press(KeyCode::Char('a'))]);
        assert_eq!(d.dropped_sequences(), 1);
        assert_eq!(d.last_error(), Some(DecodeError::InvalidUtf8));

        // Truncated sequence: the interrupting byte still counts.
        assert_eq!(d.advance(b"\xe4\xb8b"), [press(KeyCode::Char('b'))]);
        assert_eq!(d.dropped_sequences(), 2);
    }

    // ── Escape ──────────────────────────────────────────────────────────

    #[test]
    fn lone_escape_waits_for_flush() {
        let mut d = Decoder::new();
        assert!(d.advance(b"\x1b").is_empty());
        assert!(d.has_pending());
        assert_eq!(d.flush(), [press(KeyCode::Escape)]);
        assert!(!d.has_pending());
        assert!(d.flush().is_empty());
    }

    #[test]
    fn alt_keys() {
        assert_eq!(parse_one(b"\x1bx"), key(KeyCode::Char('x'), Modifiers::ALT));
        assert_eq!(
            parse_one("\x1bé".as_bytes()),
            key(KeyCode::Char('é'), Modifiers::ALT)
        );
        assert_eq!(
            parse_one(b"\x1b\x01"),
            key(KeyCode::Char('a'), Modifiers::ALT | Modifiers::CTRL)
        );
        assert_eq!(parse_one(b"\x1b\r"), key(KeyCode::Enter, Modifiers::ALT));
    }

    #[test]
    fn double_escape_is_two_escape_keys() {
        let mut d = Decoder::new();
        assert_eq!(d.advance(b"\x1b\x1b"), [press(KeyCode::Escape)]);
        assert!(d.has_pending());
        assert_eq!(d.flush(), [press(KeyCode::Escape)]);
    }

    #[test]
    fn escape_then_arrow_key() {
        assert_eq!(
            parse(b"\x1b\x1b[A"),
            [press(KeyCode::Escape), press(KeyCode::Up)]
        );
    }

    #[test]
    fn escape_then_non_key_byte() {
        let mut d = Decoder::new();
        assert_eq!(d.advance(b"\x1b\x80"), [press(KeyCode::Escape)]);
        assert_eq!(d.dropped_sequences(), 1);
    }

    #[test]
    fn flush_partial_introducers() {
        let mut d = Decoder::new();
        d.advance(b"\x1b[");
        assert_eq!(d.flush(), [key(KeyCode::Char('['), Modifiers::ALT)]);
        d.advance(b"\x1bO");
        assert_eq!(d.flush(), [key(KeyCode::Char('O'), Modifiers::ALT)]);
        d.advance(b"\x1b[1;");
        assert!(d.flush().is_empty());
        assert_eq!(d.last_error(), Some(DecodeError::Interrupted));
    }

    // ── CSI ─────────────────────────────────────────────────────────────

    #[test]
    fn arrows_and_navigation() {
        assert_eq!(parse_one(b"\x1b[A"), press(KeyCode::Up));
        assert_eq!(parse_one(b"\x1b[B"), press(KeyCode::Down));
        assert_eq!(parse_one(b"\x1b[C"), press(KeyCode::Right));
        assert_eq!(parse_one(b"\x1b[D"), press(KeyCode::Left));
        assert_eq!(parse_one(b"\x1b[H"), press(KeyCode::Home));
        assert_eq!(parse_one(b"\x1b[F"), press(KeyCode::End));
    }

    #[test]
    fn tilde_keys() {
        assert_eq!(parse_one(b"\x1b[1~"), press(KeyCode::Home));
        assert_eq!(parse_one(b"\x1b[2~"), press(KeyCode::Insert));
        assert_eq!(parse_one(b"\x1b[3~"), press(KeyCode::Delete));
        assert_eq!(parse_one(b"\x1b[4~"), press(KeyCode::End));
        assert_eq!(parse_one(b"\x1b[5~"), press(KeyCode::PageUp));
        assert_eq!(parse_one(b"\x1b[6~"), press(KeyCode::PageDown));
    }

    #[test]
    fn function_keys() {
        assert_eq!(parse_one(b"\x1bOP"), press(KeyCode::F(1)));
        assert_eq!(parse_one(b"\x1bOS"), press(KeyCode::F(4)));
        assert_eq!(parse_one(b"\x1b[11~"), press(KeyCode::F(1)));
        assert_eq!(parse_one(b"\x1b[15~"), press(KeyCode::F(5)));
        assert_eq!(parse_one(b"\x1b[17~"), press(KeyCode::F(6)));
        assert_eq!(parse_one(b"\x1b[21~"), press(KeyCode::F(10)));
        assert_eq!(parse_one(b"\x1b[23~"), press(KeyCode::F(11)));
        assert_eq!(parse_one(b"\x1b[24~"), press(KeyCode::F(12)));
        assert_eq!(parse_one(b"\x1b[29~"), press(KeyCode::F(16)));
        assert_eq!(parse_one(b"\x1b[34~"), press(KeyCode::F(20)));
    }

    #[test]
    fn modifier_parameters() {
        assert_eq!(parse_one(b"\x1b[1;5A"), key(KeyCode::Up, Modifiers::CTRL));
        assert_eq!(parse_one(b"\x1b[1;2D"), key(KeyCode::Left, Modifiers::SHIFT));
        assert_eq!(
            parse_one(b"\x1b[3;7~"),
            key(KeyCode::Delete, Modifiers::ALT | Modifiers::CTRL)
        );
        assert_eq!(parse_one(b"\x1b[1;3P"), key(KeyCode::F(1), Modifiers::ALT));
    }

    #[test]
    fn shift_tab() {
        assert_eq!(parse_one(b"\x1b[Z"), key(KeyCode::Tab, Modifiers::SHIFT));
    }

    #[test]
    fn focus_events() {
        assert_eq!(parse_one(b"\x1b[I"), Event::FocusGained);
        assert_eq!(parse_one(b"\x1b[O"), Event::FocusLost);
    }

    #[test]
    fn unsupported_csi_is_dropped_then_resyncs() {
        let mut d = Decoder::new();
        // Device attributes reply, unknown tilde code, unknown final byte.
        let events = d.advance(b"\x1b[?1;2cx\x1b[99~y\x1b[5zz");
        assert_eq!(
            events,
            [
                press(KeyCode::Char('x')),
                press(KeyCode::Char('y')),
                press(KeyCode::Char('z')),
            ]
        );
        assert_eq!(d.dropped_sequences(), 3);
        assert_eq!(d.last_error(), Some(DecodeError::Unsupported));
    }

    #[test]
    fn esc_inside_csi_restarts_sequence() {
        let mut d = Decoder::new();
        assert_eq!(d.advance(b"\x1b[1\x1b[A"), [press(KeyCode::Up)]);
        assert_eq!(d.last_error(), Some(DecodeError::Interrupted));
    }

    #[test]
    fn overlong_sequence_is_skipped_to_final_byte() {
        let mut d = Decoder::new();
        let mut bytes = b"\x1b[".to_vec();
        bytes.extend(std::iter::repeat_n(b'1', MAX_SEQUENCE + 10));
        bytes.extend_from_slice(b"Aq");
        assert_eq!(d.advance(&bytes), [press(KeyCode::Char('q'))]);
        assert_eq!(d.last_error(), Some(DecodeError::Overflow));
    }

    #[test]
    fn numeric_overflow_in_params() {
        let mut d = Decoder::new();
        assert!(d.advance(b"\x1b[99999999A").is_empty());
        assert_eq!(d.last_error(), Some(DecodeError::Overflow));
    }

    // ── Mouse ───────────────────────────────────────────────────────────

    #[test]
    fn sgr_left_press_is_zero_based() {
        assert_eq!(
            parse_one(b"\x1b[<0;11;6M"),
            mouse(10, 5, MouseButton::Left, MouseAction::Press)
        );
    }

    #[test]
    fn sgr_release_and_buttons() {
        assert_eq!(
            parse_one(b"\x1b[<0;1;1m"),
            mouse(0, 0, MouseButton::Left, MouseAction::Release)
        );
        assert_eq!(
            parse_one(b"\x1b[<1;2;2M"),
            mouse(1, 1, MouseButton::Middle, MouseAction::Press)
        );
        assert_eq!(
            parse_one(b"\x1b[<2;3;3M"),
            mouse(2, 2, MouseButton::Right, MouseAction::Press)
        );
    }

    #[test]
    fn sgr_drag_and_move() {
        assert_eq!(
            parse_one(b"\x1b[<32;5;5M"),
            mouse(4, 4, MouseButton::Left, MouseAction::Motion)
        );
        assert_eq!(
            parse_one(b"\x1b[<35;5;5M"),
            mouse(4, 4, MouseButton::None, MouseAction::Motion)
        );
    }

    #[test]
    fn sgr_wheel() {
        assert_eq!(
            parse_one(b"\x1b[<64;1;1M"),
            mouse(0, 0, MouseButton::WheelUp, MouseAction::Press)
        );
        assert_eq!(
            parse_one(b"\x1b[<65;1;1M"),
            mouse(0, 0, MouseButton::WheelDown, MouseAction::Press)
        );
        assert!(MouseButton::WheelDown.is_wheel());
        assert!(!MouseButton::Left.is_wheel());
    }

    #[test]
    fn sgr_modifiers() {
        let Event::Mouse(m) = parse_one(b"\x1b[<28;1;1M") else {
            panic!("expected mouse event");
        };
        assert_eq!(m.modifiers, Modifiers::SHIFT | Modifiers::ALT | Modifiers::CTRL);
        assert_eq!(m.button, MouseButton::Left);
    }

    #[test]
    fn sgr_large_coordinates() {
        assert_eq!(
            parse_one(b"\x1b[<0;300;200M"),
            mouse(299, 199, MouseButton::Left, MouseAction::Press)
        );
    }

    #[test]
    fn mouse_split_at_every_offset_matches_whole() {
        let bytes = b"\x1b[<0;11;6M";
        let whole = parse_one(bytes);
        for split in 1..bytes.len() {
            let mut d = Decoder::new();
            let mut events = d.advance(&bytes[..split]);
            assert!(events.is_empty(), "split {split} emitted early");
            events.extend(d.advance(&bytes[split..]));
            assert_eq!(events, [whole.clone()], "split {split}");
        }
    }

    #[test]
    fn malformed_mouse_resyncs() {
        let mut d = Decoder::new();
        assert_eq!(d.advance(b"\x1b[<0;5Ma"), [press(KeyCode::Char('a'))]);
        assert_eq!(d.last_error(), Some(DecodeError::MalformedMouse));
        // A stray parameter byte skips everything up to the final byte.
        assert!(d.advance(b"\x1b[<0;5:").is_empty());
        assert_eq!(d.advance(b"1;1Mb"), [press(KeyCode::Char('b'))]);
    }

    // ── Bracketed paste ─────────────────────────────────────────────────

    #[test]
    fn paste_is_one_event_with_no_keys() {
        assert_eq!(
            parse(b"\x1b[200~hello\nworld\x1b[201~"),
            [Event::Paste("hello\nworld".into())]
        );
    }

    #[test]
    fn paste_drops_one_trailing_newline() {
        assert_eq!(
            parse(b"\x1b[200~hello\nworld\n\x1b[201~"),
            [Event::Paste("hello\nworld".into())]
        );
        assert_eq!(
            parse(b"\x1b[200~a\r\n\r\n\x1b[201~"),
            [Event::Paste("a\n".into())]
        );
        assert_eq!(parse(b"\x1b[200~\x1b[201~"), [Event::Paste(String::new())]);
    }

    #[test]
    fn paste_surrounded_by_keys() {
        assert_eq!(
            parse(b"a\x1b[200~b\x1b[201~c"),
            [
                press(KeyCode::Char('a')),
                Event::Paste("b".into()),
                press(KeyCode::Char('c')),
            ]
        );
    }

    #[test]
    fn paste_content_is_not_interpreted() {
        assert_eq!(
            parse(b"\x1b[200~\x1b[A\x03\x1b[20x\x1b[201~"),
            [Event::Paste("\x1b[A\x03\x1b[20x".into())]
        );
    }

    #[test]
    fn paste_split_inside_end_marker() {
        let mut d = Decoder::new();
        assert!(d.advance(b"\x1b[200~abc\x1b[20").is_empty());
        assert!(d.in_paste());
        assert!(!d.has_pending());
        assert!(d.flush().is_empty());
        assert_eq!(d.advance(b"1~"), [Event::Paste("abc".into())]);
        assert!(!d.in_paste());
    }

    #[test]
    fn paste_split_byte_by_byte() {
        let bytes = "\x1b[200~héllo\r\nwörld\x1b[201~".as_bytes();
        let mut d = Decoder::new();
        let mut events = Vec::new();
        for &b in bytes {
            d.advance_into(&[b], &mut events);
        }
        assert_eq!(events, [Event::Paste("héllo\nwörld".into())]);
    }

    #[test]
    fn paste_escape_followed_by_escape_marker() {
        assert_eq!(
            parse(b"\x1b[200~x\x1b\x1b[201~"),
            [Event::Paste("x\x1b".into())]
        );
    }

    #[test]
    fn paste_normalizes_carriage_returns() {
        assert_eq!(
            parse(b"\x1b[200~a\rb\r\nc\x1b[201~"),
            [Event::Paste("a\nb\nc".into())]
        );
    }

    #[test]
    fn paste_expands_tabs_to_stops() {
        let mut d = Decoder::new().with_tab_width(4);
        assert_eq!(
            d.advance(b"\x1b[200~\tx\nab\tc\x1b[201~"),
            [Event::Paste("    x\nab  c".into())]
        );
        let mut keep = Decoder::new().with_tab_width(0);
        assert_eq!(
            keep.advance(b"\x1b[200~a\tb\x1b[201~"),
            [Event::Paste("a\tb".into())]
        );
    }

    #[test]
    fn unterminated_paste_gives_keys_back() {
        let mut d = Decoder::new();
        assert!(d.advance(b"\x1b[200~abc\x03").is_empty());
        assert!(d.in_paste());
        // A short quiet period leaves the paste alone.
        assert!(d.flush().is_empty());
        assert!(d.in_paste());

        assert_eq!(d.end_paste(), [Event::Paste("abc\x03".into())]);
        assert!(!d.in_paste());
        assert_eq!(d.last_error(), Some(DecodeError::UnterminatedPaste));
        assert_eq!(
            d.advance(b"\x03q"),
            [
                key(KeyCode::Char('c'), Modifiers::CTRL),
                press(KeyCode::Char('q')),
            ]
        );
        assert!(d.end_paste().is_empty());
    }

    #[test]
    fn end_paste_keeps_a_partial_end_marker_as_text() {
        let mut d = Decoder::new();
        assert!(d.advance(b"\x1b[200~ab\x1b[20").is_empty());
        assert_eq!(d.end_paste(), [Event::Paste("ab\x1b[20".into())]);
    }

    #[test]
    fn oversized_paste_arrives_in_bounded_chunks() {
        let mut d = Decoder::new();
        let mut events = d.advance(b"\x1b[200~");
        d.advance_into(&vec![b'x'; MAX_PASTE + 10], &mut events);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Event::Paste(t) if t.len() == MAX_PASTE));
        assert!(d.in_paste());

        assert_eq!(d.advance(b"\x1b[201~"), [Event::Paste("x".repeat(10))]);
        assert!(!d.in_paste());
    }

    #[test]
    fn paste_chunk_never_splits_a_character_or_crlf() {
        let mut d = Decoder::new();
        let mut events = d.advance(b"\x1b[200~");
        d.advance_into(&vec![b'x'; MAX_PASTE - 1], &mut events);
        d.advance_into("é".as_bytes(), &mut events);
        assert_eq!(events, [Event::Paste("x".repeat(MAX_PASTE - 1))]);
        assert_eq!(d.advance(b"\x1b[201~"), [Event::Paste("é".into())]);

        let mut events = d.advance(b"\x1b[200~");
        d.advance_into(&vec![b'y'; MAX_PASTE - 1], &mut events);
        d.advance_into(b"\r\nz\x1b[201~", &mut events);
        assert_eq!(
            events,
            [
                Event::Paste("y".repeat(MAX_PASTE - 1)),
                Event::Paste("\nz".into()),
            ]
        );
    }

    #[test]
    fn chunked_paste_with_empty_tail_sends_no_empty_event() {
        let mut d = Decoder::new();
        let mut events = d.advance(b"\x1b[200~");
        d.advance_into(&vec![b'x'; MAX_PASTE], &mut events);
        d.advance_into(b"\x1b[201~", &mut events);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn stray_paste_end_is_ignored() {
        assert_eq!(parse(b"\x1b[201~a"), [press(KeyCode::Char('a'))]);
    }

    #[test]
    fn key_event_helpers() {
        let k = KeyEvent::plain(KeyCode::Char('q'));
        assert_eq!(k.rune(), Some('q'));
        assert!(!k.is_ctrl_c());
        assert_eq!(KeyEvent::plain(KeyCode::Enter).rune(), None);
    }
}
