// SPDX-License-Identifier: MIT
//
// Terminal control: raw mode, mode stack, size queries, resize signal,
// and RAII cleanup.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ), isatty, sigaction, and raw fd writes.
// These are the standard POSIX interfaces for terminal control and have no
// safe alternative. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// Every mode switched on goes onto a stack. `restore()` pops the stack and
// switches modes off in strict reverse order, so raw mode (always pushed
// first) is the last thing undone. Dropping a `Terminal` restores it too,
// which is what makes cleanup scoped: an early return, an error, or an
// unwinding panic all pass through `Drop`.
//
// The panic hook is the backstop for panics on other threads or with
// `panic = "abort"`: it bypasses Rust's stdout lock entirely and writes a
// pre-built restore sequence straight to fd 1, so a panic raised while the
// lock was held (mid-frame) cannot deadlock.

use std::cell::Cell;
use std::io::{self, Write};
use std::sync::Mutex;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::ansi;
pub use crate::ansi::MouseMode;

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

impl Size {
    #[inline]
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Total number of cells (`cols × rows`).
    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.cols as u32 * self.rows as u32
    }
}

// ─── StartupError ───────────────────────────────────────────────────────────

/// Failure to bring the terminal into TUI mode.
///
/// Fatal, and always reported before the event loop starts. Whatever modes
/// were already switched on are switched back off by the time the caller
/// sees this.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("standard input and output must be an interactive terminal")]
    NotATty,
    #[error("cannot enter raw mode: {0}")]
    RawMode(#[source] io::Error),
    #[error("cannot query terminal size: {0}")]
    Size(#[source] io::Error),
    #[error("terminal setup failed: {0}")]
    Io(#[from] io::Error),
    #[error("cannot spawn background thread: {0}")]
    Spawn(#[source] io::Error),
}

// ─── Modes ──────────────────────────────────────────────────────────────────

/// A terminal mode the runtime switches on at startup and off at exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// termios raw mode: no echo, no line buffering, no signal keys.
    Raw,
    /// Alternate screen buffer (DEC 1049).
    AltScreen,
    /// Hidden hardware cursor (DEC 25).
    HideCursor,
    /// SGR mouse reporting (DEC 1006 + 1000, optionally 1002).
    Mouse(MouseMode),
    /// Bracketed paste (DEC 2004).
    BracketedPaste,
    /// Focus in/out reports (DEC 1004).
    FocusReporting,
}

impl Mode {
    /// Escape sequence that switches this mode on. Empty for [`Mode::Raw`],
    /// which is a termios setting rather than an output sequence.
    pub fn write_enable(self, w: &mut impl Write) -> io::Result<()> {
        match self {
            Self::Raw => Ok(()),
            Self::AltScreen => {
                ansi::enter_alt_screen(w)?;
                ansi::clear_screen(w)
            }
            Self::HideCursor => ansi::cursor_hide(w),
            Self::Mouse(mode) => ansi::enable_mouse(w, mode),
            Self::BracketedPaste => ansi::enable_bracketed_paste(w),
            Self::FocusReporting => ansi::enable_focus_reporting(w),
        }
    }

    /// Escape sequence that switches this mode off.
    pub fn write_disable(self, w: &mut impl Write) -> io::Result<()> {
        match self {
            Self::Raw => Ok(()),
            Self::AltScreen => {
                ansi::reset(w)?;
                ansi::exit_alt_screen(w)
            }
            Self::HideCursor => ansi::cursor_show(w),
            Self::Mouse(_) => ansi::disable_mouse(w),
            Self::BracketedPaste => ansi::disable_bracketed_paste(w),
            Self::FocusReporting => ansi::disable_focus_reporting(w),
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::AltScreen => "alt-screen",
            Self::HideCursor => "hide-cursor",
            Self::Mouse(MouseMode::Click) => "mouse",
            Self::Mouse(MouseMode::Drag) => "mouse-drag",
            Self::BracketedPaste => "bracketed-paste",
            Self::FocusReporting => "focus",
        }
    }
}

// ─── Terminal Queries ───────────────────────────────────────────────────────

/// Query the current terminal size via `ioctl(TIOCGWINSZ)`.
///
/// # Errors
///
/// Returns the OS error if stdout is not a terminal, or `InvalidData` if
/// the terminal reports a zero dimension.
#[cfg(unix)]
pub fn query_size() -> io::Result<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };

    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    if ws.ws_col == 0 || ws.ws_row == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "terminal reported a zero size",
        ));
    }
    Ok(Size::new(ws.ws_col, ws.ws_row))
}

#[cfg(not(unix))]
pub fn query_size() -> io::Result<Size> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "terminal size query requires a unix host",
    ))
}

/// Current terminal size, or `None` if it cannot be determined.
#[must_use]
pub fn get_size() -> Option<Size> {
    query_size().ok()
}

/// Check whether both stdin and stdout are connected to a terminal.
#[cfg(unix)]
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 && libc::isatty(libc::STDOUT_FILENO) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty() -> bool {
    false
}

// ─── Resize Signal ──────────────────────────────────────────────────────────

/// Set by the SIGWINCH handler, cleared by [`take_resize_signal`].
static RESIZE_PENDING: AtomicBool = AtomicBool::new(false);

static RESIZE_HANDLER_INSTALLED: Once = Once::new();

/// Install a SIGWINCH handler (once per process).
///
/// The handler only stores to an atomic, one of the few things that is
/// async-signal-safe.
pub fn install_resize_handler() {
    RESIZE_HANDLER_INSTALLED.call_once(|| {
        #[cfg(unix)]
        unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = sigwinch_handler as *const () as usize;
            sa.sa_flags = libc::SA_RESTART;
            libc::sigemptyset(&raw mut sa.sa_mask);
            libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut());
        }
    });
}

#[cfg(unix)]
extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    RESIZE_PENDING.store(true, Ordering::Relaxed);
}

/// Whether a resize was signalled since the last call. Clears the flag.
pub fn take_resize_signal() -> bool {
    RESIZE_PENDING.swap(false, Ordering::Relaxed)
}

// ─── Panic-Safe Terminal Restore ────────────────────────────────────────────

/// Global backup of original termios for panic recovery.
///
/// The [`Terminal`] owns its own copy, but the panic hook can't reach it.
/// This backup, behind a [`Mutex`], lets the hook leave raw mode without
/// the struct.
#[cfg(unix)]
static TERMIOS_BACKUP: Mutex<Option<libc::termios>> = Mutex::new(None);

/// Restore termios from the global backup. Best-effort, ignores errors.
#[cfg(unix)]
fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some(ref original) = *guard {
            unsafe {
                let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, original);
            }
        }
    }
}

/// Complete terminal restore sequence for emergency use.
///
/// End synchronized output, disable mouse (drag + click + SGR format),
/// disable bracketed paste and focus reporting, reset SGR attributes, show
/// cursor, exit alternate screen. The alternate screen exit comes last so
/// the restored shell content appears with no TUI artifacts.
#[rustfmt::skip]
const EMERGENCY_RESTORE: &[u8] = b"\
    \x1b[?2026l\
    \x1b[?1002l\x1b[?1000l\x1b[?1006l\
    \x1b[?2004l\
    \x1b[?1004l\
    \x1b[0m\
    \x1b[?25h\
    \x1b[?1049l";

/// Whether a `Terminal` currently holds the screen. The panic hook writes
/// nothing otherwise.
static TUI_ACTIVE: AtomicBool = AtomicBool::new(false);

static PANIC_HOOK_INSTALLED: Once = Once::new();

thread_local! {
    static PANICS_CAUGHT: Cell<bool> = const { Cell::new(false) };
}

/// Declare that panics on the current thread are caught and reported by
/// whoever runs it. The panic hook then leaves the terminal alone and
/// prints nothing over the screen.
pub fn catch_panics_on_this_thread() {
    PANICS_CAUGHT.with(|c| c.set(true));
}

/// Install a panic hook that restores the terminal before printing the error.
///
/// Without this, a panic in raw mode leaves the user's terminal broken: no
/// echo, no line editing, no way to read the error message.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if PANICS_CAUGHT.with(Cell::get) {
                return;
            }
            if TUI_ACTIVE.swap(false, Ordering::SeqCst) {
                emergency_restore();

                #[cfg(unix)]
                restore_termios_from_backup();
            }

            original(info);
        }));
    });
}

/// Write [`EMERGENCY_RESTORE`] directly to stdout's file descriptor,
/// bypassing the `io::stdout()` lock.
fn emergency_restore() {
    #[cfg(unix)]
    unsafe {
        let _ = libc::write(
            libc::STDOUT_FILENO,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }

    #[cfg(not(unix))]
    {
        let _ = io::stdout().write_all(EMERGENCY_RESTORE);
        let _ = io::stdout().flush();
    }
}

// ─── Terminal ───────────────────────────────────────────────────────────────

/// Terminal handle with RAII cleanup.
///
/// [`open`](Self::open) checks for a TTY and reads the size. Modes are
/// then switched on one at a time with [`enable`](Self::enable) and
/// switched off in reverse by [`restore`](Self::restore) or on drop.
///
/// # Example
///
/// ```no_run
/// use weft_term::terminal::{Mode, Terminal};
///
/// let mut term = Terminal::open()?;
/// term.enable(Mode::Raw)?;
/// term.enable(Mode::AltScreen)?;
/// // ... render frames, handle input ...
/// // Modes are switched off in reverse order on drop.
/// # Ok::<(), weft_term::terminal::StartupError>(())
/// ```
pub struct Terminal {
    /// Original termios saved before entering raw mode.
    #[cfg(unix)]
    original_termios: Option<libc::termios>,

    /// Cached size, refreshed by [`refresh_size`](Self::refresh_size).
    size: Size,

    /// Modes switched on, in the order they were switched on.
    enabled: Vec<Mode>,

    out: io::Stdout,
}

impl Terminal {
    /// Take hold of the controlling terminal.
    ///
    /// Does not change any mode yet.
    ///
    /// # Errors
    ///
    /// [`StartupError::NotATty`] when stdin or stdout is redirected, and
    /// [`StartupError::Size`] when the size query fails.
    pub fn open() -> Result<Self, StartupError> {
        if !is_tty() {
            return Err(StartupError::NotATty);
        }
        let size = query_size().map_err(StartupError::Size)?;

        Ok(Self {
            #[cfg(unix)]
            original_termios: None,
            size,
            enabled: Vec::with_capacity(6),
            out: io::stdout(),
        })
    }

    /// Current terminal size (columns, rows).
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Re-query the terminal size from the OS.
    ///
    /// Call this after a resize signal. Keeps the cached size if the
    /// query fails.
    pub fn refresh_size(&mut self) -> Size {
        if let Some(s) = get_size() {
            self.size = s;
        }
        self.size
    }

    /// Modes currently switched on, oldest first.
    #[must_use]
    pub fn enabled(&self) -> &[Mode] {
        &self.enabled
    }

    /// Switch a mode on and push it onto the restore stack.
    ///
    /// Enabling a mode that is already on is a no-op.
    ///
    /// # Errors
    ///
    /// [`StartupError::RawMode`] if termios refuses raw mode, and
    /// [`StartupError::Io`] if the mode sequence cannot be written.
    pub fn enable(&mut self, mode: Mode) -> Result<(), StartupError> {
        if self.enabled.contains(&mode) {
            return Ok(());
        }

        install_panic_hook();

        if mode == Mode::Raw {
            self.enable_raw_mode().map_err(StartupError::RawMode)?;
        } else {
            let mut lock = self.out.lock();
            mode.write_enable(&mut lock)?;
            lock.flush()?;
        }

        log::info!("terminal: enabled {}", mode.name());
        self.enabled.push(mode);
        TUI_ACTIVE.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Switch one mode off and take it off the restore stack.
    ///
    /// Disabling a mode that is not on is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the write or termios error. The mode counts as off either
    /// way.
    pub fn disable(&mut self, mode: Mode) -> io::Result<()> {
        let Some(pos) = self.enabled.iter().rposition(|&m| m == mode) else {
            return Ok(());
        };
        // With modes still on, an inactive flag means the panic hook has
        // already written the restore sequence.
        let hooked = !TUI_ACTIVE.load(Ordering::SeqCst);
        self.enabled.remove(pos);

        let result = if mode == Mode::Raw {
            self.disable_raw_mode()
        } else if hooked {
            Ok(())
        } else {
            let mut lock = self.out.lock();
            mode.write_disable(&mut lock).and_then(|()| lock.flush())
        };
        if self.enabled.is_empty() {
            TUI_ACTIVE.store(false, Ordering::SeqCst);
        }

        match &result {
            Ok(()) => log::info!("terminal: restored {}", mode.name()),
            Err(e) => log::warn!("terminal: failed to restore {}: {e}", mode.name()),
        }
        result
    }

    /// Switch every enabled mode off, newest first.
    ///
    /// Keeps going after a failure so one broken step does not strand the
    /// rest; the first error is returned. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the first write or termios error encountered.
    pub fn restore(&mut self) -> io::Result<()> {
        let mut first_err = None;
        while let Some(&mode) = self.enabled.last() {
            if let Err(e) = self.disable(mode) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Write one frame's bytes and flush them.
    ///
    /// # Errors
    ///
    /// Returns the underlying write error (e.g. a broken pipe).
    pub fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut lock = self.out.lock();
        lock.write_all(bytes)?;
        lock.flush()
    }

    // ── Raw Mode (termios) ──────────────────────────────────────────

    #[cfg(unix)]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        let fd = io::stdin().as_raw_fd();

        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }

            self.original_termios = Some(termios);
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = Some(termios);
            }

            // cfmakeraw equivalent: disable all line processing.
            termios.c_iflag &= !(libc::IGNBRK
                | libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_lflag &=
                !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;

            // VMIN=1, VTIME=0: read() blocks until at least 1 byte available.
            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const termios) != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "raw mode requires a unix host",
        ))
    }

    #[cfg(unix)]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        if let Some(ref original) = self.original_termios {
            use std::os::unix::io::AsRawFd;
            let fd = io::stdin().as_raw_fd();

            unsafe {
                if libc::tcsetattr(fd, libc::TCSAFLUSH, original) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }

            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = None;
            }
            self.original_termios = None;
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if !self.enabled.is_empty() {
            let _ = self.restore();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn enable_str(mode: Mode) -> String {
        let mut buf = Vec::new();
        mode.write_enable(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn disable_str(mode: Mode) -> String {
        let mut buf = Vec::new();
        mode.write_disable(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ── Size ──────────────────────────────────────────────────────────

    #[test]
    fn size_area() {
        assert_eq!(Size::new(80, 24).area(), 1920);
        assert_eq!(Size::new(0, 24).area(), 0);
        assert_eq!(Size::new(500, 200).area(), 100_000);
    }

    // ── Modes ─────────────────────────────────────────────────────────

    #[test]
    fn raw_mode_writes_nothing() {
        assert_eq!(enable_str(Mode::Raw), "");
        assert_eq!(disable_str(Mode::Raw), "");
    }

    #[test]
    fn alt_screen_sequences() {
        assert_eq!(enable_str(Mode::AltScreen), "\x1b[?1049h\x1b[2J");
        assert_eq!(disable_str(Mode::AltScreen), "\x1b[0m\x1b[?1049l");
    }

    #[test]
    fn cursor_sequences() {
        assert_eq!(enable_str(Mode::HideCursor), "\x1b[?25l");
        assert_eq!(disable_str(Mode::HideCursor), "\x1b[?25h");
    }

    #[test]
    fn mouse_sequences() {
        assert_eq!(
            enable_str(Mode::Mouse(MouseMode::Click)),
            "\x1b[?1006h\x1b[?1000h"
        );
        assert_eq!(
            enable_str(Mode::Mouse(MouseMode::Drag)),
            "\x1b[?1006h\x1b[?1000h\x1b[?1002h"
        );
        assert_eq!(
            disable_str(Mode::Mouse(MouseMode::Click)),
            "\x1b[?1002l\x1b[?1000l\x1b[?1006l"
        );
    }

    #[test]
    fn paste_and_focus_sequences() {
        assert_eq!(enable_str(Mode::BracketedPaste), "\x1b[?2004h");
        assert_eq!(disable_str(Mode::BracketedPaste), "\x1b[?2004l");
        assert_eq!(enable_str(Mode::FocusReporting), "\x1b[?1004h");
        assert_eq!(disable_str(Mode::FocusReporting), "\x1b[?1004l");
    }

    #[test]
    fn mode_names_are_distinct() {
        let modes = [
            Mode::Raw,
            Mode::AltScreen,
            Mode::HideCursor,
            Mode::Mouse(MouseMode::Click),
            Mode::Mouse(MouseMode::Drag),
            Mode::BracketedPaste,
            Mode::FocusReporting,
        ];
        let mut names: Vec<_> = modes.iter().map(|m| m.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), modes.len());
    }

    #[test]
    fn modes_hash_by_mouse_granularity() {
        use std::collections::HashSet;

        let set: HashSet<Mode> = [
            Mode::Mouse(MouseMode::Click),
            Mode::Mouse(MouseMode::Drag),
            Mode::Mouse(MouseMode::Click),
            Mode::Raw,
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&Mode::Mouse(MouseMode::Drag)));
    }

    // ── Resize signal ─────────────────────────────────────────────────

    #[test]
    fn resize_signal_is_taken_once() {
        RESIZE_PENDING.store(true, Ordering::Relaxed);
        assert!(take_resize_signal());
        assert!(!take_resize_signal());
    }

    #[test]
    fn install_resize_handler_is_idempotent() {
        install_resize_handler();
        install_resize_handler();
    }

    // ── Emergency restore sequence ──────────────────────────────────

    #[test]
    fn emergency_restore_exits_alt_screen_last() {
        let s = std::str::from_utf8(EMERGENCY_RESTORE).unwrap();
        assert!(s.ends_with("\x1b[?1049l"));
    }

    #[test]
    fn emergency_restore_undoes_every_mode() {
        let s = std::str::from_utf8(EMERGENCY_RESTORE).unwrap();
        for mode in [
            Mode::HideCursor,
            Mode::Mouse(MouseMode::Drag),
            Mode::BracketedPaste,
            Mode::FocusReporting,
        ] {
            let off = disable_str(mode);
            assert!(s.contains(&off), "missing {} restore", mode.name());
        }
        assert!(s.contains("\x1b[?2026l"), "must end sync output");
        assert!(s.contains("\x1b[0m"), "must reset SGR attributes");
    }

    // ── Terminal ──────────────────────────────────────────────────────

    #[test]
    fn open_requires_a_tty() {
        match Terminal::open() {
            Ok(term) => {
                assert!(is_tty());
                assert!(term.enabled().is_empty());
                assert!(term.size().cols > 0);
            }
            Err(StartupError::NotATty) => assert!(!is_tty()),
            Err(e) => panic!("unexpected startup error: {e}"),
        }
    }

    #[test]
    fn startup_error_messages() {
        assert_eq!(
            StartupError::NotATty.to_string(),
            "standard input and output must be an interactive terminal"
        );
        let e = StartupError::RawMode(io::Error::other("denied"));
        assert_eq!(e.to_string(), "cannot enter raw mode: denied");
    }
}
