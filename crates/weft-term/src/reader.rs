// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Background input reader: raw stdin bytes in, decoded input out.
//
// A dedicated thread owns the `Decoder`. It polls stdin, feeds every chunk
// it reads through the decoder, and hands each completed event to a sink
// callback. The same thread watches the resize flag set by the SIGWINCH
// handler and reports new sizes through the sink too, so the consumer sees
// input and resizes in the order they happened.
//
// Polling uses a short timeout while the decoder holds a partial sequence
// (a lone ESC) and a longer one otherwise. A timeout with something
// pending means the terminal has gone quiet mid-sequence, so the decoder
// is flushed and the lone ESC becomes the Escape key. A paste gets much
// longer: only after `PASTE_TIMEOUT` without a byte is an unfinished paste
// closed, so a lost end marker cannot swallow the keyboard.
//
// Shutdown: the thread checks an `AtomicBool` stop flag between polls, and
// also exits as soon as the sink returns `false` (the consumer is gone).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
#[cfg(unix)]
use std::time::Instant;

use crate::input::{Decoder, Event};
use crate::terminal::{self, Size};

/// Bytes read from stdin per `read()` call.
///
/// A single keypress is 1-6 bytes, a paste can be kilobytes. 4 KB handles
/// both without waste.
const READ_BUF_SIZE: usize = 4096;

/// Poll timeout while idle (milliseconds). Bounds shutdown latency and
/// resize detection latency.
const IDLE_POLL_MS: i32 = 50;

/// How long a partial sequence may wait for its next byte before the
/// decoder is flushed (milliseconds).
pub const ESC_TIMEOUT_MS: i32 = 25;

/// How long a bracketed paste may go without a byte before it is treated
/// as abandoned and closed.
pub const PASTE_TIMEOUT: Duration = Duration::from_millis(500);

/// Something the reader thread observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A decoded input event.
    Event(Event),
    /// The terminal was resized.
    Resize(Size),
    /// stdin reached end of file or failed. Nothing more will arrive.
    Closed,
}

/// Receives input from the reader thread. Return `false` to stop reading.
pub type InputSink = Box<dyn FnMut(Input) -> bool + Send>;

/// Background stdin reader thread.
///
/// Runs until [`stop`](Self::stop) is called, the `InputReader` is
/// dropped, stdin reaches EOF, or the sink returns `false`.
///
/// ```no_run
/// use weft_term::input::Decoder;
/// use weft_term::reader::{Input, InputReader};
///
/// let reader = InputReader::spawn(Decoder::new(), Box::new(|input: Input| {
///     eprintln!("{input:?}");
///     true
/// }))?;
/// // Reader stops when dropped.
/// # drop(reader);
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct InputReader {
    /// The reader thread handle. `None` after `stop()` joins it.
    handle: Option<JoinHandle<()>>,
    /// Shared flag to signal the thread to exit.
    stop: Arc<AtomicBool>,
}

impl InputReader {
    /// Spawn the reader thread.
    ///
    /// Installs the SIGWINCH handler so resizes are reported.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn(decoder: Decoder, sink: InputSink) -> std::io::Result<Self> {
        terminal::install_resize_handler();

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("weft-input".into())
            .spawn(move || reader_loop(decoder, sink, &stop_flag))?;

        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    /// Signal the reader thread to stop and wait for it to exit.
    ///
    /// Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Whether the thread has exited (EOF, sink closed, or stopped).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for InputReader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Hand decoded events to the sink. `false` once the sink hangs up.
fn deliver(events: Vec<Event>, sink: &mut InputSink) -> bool {
    events.into_iter().all(|e| sink(Input::Event(e)))
}

/// Whether a paste has been quiet for long enough to give up on.
#[cfg_attr(not(unix), allow(dead_code))]
fn paste_stalled(decoder: &Decoder, quiet: Duration) -> bool {
    decoder.in_paste() && quiet >= PASTE_TIMEOUT
}

/// Report a pending resize, if any. `false` once the sink hangs up.
fn check_resize(sink: &mut InputSink) -> bool {
    if terminal::take_resize_signal() {
        if let Some(size) = terminal::get_size() {
            log::debug!("input: resize to {}x{}", size.cols, size.rows);
            return sink(Input::Resize(size));
        }
    }
    true
}

/// Poll stdin, decode, deliver. Exits when the stop flag is set, stdin
/// reaches EOF or fails, or the sink hangs up.
#[cfg(unix)]
#[allow(clippy::needless_pass_by_value)] // Owned values moved into thread closure.
fn reader_loop(mut decoder: Decoder, mut sink: InputSink, stop: &AtomicBool) {
    use std::os::unix::io::AsRawFd;

    let stdin_fd = std::io::stdin().as_raw_fd();
    let mut buf = [0u8; READ_BUF_SIZE];
    let mut last_read = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        if !check_resize(&mut sink) {
            break;
        }

        let timeout = if decoder.has_pending() {
            ESC_TIMEOUT_MS
        } else {
            IDLE_POLL_MS
        };

        let ready = unsafe {
            let mut pfd = libc::pollfd {
                fd: stdin_fd,
                events: libc::POLLIN,
                revents: 0,
            };
            libc::poll(&raw mut pfd, 1, timeout)
        };

        if ready < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            log::warn!("input: poll failed: {err}");
            break;
        }

        if ready == 0 {
            if decoder.has_pending() && !deliver(decoder.flush(), &mut sink) {
                break;
            }
            if paste_stalled(&decoder, last_read.elapsed()) {
                log::debug!("input: paste end marker never arrived");
                if !deliver(decoder.end_paste(), &mut sink) {
                    break;
                }
            }
            continue;
        }

        let n = unsafe { libc::read(stdin_fd, buf.as_mut_ptr().cast(), buf.len()) };

        if n < 0 {
            let err = std::io::Error::last_os_error();
            if matches!(
                err.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
            ) {
                thread::sleep(Duration::from_millis(1));
                continue;
            }
            log::warn!("input: read failed: {err}");
            break;
        }
        if n == 0 {
            log::debug!("input: stdin closed");
            break;
        }

        last_read = Instant::now();
        #[allow(clippy::cast_sign_loss)] // n > 0 checked above.
        let chunk = &buf[..n as usize];
        if !deliver(decoder.advance(chunk), &mut sink) {
            break;
        }
    }

    let dropped = decoder.dropped_sequences();
    if dropped > 0 {
        log::debug!("input: {dropped} malformed sequences dropped");
    }
    if !stop.load(Ordering::Relaxed) {
        sink(Input::Closed);
    }
}

/// Non-unix fallback using blocking reads with no poll. The ESC timeout
/// cannot fire here, so a lone ESC resolves with the next keypress.
#[cfg(not(unix))]
#[allow(clippy::needless_pass_by_value)]
fn reader_loop(mut decoder: Decoder, mut sink: InputSink, stop: &AtomicBool) {
    use std::io::Read;

    let stdin = std::io::stdin();
    let mut buf = [0u8; READ_BUF_SIZE];

    while !stop.load(Ordering::Relaxed) {
        match stdin.lock().read(&mut buf) {
            Ok(0) | Err(_) => {
                sink(Input::Closed);
                break;
            }
            Ok(n) => {
                if !deliver(decoder.advance(&buf[..n]), &mut sink) {
                    break;
                }
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
