// SPDX-License-Identifier: MIT
//
// Backend: where frames go and where input comes from.
//
// The loop never touches the terminal directly. It asks a `Backend` to
// switch modes on and off, to write a frame's bytes, and to start feeding
// input into a sink. Two implementations:
//
//   - `TerminalBackend`: the real thing. A `Terminal` plus the background
//     `InputReader`.
//   - `TestBackend`: headless. Records every frame and every mode change,
//     takes scripted input bytes and resizes, and can be told to fail, so
//     the whole loop runs under `cargo test`.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use weft_term::input::Decoder;
use weft_term::reader::{Input, InputReader, InputSink};
use weft_term::terminal::{Mode, Size, StartupError, Terminal};

/// What the runtime needs from a terminal.
pub trait Backend {
    /// Current size in cells.
    fn size(&self) -> Size;

    /// Switch a mode on.
    ///
    /// # Errors
    ///
    /// A [`StartupError`] aborts startup.
    fn enable(&mut self, mode: Mode) -> Result<(), StartupError>;

    /// Switch a mode off.
    ///
    /// # Errors
    ///
    /// Returns the underlying write or termios error.
    fn disable(&mut self, mode: Mode) -> io::Result<()>;

    /// Write and flush one frame.
    ///
    /// # Errors
    ///
    /// A write error aborts the loop.
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Start delivering input through `sink`, decoded by `decoder`.
    ///
    /// # Errors
    ///
    /// A [`StartupError`] aborts startup.
    fn start_input(&mut self, decoder: Decoder, sink: InputSink) -> Result<(), StartupError>;

    /// Stop delivering input. Idempotent.
    fn stop_input(&mut self);
}

// ─── TerminalBackend ────────────────────────────────────────────────────────

/// Backend for the process's controlling terminal.
pub struct TerminalBackend {
    terminal: Terminal,
    reader: Option<InputReader>,
}

impl TerminalBackend {
    /// Open the controlling terminal.
    ///
    /// # Errors
    ///
    /// [`StartupError::NotATty`] when stdin or stdout is not a terminal.
    pub fn open() -> Result<Self, StartupError> {
        Ok(Self {
            terminal: Terminal::open()?,
            reader: None,
        })
    }
}

impl Backend for TerminalBackend {
    fn size(&self) -> Size {
        self.terminal.size()
    }

    fn enable(&mut self, mode: Mode) -> Result<(), StartupError> {
        self.terminal.enable(mode)
    }

    fn disable(&mut self, mode: Mode) -> io::Result<()> {
        self.terminal.disable(mode)
    }

    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.terminal.write_frame(bytes)
    }

    fn start_input(&mut self, decoder: Decoder, sink: InputSink) -> Result<(), StartupError> {
        let reader = InputReader::spawn(decoder, sink).map_err(StartupError::Spawn)?;
        self.reader = Some(reader);
        Ok(())
    }

    fn stop_input(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.stop();
        }
    }
}

impl Drop for TerminalBackend {
    fn drop(&mut self) {
        self.stop_input();
    }
}

// ─── TestBackend ────────────────────────────────────────────────────────────

/// A mode switched on or off, as recorded by [`TestBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Enabled(Mode),
    Disabled(Mode),
}

/// Scripted input waiting for the loop to start reading.
enum Script {
    Bytes(Vec<u8>),
    Flush,
    Resize(Size),
}

struct TestState {
    size: Size,
    frames: Vec<Vec<u8>>,
    mode_log: Vec<ModeChange>,
    enabled: Vec<Mode>,
    fail_writes: bool,
    fail_enable: Option<Mode>,
}

/// The input side. Locked for the whole of a delivery, so deliveries never
/// interleave and `stop_input` waits for the one in flight.
struct InputSlot {
    decoder: Option<Decoder>,
    sink: Option<InputSink>,
    script: VecDeque<Script>,
}

/// Headless backend for tests.
///
/// Clones share state: hand one clone to the runtime and keep another to
/// script input and inspect output.
///
/// Input scripted before the loop starts is delivered, in order, as soon as
/// the loop starts reading. Input scripted afterwards is delivered
/// immediately on the calling thread.
///
/// ```
/// use weft_runtime::backend::TestBackend;
///
/// let backend = TestBackend::new(20, 4);
/// backend.feed(b"q");
/// assert!(backend.frames().is_empty());
/// ```
#[derive(Clone)]
pub struct TestBackend {
    state: Arc<Mutex<TestState>>,
    input: Arc<Mutex<InputSlot>>,
}

impl TestBackend {
    /// A `cols` × `rows` screen.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            state: Arc::new(Mutex::new(TestState {
                size: Size::new(cols, rows),
                frames: Vec::new(),
                mode_log: Vec::new(),
                enabled: Vec::new(),
                fail_writes: false,
                fail_enable: None,
            })),
            input: Arc::new(Mutex::new(InputSlot {
                decoder: None,
                sink: None,
                script: VecDeque::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TestState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_input(&self) -> MutexGuard<'_, InputSlot> {
        self.input.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Scripting ─────────────────────────────────────────────────────

    /// Bytes arriving from the terminal, as one read.
    pub fn feed(&self, bytes: &[u8]) {
        self.push(Script::Bytes(bytes.to_vec()));
    }

    /// A quiet period after the last read: resolves a pending lone ESC.
    pub fn idle(&self) {
        self.push(Script::Flush);
    }

    /// The terminal window changes size.
    pub fn resize(&self, cols: u16, rows: u16) {
        self.push(Script::Resize(Size::new(cols, rows)));
    }

    /// Make every subsequent frame write fail with a broken pipe.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make switching `mode` on fail.
    pub fn fail_enable(&self, mode: Mode) {
        self.lock().fail_enable = Some(mode);
    }

    // ── Inspection ────────────────────────────────────────────────────

    /// Every frame written, oldest first.
    #[must_use]
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().frames.clone()
    }

    /// Every frame written, lossily decoded as text.
    #[must_use]
    pub fn frame_strings(&self) -> Vec<String> {
        self.lock()
            .frames
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect()
    }

    /// Every mode change, in order.
    #[must_use]
    pub fn mode_log(&self) -> Vec<ModeChange> {
        self.lock().mode_log.clone()
    }

    /// Modes currently switched on, oldest first.
    #[must_use]
    pub fn enabled_modes(&self) -> Vec<Mode> {
        self.lock().enabled.clone()
    }

    /// Whether the loop is currently reading input.
    #[must_use]
    pub fn is_reading(&self) -> bool {
        self.lock_input().sink.is_some()
    }

    // ── Delivery ──────────────────────────────────────────────────────

    fn push(&self, script: Script) {
        // Only the input lock is held while delivering: the sink may block
        // on a full queue while the loop needs the state lock for a frame.
        let mut input = self.lock_input();
        let slot = &mut *input;
        match (slot.decoder.as_mut(), slot.sink.as_mut()) {
            (Some(decoder), Some(sink)) => {
                if !deliver(&script, decoder, sink, &self.state) {
                    slot.sink = None;
                }
            }
            _ => slot.script.push_back(script),
        }
    }
}

/// Run one script step through the decoder into the sink. `false` once the
/// sink hangs up.
fn deliver(
    script: &Script,
    decoder: &mut Decoder,
    sink: &mut InputSink,
    state: &Mutex<TestState>,
) -> bool {
    let events = match script {
        Script::Bytes(bytes) => decoder.advance(bytes),
        Script::Flush => decoder.flush(),
        Script::Resize(size) => {
            state.lock().unwrap_or_else(PoisonError::into_inner).size = *size;
            return sink(Input::Resize(*size));
        }
    };
    events.into_iter().all(|e| sink(Input::Event(e)))
}

impl Backend for TestBackend {
    fn size(&self) -> Size {
        self.lock().size
    }

    fn enable(&mut self, mode: Mode) -> Result<(), StartupError> {
        let mut state = self.lock();
        if state.fail_enable == Some(mode) {
            return Err(match mode {
                Mode::Raw => StartupError::RawMode(io::Error::other("raw mode refused")),
                _ => StartupError::Io(io::Error::other("mode refused")),
            });
        }
        state.enabled.push(mode);
        state.mode_log.push(ModeChange::Enabled(mode));
        Ok(())
    }

    fn disable(&mut self, mode: Mode) -> io::Result<()> {
        let mut state = self.lock();
        if let Some(pos) = state.enabled.iter().rposition(|&m| m == mode) {
            state.enabled.remove(pos);
            state.mode_log.push(ModeChange::Disabled(mode));
        }
        Ok(())
    }

    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        state.frames.push(bytes.to_vec());
        Ok(())
    }

    fn start_input(&mut self, mut decoder: Decoder, mut sink: InputSink) -> Result<(), StartupError> {
        let mut input = self.lock_input();
        let script: Vec<Script> = input.script.drain(..).collect();
        let mut open = true;
        for step in &script {
            if !deliver(step, &mut decoder, &mut sink, &self.state) {
                open = false;
                break;
            }
        }
        input.decoder = Some(decoder);
        if open {
            input.sink = Some(sink);
        }
        Ok(())
    }

    fn stop_input(&mut self) {
        let mut input = self.lock_input();
        input.sink = None;
        input.decoder = None;
    }
}
