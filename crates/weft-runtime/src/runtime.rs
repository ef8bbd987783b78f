// SPDX-License-Identifier: MIT
//
// The runtime loop.
//
// Lifecycle:
//
//   Initializing → Running → Draining → Stopped
//
// Initializing switches the terminal modes on (raw first), starts the input
// reader and the ticker, runs `App::init`, and paints the first frame as a
// full redraw. Running takes one message at a time off the queue, turns it
// into an `Event`, hands it to `App::update`, submits the returned command,
// and renders when the update asks for it. A quit (a command, a `Handle`,
// Ctrl-C, or stdin closing) moves to Draining: the ticker stops, queued
// messages and in-flight commands are abandoned, input stops, and the modes
// are undone in reverse order. Then Stopped.
//
// Cleanup is scoped. The modes live in a guard whose Drop undoes them, so
// an error or a panic anywhere in the loop still restores the terminal.
//
// Rendering: `App::render` draws the whole screen into the blank back grid.
// The diff against the front grid becomes escape bytes, written with one
// call. A frame that changes nothing writes nothing. The first frame and
// the frame after a resize are full redraws.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use weft_term::diff::DiffEngine;
use weft_term::encode::Encoder;
use weft_term::grid::DoubleBuffer;
use weft_term::input::{self, Decoder};
use weft_term::reader::{Input, InputSink};
use weft_term::terminal::{Mode, Size};

use crate::backend::{Backend, TerminalBackend};
use crate::command::Command;
use crate::config::RuntimeConfig;
use crate::error::{Error, Result, StartupError};
use crate::event::Event;
use crate::executor::Executor;
use crate::frame::Frame;
use crate::hit::HitMap;
use crate::queue::{self, Closed, Message, QueueReceiver, QueueSender};
use crate::ticker::Ticker;

// ─── App ─────────────────────────────────────────────────────────────────────

/// An application driven by the runtime.
///
/// All three methods run on the loop thread, one at a time. Anything slow
/// belongs in a [`Command`].
pub trait App {
    /// The application's own messages, produced by commands and handles.
    type Message: Send + 'static;

    /// Called once before the first frame.
    fn init(&mut self) -> Command<Self::Message> {
        Command::none()
    }

    /// React to one event.
    fn update(&mut self, event: Event<Self::Message>) -> Update<Self::Message>;

    /// Draw the whole screen. The frame starts blank.
    fn render(&self, frame: &mut Frame<'_>);
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// What `update` wants done next.
#[must_use]
#[derive(Debug)]
pub struct Update<M> {
    /// Render a new frame.
    pub redraw: bool,
    /// Work to start.
    pub command: Command<M>,
}

impl<M> Update<M> {
    /// Nothing changed.
    pub const fn none() -> Self {
        Self {
            redraw: false,
            command: Command::none(),
        }
    }

    /// Visible state changed.
    pub const fn redraw() -> Self {
        Self {
            redraw: true,
            command: Command::none(),
        }
    }

    /// Start `command` without redrawing.
    pub const fn command(command: Command<M>) -> Self {
        Self {
            redraw: false,
            command,
        }
    }

    /// Stop the loop.
    pub const fn quit() -> Self {
        Self::command(Command::quit())
    }

    /// Also start `command`.
    pub fn with_command(self, command: Command<M>) -> Self {
        Self {
            redraw: self.redraw,
            command: Command::batch([self.command, command]),
        }
    }

    /// Also redraw.
    pub const fn and_redraw(mut self) -> Self {
        self.redraw = true;
        self
    }
}

impl<M> Default for Update<M> {
    fn default() -> Self {
        Self::none()
    }
}

// ─── State & stats ───────────────────────────────────────────────────────────

/// Where the loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initializing,
    Running,
    Draining,
    Stopped,
}

impl RunState {
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Initializing,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }

    const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        })
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Events handed to `update`.
    pub events: u64,
    /// Render passes.
    pub renders: u64,
    /// Render passes that wrote bytes.
    pub frames_written: u64,
    pub bytes_written: u64,
    pub ticks_delivered: u64,
    /// Ticks dropped because one was already waiting or the queue was full.
    pub ticks_dropped: u64,
    pub commands_submitted: u64,
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// Talks to a runtime from any thread.
///
/// Sends block while the queue is full, so calling them from `update`
/// itself can deadlock. Return a [`Command`] there instead.
pub struct Handle<M> {
    tx: QueueSender<M>,
    state: Arc<AtomicU8>,
}

impl<M> Clone for Handle<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<M> fmt::Debug for Handle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<M> Handle<M> {
    /// Deliver `message` as [`Event::User`].
    ///
    /// # Errors
    ///
    /// [`Closed`] once the loop has stopped.
    pub fn send(&self, message: M) -> Result<(), Closed> {
        self.tx.send(Message::User(message))
    }

    /// Inject an input event as if the terminal had sent it.
    ///
    /// # Errors
    ///
    /// [`Closed`] once the loop has stopped.
    pub fn send_input(&self, event: input::Event) -> Result<(), Closed> {
        self.tx.send(Message::Input(event))
    }

    /// Ask the loop to stop.
    ///
    /// # Errors
    ///
    /// [`Closed`] once the loop has stopped.
    pub fn quit(&self) -> Result<(), Closed> {
        self.tx.send(Message::Quit)
    }

    /// The loop's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }
}

// ─── Runtime ─────────────────────────────────────────────────────────────────

/// Owns the terminal for one run of an [`App`].
pub struct Runtime<M, B = TerminalBackend> {
    backend: B,
    config: RuntimeConfig,
    tx: QueueSender<M>,
    rx: QueueReceiver<M>,
    state: Arc<AtomicU8>,
}

impl<M: Send + 'static> Runtime<M, TerminalBackend> {
    /// A runtime on the controlling terminal.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an invalid config, [`Error::Startup`] when
    /// stdin or stdout is not a terminal.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Self::with_backend(TerminalBackend::open()?, config)
    }
}

impl<M: Send + 'static, B: Backend> Runtime<M, B> {
    /// A runtime on any backend.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an invalid config.
    pub fn with_backend(backend: B, config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = queue::bounded(config.queue_capacity);
        Ok(Self {
            backend,
            config,
            tx,
            rx,
            state: Arc::new(AtomicU8::new(RunState::Initializing.as_u8())),
        })
    }

    /// A handle for sending messages in from other threads. Usable before
    /// `run` starts; sends queue up until the loop is running.
    #[must_use]
    pub fn handle(&self) -> Handle<M> {
        Handle {
            tx: self.tx.clone(),
            state: Arc::clone(&self.state),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run `app` until it quits.
    ///
    /// The terminal is restored before this returns, on success, on error,
    /// and when `app` panics.
    ///
    /// # Errors
    ///
    /// - [`Error::Startup`] if a mode or a thread could not be started.
    /// - [`Error::Render`] if writing a frame failed.
    /// - [`Error::Restore`] if the loop ended cleanly but undoing a mode
    ///   failed. When the loop itself failed, its error wins and the
    ///   restore failure is only logged.
    pub fn run<A>(self, app: &mut A) -> Result<LoopStats>
    where
        A: App<Message = M>,
    {
        let Self {
            mut backend,
            config,
            tx,
            rx,
            state,
        } = self;

        log::info!("runtime: {}", RunState::Initializing);
        let size = backend.size();
        let mut modes = ModeGuard::new(&mut backend);
        for mode in config.modes() {
            modes.enable(mode)?;
        }
        modes.backend.start_input(
            Decoder::new().with_tab_width(config.tab_width),
            input_sink(tx.clone()),
        )?;
        let ticker = config
            .tick_interval()
            .map(|interval| Ticker::spawn(interval, tx.clone()))
            .transpose()
            .map_err(StartupError::Spawn)?;

        let mut encoder = Encoder::new(size.cols);
        encoder.set_sync_output(config.sync_output);
        encoder.set_hide_idle_cursor(config.hide_cursor);
        if config.hide_cursor {
            encoder.assume_cursor_visible(false);
        }

        let mut session = Session {
            ticker,
            rx,
            modes,
            executor: Executor::new(tx),
            pending: VecDeque::new(),
            buffers: DoubleBuffer::new(size.cols, size.rows),
            diff: DiffEngine::new(config.merge_gap),
            encoder,
            hits: HitMap::new(),
            full_redraw: true,
            ctrl_c_quits: config.ctrl_c_quits,
            state,
            stats: LoopStats::default(),
        };

        let outcome = session.drive(app);
        let (stats, restored) = session.shutdown();

        match (outcome, restored) {
            (Ok(()), Ok(())) => Ok(stats),
            (Ok(()), Err(e)) => Err(Error::Restore(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(restore)) => {
                log::error!("runtime: terminal restore also failed: {restore}");
                Err(e)
            }
        }
    }
}

/// Forward reader output into the queue. stdin closing is a quit.
fn input_sink<M: Send + 'static>(tx: QueueSender<M>) -> InputSink {
    Box::new(move |input| {
        let message = match input {
            Input::Event(event) => Message::Input(event),
            Input::Resize(size) => Message::Resize(size),
            Input::Closed => {
                log::info!("runtime: input closed");
                Message::Quit
            }
        };
        tx.send(message).is_ok()
    })
}

// ─── ModeGuard ───────────────────────────────────────────────────────────────

/// Terminal modes switched on so far. Undoes them in reverse order when
/// restored or dropped.
struct ModeGuard<'b, B: Backend> {
    backend: &'b mut B,
    enabled: Vec<Mode>,
}

impl<'b, B: Backend> ModeGuard<'b, B> {
    const fn new(backend: &'b mut B) -> Self {
        Self {
            backend,
            enabled: Vec::new(),
        }
    }

    fn enable(&mut self, mode: Mode) -> Result<(), StartupError> {
        log::debug!("runtime: enabling {}", mode.name());
        self.backend.enable(mode)?;
        self.enabled.push(mode);
        Ok(())
    }

    /// Stop input, then undo every mode, newest first. Keeps going past
    /// failures and returns the first one.
    fn restore(&mut self) -> io::Result<()> {
        self.backend.stop_input();
        let mut first_error = None;
        while let Some(mode) = self.enabled.pop() {
            log::debug!("runtime: disabling {}", mode.name());
            if let Err(e) = self.backend.disable(mode) {
                log::warn!("runtime: disabling {} failed: {e}", mode.name());
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<B: Backend> Drop for ModeGuard<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            log::error!("runtime: terminal restore failed: {e}");
        }
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Everything alive while the loop runs.
///
/// Field order is drop order: on an unwind the ticker stops first, then the
/// receiver goes away (unblocking any producer stuck on a full queue), and
/// only then are the modes undone, which joins the input thread.
struct Session<'b, M, B: Backend> {
    ticker: Option<Ticker>,
    rx: QueueReceiver<M>,
    modes: ModeGuard<'b, B>,
    executor: Executor<M>,
    /// Messages raised on the loop thread itself, served before the queue.
    pending: VecDeque<Message<M>>,
    buffers: DoubleBuffer,
    diff: DiffEngine,
    encoder: Encoder,
    /// Regions of the frame on screen.
    hits: HitMap,
    full_redraw: bool,
    ctrl_c_quits: bool,
    state: Arc<AtomicU8>,
    stats: LoopStats,
}

impl<M: Send + 'static, B: Backend> Session<'_, M, B> {
    fn transition(&self, next: RunState) {
        let prev = RunState::from_u8(self.state.swap(next.as_u8(), Ordering::AcqRel));
        log::info!("runtime: {prev} -> {next}");
    }

    /// Init, first frame, then the message loop. Returns when the app
    /// quits or the queue closes.
    fn drive<A: App<Message = M>>(&mut self, app: &mut A) -> Result<()> {
        if self.dispatch(app.init()) {
            return Ok(());
        }
        self.render(app)?;
        self.transition(RunState::Running);

        loop {
            let message = match self.pending.pop_front() {
                Some(message) => message,
                None => match self.rx.recv() {
                    Some(message) => message,
                    None => {
                        log::info!("runtime: event queue closed");
                        return Ok(());
                    }
                },
            };
            let Some(event) = self.translate(message) else {
                return Ok(());
            };

            self.stats.events += 1;
            let Update { redraw, command } = app.update(event);
            if self.dispatch(command) {
                return Ok(());
            }
            if redraw || self.full_redraw {
                self.render(app)?;
            }
        }
    }

    /// Turn a queue message into an application event. `None` means quit.
    fn translate(&mut self, message: Message<M>) -> Option<Event<M>> {
        match message {
            Message::Input(input::Event::Key(key)) if self.ctrl_c_quits && key.is_ctrl_c() => {
                log::info!("runtime: ctrl-c");
                None
            }
            Message::Input(input::Event::Mouse(mouse)) => Some(Event::Mouse {
                mouse,
                target: self.hits.hit_test(mouse.x, mouse.y),
            }),
            Message::Input(event) => Some(event.into()),
            Message::Resize(size) => {
                self.resize(size);
                Some(Event::Resize(size))
            }
            Message::Tick(at) => {
                let frame = self.stats.ticks_delivered;
                self.stats.ticks_delivered += 1;
                Some(Event::Tick { frame, at })
            }
            Message::User(message) => Some(Event::User(message)),
            Message::CommandFailed(e) => Some(Event::CommandFailed(e)),
            Message::Quit => None,
        }
    }

    fn resize(&mut self, size: Size) {
        log::debug!("runtime: resize to {}x{}", size.cols, size.rows);
        self.buffers.resize(size.cols, size.rows);
        self.encoder.set_width(size.cols);
        self.full_redraw = true;
    }

    /// Submit every task in `command`. Returns whether it asked to quit.
    fn dispatch(&mut self, command: Command<M>) -> bool {
        let mut tasks = Vec::new();
        let quit = command.into_tasks(&mut tasks);
        for task in tasks {
            self.stats.commands_submitted += 1;
            if let Err(e) = self.executor.submit(task) {
                log::warn!("runtime: command not started: {e}");
                self.pending.push_back(Message::CommandFailed(e));
            }
        }
        quit
    }

    /// One render pass: draw, diff, encode, write.
    fn render<A: App<Message = M>>(&mut self, app: &A) -> Result<()> {
        self.hits.clear();
        let back = self.buffers.back_mut();
        back.clear();
        let mut frame = Frame::new(back, &mut self.hits, self.stats.renders);
        app.render(&mut frame);
        let cursor = frame.cursor();

        let full = mem::take(&mut self.full_redraw);
        let (front, back) = self.buffers.split();
        let instructions = if full {
            self.diff.full(back)
        } else {
            self.diff.diff(front, back)
        };
        self.encoder.begin_frame(full);
        self.encoder.encode(instructions);
        let bytes = self.encoder.finish_frame(cursor);
        self.buffers.swap();
        self.stats.renders += 1;

        if bytes > 0 {
            self.modes
                .backend
                .write_frame(self.encoder.output())
                .map_err(Error::Render)?;
            self.stats.frames_written += 1;
            self.stats.bytes_written += bytes as u64;
        }
        log::trace!(
            "runtime: frame {} ({}, {bytes} bytes)",
            self.stats.renders,
            if full { "full" } else { "diff" }
        );
        Ok(())
    }

    /// Draining then Stopped. Abandons whatever is still queued or running.
    fn shutdown(self) -> (LoopStats, io::Result<()>) {
        self.transition(RunState::Draining);
        let Self {
            ticker,
            rx,
            mut modes,
            state,
            mut stats,
            ..
        } = self;

        drop(ticker);
        stats.ticks_dropped = rx.ticks_dropped();
        drop(rx);
        let restored = modes.restore();
        drop(modes);

        let prev = RunState::from_u8(state.swap(RunState::Stopped.as_u8(), Ordering::AcqRel));
        log::info!("runtime: {prev} -> {}", RunState::Stopped);
        (stats, restored)
    }
}
