// SPDX-License-Identifier: MIT
//
// weft — demo application for the runtime.
//
// Wires the two crates together:
//
//   weft-term    → grid, diff, encoder, input decoder, terminal modes
//   weft-runtime → event loop, commands, ticks, hit-testing
//
// The `Demo` struct implements the runtime's App trait. What it exercises:
//
//   Enter    → toggles a two-state switch (one small diff per press)
//   + / -    → counter, also clickable buttons (hit-tested regions)
//   j        → a slow job run as a Command; its result comes back as a
//              message while the spinner keeps turning
//   paste    → shown on the paste line
//   q / Esc  → quit
//
// Layout:
//
//   ┌───────────────────────────────────────┐
//   │ title bar (REVERSE)         cols x rows│  row 0
//   │                                       │
//   │ [ Enter ] switch                      │  row 2
//   │ [ - ] count [ + ]                     │  row 3
//   │ [ j ] job + spinner                   │  row 4
//   │ paste / last key / focus              │  rows 6-8
//   │ help line                             │  last row
//   └───────────────────────────────────────┘
//
// Config comes from the TOML file named by WEFT_CONFIG, if set. Logs go
// to the file named by WEFT_LOG_FILE, if set (stdout is the screen).

use std::env;
use std::fs::File;
use std::process;
use std::thread;
use std::time::Duration;

use weft_runtime::event::{KeyCode, MouseAction, MouseButton};
use weft_runtime::{App, Command, Event, Frame, RegionId, Runtime, RuntimeConfig, Update};
use weft_term::cell::{Attr, Style};
use weft_term::color::Color;
use weft_term::grid::{Rect, string_width};

// ─── Regions ────────────────────────────────────────────────────────────────

const TOGGLE: RegionId = RegionId(1);
const MINUS: RegionId = RegionId(2);
const PLUS: RegionId = RegionId(3);
const JOB: RegionId = RegionId(4);

/// Spinner glyphs. One step every `SPIN_DIVISOR` ticks.
const SPINNER: [char; 4] = ['|', '/', '-', '\\'];
const SPIN_DIVISOR: u64 = 6;

/// Largest count the job accepts.
const JOB_LIMIT: i64 = 90;

/// How long the job pretends to work.
const JOB_DELAY: Duration = Duration::from_millis(400);

// ─── Job ────────────────────────────────────────────────────────────────────

/// Results of the demo's commands.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Msg {
    JobDone { input: i64, value: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Job {
    Idle,
    Running(i64),
    Done { input: i64, value: u64 },
    Failed(String),
}

/// The n-th Fibonacci number, slowly.
fn slow_fib(n: i64) -> Result<u64, String> {
    thread::sleep(JOB_DELAY);
    let n = u32::try_from(n).map_err(|_| format!("fib({n}): negative input"))?;
    if i64::from(n) > JOB_LIMIT {
        return Err(format!("fib({n}): input above {JOB_LIMIT}"));
    }
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        (a, b) = (b, a.saturating_add(b));
    }
    Ok(a)
}

// ─── Demo ───────────────────────────────────────────────────────────────────

struct Demo {
    on: bool,
    count: i64,
    job: Job,
    /// Ticks seen so far.
    ticks: u64,
    paste: Option<String>,
    last_key: Option<String>,
    focused: bool,
    resizes: u32,
}

impl Demo {
    const fn new() -> Self {
        Self {
            on: false,
            count: 0,
            job: Job::Idle,
            ticks: 0,
            paste: None,
            last_key: None,
            focused: true,
            resizes: 0,
        }
    }

    fn start_job(&mut self) -> Update<Msg> {
        if matches!(self.job, Job::Running(_)) {
            return Update::none();
        }
        let input = self.count;
        self.job = Job::Running(input);
        log::info!("demo: job started for {input}");
        Update::command(Command::try_perform(move || {
            slow_fib(input).map(|value| Msg::JobDone { input, value })
        }))
        .and_redraw()
    }

    fn on_key(&mut self, code: KeyCode) -> Update<Msg> {
        self.last_key = Some(format!("{code:?}"));
        match code {
            KeyCode::Char('q') | KeyCode::Escape => Update::quit(),
            KeyCode::Enter => {
                self.on = !self.on;
                Update::redraw()
            }
            KeyCode::Char('+' | '=') => {
                self.count += 1;
                Update::redraw()
            }
            KeyCode::Char('-') => {
                self.count -= 1;
                Update::redraw()
            }
            KeyCode::Char('j') => self.start_job(),
            _ => Update::redraw(),
        }
    }

    fn on_click(&mut self, target: Option<RegionId>) -> Update<Msg> {
        match target {
            Some(TOGGLE) => self.on_key(KeyCode::Enter),
            Some(MINUS) => self.on_key(KeyCode::Char('-')),
            Some(PLUS) => self.on_key(KeyCode::Char('+')),
            Some(JOB) => self.start_job(),
            _ => Update::none(),
        }
    }

    fn spinner(&self) -> char {
        // Index is < 4.
        #[allow(clippy::cast_possible_truncation)]
        let i = ((self.ticks / SPIN_DIVISOR) % SPINNER.len() as u64) as usize;
        SPINNER[i]
    }

    fn job_line(&self) -> (String, Style) {
        match &self.job {
            Job::Idle => ("job: idle".into(), Style::new().attrs(Attr::DIM)),
            Job::Running(n) => (
                format!("job: fib({n}) {}", self.spinner()),
                Style::new().fg(Color::YELLOW),
            ),
            Job::Done { input, value } => (
                format!("job: fib({input}) = {value}"),
                Style::new().fg(Color::GREEN),
            ),
            Job::Failed(reason) => (format!("job failed: {reason}"), Style::new().fg(Color::RED)),
        }
    }
}

/// Draw `label` as a button at `(x, y)` and make it clickable as `id`.
/// Returns the column after it.
fn button(frame: &mut Frame<'_>, x: u16, y: u16, label: &str, id: RegionId) -> u16 {
    let text = format!("[ {label} ]");
    let w = frame.print(x, y, &text, Style::new().attrs(Attr::BOLD));
    frame.register(id, Rect::new(x, y, w, 1));
    x.saturating_add(w)
}

/// First line of `text`, cut to `max` columns.
fn first_line(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    let mut out = String::new();
    for ch in line.chars() {
        if string_width(&out) + string_width(ch.encode_utf8(&mut [0; 4])) > max {
            break;
        }
        out.push(ch);
    }
    if text.lines().nth(1).is_some() || out.len() < line.len() {
        out.push('…');
    }
    out
}

impl App for Demo {
    type Message = Msg;

    fn update(&mut self, event: Event<Msg>) -> Update<Msg> {
        match event {
            Event::Key(key) => self.on_key(key.code),
            Event::Mouse { mouse, target } => {
                if mouse.button == MouseButton::Left && mouse.action == MouseAction::Press {
                    self.on_click(target)
                } else {
                    Update::none()
                }
            }
            Event::Paste(text) => {
                log::debug!("demo: {} bytes pasted", text.len());
                self.paste = Some(text);
                Update::redraw()
            }
            Event::Resize(size) => {
                log::debug!("demo: resized to {}x{}", size.cols, size.rows);
                self.resizes += 1;
                Update::redraw()
            }
            Event::Tick { frame, .. } => {
                self.ticks = frame;
                // Only the spinner moves, and only while the job runs.
                if matches!(self.job, Job::Running(_)) {
                    Update::redraw()
                } else {
                    Update::none()
                }
            }
            Event::FocusGained => {
                self.focused = true;
                Update::redraw()
            }
            Event::FocusLost => {
                self.focused = false;
                Update::redraw()
            }
            Event::User(Msg::JobDone { input, value }) => {
                log::info!("demo: job done, fib({input}) = {value}");
                self.job = Job::Done { input, value };
                Update::redraw()
            }
            Event::CommandFailed(e) => {
                log::warn!("demo: {e}");
                self.job = Job::Failed(e.to_string());
                Update::redraw()
            }
        }
    }

    fn render(&self, frame: &mut Frame<'_>) {
        let width = frame.width();
        let bar = Style::new().attrs(Attr::REVERSE);

        // Title bar.
        frame.fill_rect(Rect::new(0, 0, width, 1), ' ', bar);
        frame.print(1, 0, "weft demo", bar.add(Attr::BOLD));
        let dims = format!("{}x{}", width, frame.height());
        #[allow(clippy::cast_possible_truncation)]
        let dims_w = string_width(&dims) as u16;
        frame.print(width.saturating_sub(dims_w + 1), 0, &dims, bar);

        // Switch.
        let x = button(frame, 1, 2, "Enter", TOGGLE);
        let (label, style) = if self.on {
            ("switch: on", Style::new().fg(Color::GREEN).attrs(Attr::BOLD))
        } else {
            ("switch: off", Style::new().attrs(Attr::DIM))
        };
        frame.print(x + 1, 2, label, style);

        // Counter.
        let x = button(frame, 1, 3, "-", MINUS);
        let x = x + 1 + frame.print(x + 1, 3, &format!("count: {}", self.count), Style::new());
        button(frame, x + 1, 3, "+", PLUS);

        // Job.
        let x = button(frame, 1, 4, "j", JOB);
        let (line, style) = self.job_line();
        frame.print(x + 1, 4, &line, style);

        // Inputs.
        let max = usize::from(width.saturating_sub(10));
        let paste = self
            .paste
            .as_deref()
            .map_or_else(|| "(nothing yet)".to_string(), |p| first_line(p, max));
        frame.print(1, 6, &format!("paste: {paste}"), Style::new());
        if let Some(key) = &self.last_key {
            frame.print(1, 7, &format!("key:   {key}"), Style::new());
        }
        let focus = if self.focused { "focused" } else { "unfocused" };
        let status = format!("{focus}, {} resizes", self.resizes);
        frame.print(1, 8, &status, Style::new().attrs(Attr::DIM));

        // Help.
        let help = "q quit  Enter toggle  +/- count  j job  or click";
        frame.print(1, frame.height().saturating_sub(1), help, Style::new().fg(Color::CYAN));
    }
}

// ─── Startup ────────────────────────────────────────────────────────────────

/// Log to the file named by `WEFT_LOG_FILE`. Without it, logging is off.
fn init_logging() {
    let Some(path) = env::var_os("WEFT_LOG_FILE") else {
        return;
    };
    match File::create(&path) {
        Ok(file) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .target(env_logger::Target::Pipe(Box::new(file)))
                .init();
        }
        Err(e) => eprintln!("weft: cannot open log file {}: {e}", path.to_string_lossy()),
    }
}

/// The file named by `WEFT_CONFIG`, or defaults with the mouse on.
fn load_config() -> Result<RuntimeConfig, weft_runtime::ConfigError> {
    env::var_os("WEFT_CONFIG").map_or_else(
        || Ok(RuntimeConfig::default().with_mouse(true)),
        RuntimeConfig::load,
    )
}

fn main() {
    init_logging();

    let config = load_config().unwrap_or_else(|e| {
        eprintln!("weft: {e}");
        process::exit(2);
    });

    let mut demo = Demo::new();
    match Runtime::new(config).and_then(|rt| rt.run(&mut demo)) {
        Ok(stats) => log::info!("demo: finished, {stats:?}"),
        Err(e) => {
            eprintln!("weft: {e}");
            process::exit(1);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use weft_runtime::TestBackend;

    fn run_demo(backend: &TestBackend, demo: &mut Demo) {
        Runtime::with_backend(backend.clone(), RuntimeConfig::default().with_fps(0).with_mouse(true))
            .and_then(|rt| rt.run(demo))
            .unwrap();
    }

    // ── Job ───────────────────────────────────────────────────────────

    #[test]
    fn fib_values_and_limits() {
        assert_eq!(slow_fib(0), Ok(0));
        assert_eq!(slow_fib(10), Ok(55));
        assert!(slow_fib(-1).is_err());
        assert!(slow_fib(JOB_LIMIT + 1).is_err());
    }

    #[test]
    fn first_line_truncates() {
        assert_eq!(first_line("hello", 10), "hello");
        assert_eq!(first_line("hello\nworld", 10), "hello…");
        assert_eq!(first_line("abcdefgh", 3), "abc…");
        assert_eq!(first_line("", 3), "");
    }

    // ── Update ────────────────────────────────────────────────────────

    #[test]
    fn keys_drive_state() {
        let mut d = Demo::new();
        assert!(d.on_key(KeyCode::Enter).redraw);
        assert!(d.on);
        let _ = d.on_key(KeyCode::Char('+'));
        let _ = d.on_key(KeyCode::Char('+'));
        let _ = d.on_key(KeyCode::Char('-'));
        assert_eq!(d.count, 1);
        assert!(d.on_key(KeyCode::Char('q')).command.is_quit());
    }

    #[test]
    fn job_runs_once_at_a_time() {
        let mut d = Demo::new();
        let first = d.on_key(KeyCode::Char('j'));
        assert!(!first.command.is_none());
        assert_eq!(d.job, Job::Running(0));
        let second = d.on_key(KeyCode::Char('j'));
        assert!(second.command.is_none());
    }

    #[test]
    fn clicks_map_to_actions() {
        let mut d = Demo::new();
        let _ = d.on_click(Some(PLUS));
        let _ = d.on_click(Some(TOGGLE));
        let _ = d.on_click(None);
        assert_eq!(d.count, 1);
        assert!(d.on);
    }

    // ── Whole loop ────────────────────────────────────────────────────

    #[test]
    fn demo_renders_and_quits() {
        let backend = TestBackend::new(60, 12);
        backend.feed(b"\r+");
        backend.feed(b"\x1b[200~pasted text\x1b[201~");
        backend.feed(b"q");
        let mut demo = Demo::new();
        run_demo(&backend, &mut demo);

        assert!(demo.on);
        assert_eq!(demo.count, 1);
        assert_eq!(demo.paste.as_deref(), Some("pasted text"));
        let frames = backend.frame_strings();
        assert!(frames[0].contains("weft demo"));
        assert!(frames.iter().any(|f| f.contains("pasted text")));
        assert!(backend.enabled_modes().is_empty());
    }

    #[test]
    fn clicking_plus_increments() {
        let backend = TestBackend::new(60, 12);
        // "[ - ]" at 1..6, "count: 0" at 7..15, "[ + ]" starts at 16.
        backend.feed(b"\x1b[<0;18;4M");
        backend.feed(b"q");
        let mut demo = Demo::new();
        run_demo(&backend, &mut demo);
        assert_eq!(demo.count, 1);
    }

    #[test]
    fn job_result_arrives() {
        struct UntilDone(Demo);
        impl App for UntilDone {
            type Message = Msg;
            fn init(&mut self) -> Command<Msg> {
                self.0.start_job().command
            }
            fn update(&mut self, event: Event<Msg>) -> Update<Msg> {
                let update = self.0.update(event);
                if matches!(self.0.job, Job::Done { .. } | Job::Failed(_)) {
                    return Update::quit();
                }
                update
            }
            fn render(&self, frame: &mut Frame<'_>) {
                self.0.render(frame);
            }
        }

        let backend = TestBackend::new(60, 12);
        let mut app = UntilDone(Demo::new());
        app.0.count = 10;
        Runtime::with_backend(backend, RuntimeConfig::default().with_fps(30))
            .and_then(|rt| rt.run(&mut app))
            .unwrap();
        assert_eq!(app.0.job, Job::Done { input: 10, value: 55 });
    }
}
