// SPDX-License-Identifier: MIT
//
// Errors that end a run.
//
// Everything that can go wrong while the loop is alive falls into one of
// three buckets, and each bucket says which phase it came from:
//
//   Startup  — the terminal could not be prepared (not a tty, raw mode
//              refused, a thread could not start). Whatever was already
//              switched on has been switched off again.
//   Render   — writing a frame failed. The loop stops and restores the
//              terminal.
//   Restore  — the loop ended cleanly but undoing a terminal mode failed.
//
// Failures inside commands are not here: they are delivered to the
// application as `Event::CommandFailed` and the loop keeps going. Config
// problems are `ConfigError`, reported before anything touches the
// terminal.

use std::io;

pub use weft_term::terminal::StartupError;

use crate::config::ConfigError;

/// Why [`Runtime::run`](crate::Runtime::run) failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid runtime config: {0}")]
    Config(#[from] ConfigError),

    #[error("terminal startup failed: {0}")]
    Startup(#[from] StartupError),

    #[error("frame write failed: {0}")]
    Render(#[source] io::Error),

    #[error("terminal restore failed: {0}")]
    Restore(#[source] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
