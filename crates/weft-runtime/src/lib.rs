//! # weft-runtime: the event loop for weft applications
//!
//! An application implements [`App`]: `update` turns one [`Event`] into new
//! state plus an optional [`Command`], and `render` draws the whole screen
//! into a [`Frame`]. The [`Runtime`] owns the terminal and everything around
//! those two calls:
//!
//! - **[`queue`]**: one bounded, ordered queue fed by input, ticks, command
//!   results and [`Handle`]s. Ticks are dropped rather than queued up.
//! - **[`executor`]**: commands run on their own threads, so `update` never
//!   blocks. Failures and panics come back as [`Event::CommandFailed`].
//! - **[`runtime`]**: the loop itself, from switching terminal modes on to
//!   restoring them, on every exit path.
//! - **[`backend`]**: the terminal behind a trait, with a headless
//!   [`TestBackend`](backend::TestBackend) for tests.
//! - **[`config`]**: [`RuntimeConfig`], loadable from TOML.

pub mod backend;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod frame;
pub mod hit;
pub mod queue;
pub mod runtime;
pub mod ticker;

pub use backend::{Backend, TerminalBackend, TestBackend};
pub use command::{Command, CommandError};
pub use config::{ConfigError, RuntimeConfig};
pub use error::{Error, StartupError};
pub use event::Event;
pub use frame::Frame;
pub use hit::RegionId;
pub use queue::Closed;
pub use runtime::{App, Handle, LoopStats, RunState, Runtime, Update};
