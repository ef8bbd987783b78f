// SPDX-License-Identifier: MIT
//
// Commands: deferred work the application asks the runtime to do.
//
// `update` returns a `Command` alongside its redraw decision. The runtime
// takes it apart: `quit` moves the loop to draining, every task is handed
// to the executor, `none` does nothing. A task runs on its own thread and
// produces at most one message, which comes back through the event queue
// as `Event::User`. Failures and panics come back as
// `Event::CommandFailed`.
//
// Once submitted, a command is not tracked. There is no cancellation: when
// the loop stops it simply stops listening for results.

use std::time::Duration;

/// Error type carried by [`CommandError::Failed`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The body of a task. Returns the message to deliver, if any.
pub(crate) type Task<M> = Box<dyn FnOnce() -> Result<Option<M>, BoxError> + Send + 'static>;

// ─── CommandError ───────────────────────────────────────────────────────────

/// A command that did not complete.
///
/// Delivered to the application as [`Event::CommandFailed`](crate::Event)
/// and never fatal to the loop.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command failed: {0}")]
    Failed(#[source] BoxError),
    #[error("command panicked: {0}")]
    Panicked(String),
}

// ─── Command ────────────────────────────────────────────────────────────────

/// Deferred work returned from `update`.
///
/// ```
/// use std::time::Duration;
/// use weft_runtime::Command;
///
/// enum Msg { Loaded(String), Blink }
///
/// let load = Command::perform(|| Msg::Loaded(String::from("data")));
/// let blink = Command::after(Duration::from_millis(500), Msg::Blink);
/// let both = Command::batch([load, blink]);
/// assert!(!both.is_none());
/// ```
#[must_use = "a command does nothing unless returned to the runtime"]
pub struct Command<M> {
    kind: Kind<M>,
}

enum Kind<M> {
    None,
    Quit,
    Task(Task<M>),
    Batch(Vec<Command<M>>),
}

impl<M> Command<M> {
    /// No work.
    pub const fn none() -> Self {
        Self { kind: Kind::None }
    }

    /// Stop the loop. Work still in flight is abandoned.
    pub const fn quit() -> Self {
        Self { kind: Kind::Quit }
    }

    /// Several commands at once. Tasks in a batch run concurrently.
    pub fn batch(commands: impl IntoIterator<Item = Self>) -> Self {
        Self {
            kind: Kind::Batch(commands.into_iter().collect()),
        }
    }

    /// Whether this command does nothing.
    #[must_use]
    pub fn is_none(&self) -> bool {
        match &self.kind {
            Kind::None => true,
            Kind::Batch(cmds) => cmds.iter().all(Self::is_none),
            Kind::Quit | Kind::Task(_) => false,
        }
    }

    /// Whether this command (or anything in its batch) stops the loop.
    #[must_use]
    pub fn is_quit(&self) -> bool {
        match &self.kind {
            Kind::Quit => true,
            Kind::Batch(cmds) => cmds.iter().any(Self::is_quit),
            Kind::None | Kind::Task(_) => false,
        }
    }

    /// Flatten into tasks, reporting whether a quit was found.
    pub(crate) fn into_tasks(self, tasks: &mut Vec<Task<M>>) -> bool {
        match self.kind {
            Kind::None => false,
            Kind::Quit => true,
            Kind::Task(task) => {
                tasks.push(task);
                false
            }
            Kind::Batch(cmds) => cmds
                .into_iter()
                .fold(false, |quit, cmd| cmd.into_tasks(tasks) | quit),
        }
    }
}

impl<M: Send + 'static> Command<M> {
    /// Run `f` off the loop and deliver its result as a message.
    pub fn perform<F>(f: F) -> Self
    where
        F: FnOnce() -> M + Send + 'static,
    {
        Self::task(move || Ok(Some(f())))
    }

    /// Run a fallible `f` off the loop. `Ok` is delivered as a message,
    /// `Err` as [`CommandError::Failed`].
    pub fn try_perform<F, E>(f: F) -> Self
    where
        F: FnOnce() -> Result<M, E> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::task(move || f().map(Some).map_err(Into::into))
    }

    /// Run `f` off the loop for its side effects only.
    pub fn spawn<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::task(move || {
            f();
            Ok(None)
        })
    }

    /// Deliver `message` after `delay`.
    pub fn after(delay: Duration, message: M) -> Self {
        Self::task(move || {
            std::thread::sleep(delay);
            Ok(Some(message))
        })
    }

    fn task<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<Option<M>, BoxError> + Send + 'static,
    {
        Self {
            kind: Kind::Task(Box::new(f)),
        }
    }
}

impl<M> Default for Command<M> {
    fn default() -> Self {
        Self::none()
    }
}

impl<M> std::fmt::Debug for Command<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Kind::None => f.write_str("Command::None"),
            Kind::Quit => f.write_str("Command::Quit"),
            Kind::Task(_) => f.write_str("Command::Task"),
            Kind::Batch(cmds) => f.debug_tuple("Command::Batch").field(cmds).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_all(cmd: Command<u32>) -> (bool, Vec<Result<Option<u32>, String>>) {
        let mut tasks = Vec::new();
        let quit = cmd.into_tasks(&mut tasks);
        let results = tasks
            .into_iter()
            .map(|t| t().map_err(|e| e.to_string()))
            .collect();
        (quit, results)
    }

    #[test]
    fn none_has_no_tasks() {
        let (quit, results) = run_all(Command::none());
        assert!(!quit);
        assert!(results.is_empty());
        assert!(Command::<u32>::none().is_none());
        assert!(Command::<u32>::default().is_none());
    }

    #[test]
    fn quit_is_detected() {
        assert!(Command::<u32>::quit().is_quit());
        let (quit, results) = run_all(Command::quit());
        assert!(quit);
        assert!(results.is_empty());
    }

    #[test]
    fn perform_yields_message() {
        assert_eq!(run_all(Command::perform(|| 7)).1, [Ok(Some(7))]);
    }

    #[test]
    fn try_perform_maps_errors() {
        let ok = Command::try_perform(|| Ok::<_, std::io::Error>(3));
        assert_eq!(run_all(ok).1, [Ok(Some(3))]);

        let err = Command::<u32>::try_perform(|| Err(std::io::Error::other("offline")));
        assert_eq!(run_all(err).1, [Err("offline".to_string())]);
    }

    #[test]
    fn spawn_yields_nothing() {
        assert_eq!(run_all(Command::spawn(|| {})).1, [Ok(None)]);
    }

    #[test]
    fn after_waits_then_yields() {
        let start = std::time::Instant::now();
        assert_eq!(
            run_all(Command::after(Duration::from_millis(10), 5)).1,
            [Ok(Some(5))]
        );
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn batch_flattens_in_order() {
        let cmd = Command::batch([
            Command::perform(|| 1),
            Command::batch([Command::none(), Command::perform(|| 2)]),
            Command::quit(),
        ]);
        assert!(cmd.is_quit());
        assert!(!cmd.is_none());
        let (quit, results) = run_all(cmd);
        assert!(quit);
        assert_eq!(results, [Ok(Some(1)), Ok(Some(2))]);
    }

    #[test]
    fn empty_batch_is_none() {
        assert!(Command::<u32>::batch([]).is_none());
    }

    #[test]
    fn error_messages() {
        let e = CommandError::Panicked("boom".into());
        assert_eq!(e.to_string(), "command panicked: boom");
        let e = CommandError::Failed("disk full".into());
        assert_eq!(e.to_string(), "command failed: disk full");
    }
}
