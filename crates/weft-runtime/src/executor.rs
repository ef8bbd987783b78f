// SPDX-License-Identifier: MIT
//
// Command executor.
//
// Each submitted task gets its own thread, so a slow task never holds up
// another. The thread runs the task under `catch_unwind`, then pushes the
// outcome into the event queue:
//
//   Ok(Some(msg))  → Message::User(msg)
//   Ok(None)       → nothing
//   Err(e)         → Message::CommandFailed(Failed(e))
//   panic          → Message::CommandFailed(Panicked(text))
//
// Results that arrive after the loop has stopped are dropped (the send
// fails because the queue is closed). Nobody joins these threads: a task
// still running at shutdown is abandoned, not cancelled.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use weft_term::terminal;

use crate::command::{CommandError, Task};
use crate::queue::{Message, QueueSender};

/// Runs command tasks off the loop thread.
#[derive(Debug)]
pub struct Executor<M> {
    tx: QueueSender<M>,
    submitted: u64,
}

impl<M: Send + 'static> Executor<M> {
    /// An executor delivering results into `tx`.
    #[must_use]
    pub const fn new(tx: QueueSender<M>) -> Self {
        Self { tx, submitted: 0 }
    }

    /// Tasks submitted so far.
    #[must_use]
    pub const fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Start `task` on a new thread.
    ///
    /// # Errors
    ///
    /// [`CommandError::Failed`] if the thread cannot be spawned. The loop
    /// delivers it to the application like any other failure.
    pub(crate) fn submit(&mut self, task: Task<M>) -> Result<(), CommandError> {
        self.submitted += 1;
        let id = self.submitted;
        let tx = self.tx.clone();

        thread::Builder::new()
            .name(format!("weft-command-{id}"))
            .spawn(move || run_task(id, task, &tx))
            .map(drop)
            .map_err(|e| CommandError::Failed(Box::new(e)))
    }
}

fn run_task<M>(id: u64, task: Task<M>, tx: &QueueSender<M>) {
    terminal::catch_panics_on_this_thread();

    let message = match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(Some(msg))) => Message::User(msg),
        Ok(Ok(None)) => return,
        Ok(Err(e)) => {
            log::warn!("command {id} failed: {e}");
            Message::CommandFailed(CommandError::Failed(e))
        }
        Err(payload) => {
            let text = panic_text(payload.as_ref());
            log::warn!("command {id} panicked: {text}");
            Message::CommandFailed(CommandError::Panicked(text))
        }
    };

    if tx.send(message).is_err() {
        log::debug!("command {id}: result abandoned, loop has stopped");
    }
}

/// The message a panic was raised with, when it is a string.
fn panic_text(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
