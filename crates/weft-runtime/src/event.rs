// SPDX-License-Identifier: MIT
//
// Events delivered to the application.
//
// One closed enum covers everything `update` can be told: decoded input,
// resizes, ticks, command failures, and the application's own messages
// (`User`), so matching on it is exhaustive and a new kind of event is a
// compile error everywhere it is not handled.

use std::time::Instant;

use weft_term::input;
pub use weft_term::input::{KeyCode, KeyEvent, Modifiers, MouseAction, MouseButton, MouseEvent};
pub use weft_term::terminal::Size;

use crate::command::CommandError;
use crate::hit::RegionId;

/// Something the application should react to.
#[derive(Debug)]
pub enum Event<M> {
    /// A key press.
    Key(KeyEvent),
    /// A mouse report, with the topmost region under the pointer in the
    /// frame on screen when it arrived.
    Mouse {
        mouse: MouseEvent,
        target: Option<RegionId>,
    },
    /// Bracketed paste content.
    Paste(String),
    /// The terminal changed size. The next frame is a full redraw.
    Resize(Size),
    /// Frame-rate timer. `frame` counts delivered ticks from 0.
    Tick { frame: u64, at: Instant },
    FocusGained,
    FocusLost,
    /// A command failed or panicked.
    CommandFailed(CommandError),
    /// A message produced by a command or sent through a
    /// [`Handle`](crate::Handle).
    User(M),
}

impl<M> Event<M> {
    /// The key, for key events.
    #[must_use]
    pub const fn key(&self) -> Option<&KeyEvent> {
        match self {
            Self::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Whether this is a plain press of `code`.
    #[must_use]
    pub fn is_key(&self, code: KeyCode) -> bool {
        self.key().is_some_and(|k| *k == KeyEvent::plain(code))
    }

    #[must_use]
    pub const fn is_tick(&self) -> bool {
        matches!(self, Self::Tick { .. })
    }
}

impl<M> From<input::Event> for Event<M> {
    /// Mouse events start without a target; the runtime resolves it.
    fn from(event: input::Event) -> Self {
        match event {
            input::Event::Key(k) => Self::Key(k),
            input::Event::Mouse(mouse) => Self::Mouse {
                mouse,
                target: None,
            },
            input::Event::Paste(text) => Self::Paste(text),
            input::Event::FocusGained => Self::FocusGained,
            input::Event::FocusLost => Self::FocusLost,
        }
    }
}
