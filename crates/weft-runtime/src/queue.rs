// SPDX-License-Identifier: MIT
//
// The bounded event queue between producers and the loop.
//
// Producers: the input reader thread, the ticker thread, command threads,
// and any `Handle`. Consumer: the loop, alone. Messages come out in the
// order they went in.
//
// Backpressure policy:
//
//   - Input, resizes, command results, user messages and quit requests use
//     a blocking send. When the loop falls behind, their producers wait;
//     nothing is lost.
//   - Ticks never block. At most one tick sits in the queue at a time: a
//     tick offered while an earlier one is still unconsumed is dropped
//     (coalesced), and so is a tick offered while the queue is full. Every
//     dropped tick is counted.
//
// So a slow `update` sees one tick per turn of the loop instead of a
// backlog, and ticks can never crowd input out of the queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::{Duration, Instant};

use weft_term::input;
use weft_term::terminal::Size;

use crate::command::CommandError;

/// What travels through the queue.
#[derive(Debug)]
pub enum Message<M> {
    Input(input::Event),
    Resize(Size),
    Tick(Instant),
    User(M),
    CommandFailed(CommandError),
    Quit,
}

/// The loop has stopped; nothing is listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event queue closed")]
pub struct Closed;

/// What happened to an offered tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOffer {
    Queued,
    /// An earlier tick was still waiting.
    Coalesced,
    /// The queue was full.
    Full,
    Closed,
}

#[derive(Debug, Default)]
struct Shared {
    tick_pending: AtomicBool,
    ticks_dropped: AtomicU64,
}

/// Producer side. Cheap to clone.
#[derive(Debug)]
pub struct QueueSender<M> {
    tx: SyncSender<Message<M>>,
    shared: Arc<Shared>,
}

impl<M> Clone for QueueSender<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Consumer side, owned by the loop.
#[derive(Debug)]
pub struct QueueReceiver<M> {
    rx: Receiver<Message<M>>,
    shared: Arc<Shared>,
}

/// A queue holding at most `capacity` messages.
#[must_use]
pub fn bounded<M>(capacity: usize) -> (QueueSender<M>, QueueReceiver<M>) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let shared = Arc::new(Shared::default());
    (
        QueueSender {
            tx,
            shared: Arc::clone(&shared),
        },
        QueueReceiver { rx, shared },
    )
}

impl<M> QueueSender<M> {
    /// Enqueue, waiting for room if the queue is full.
    ///
    /// # Errors
    ///
    /// [`Closed`] once the loop has dropped its receiver.
    pub fn send(&self, message: Message<M>) -> Result<(), Closed> {
        self.tx.send(message).map_err(|_| Closed)
    }

    /// Enqueue only if there is room right now.
    ///
    /// # Errors
    ///
    /// Hands the message back if the queue is full or closed.
    pub fn try_send(&self, message: Message<M>) -> Result<(), TrySendError<Message<M>>> {
        self.tx.try_send(message)
    }

    /// Offer a tick without ever blocking. See the module docs for the
    /// drop policy.
    pub fn offer_tick(&self, at: Instant) -> TickOffer {
        if self.shared.tick_pending.swap(true, Ordering::AcqRel) {
            self.shared.ticks_dropped.fetch_add(1, Ordering::Relaxed);
            return TickOffer::Coalesced;
        }
        match self.tx.try_send(Message::Tick(at)) {
            Ok(()) => TickOffer::Queued,
            Err(TrySendError::Full(_)) => {
                self.shared.tick_pending.store(false, Ordering::Release);
                self.shared.ticks_dropped.fetch_add(1, Ordering::Relaxed);
                TickOffer::Full
            }
            Err(TrySendError::Disconnected(_)) => TickOffer::Closed,
        }
    }

    /// Ticks dropped so far.
    #[must_use]
    pub fn ticks_dropped(&self) -> u64 {
        self.shared.ticks_dropped.load(Ordering::Relaxed)
    }
}

impl<M> QueueReceiver<M> {
    /// Wait for the next message. `None` once every sender is gone.
    pub fn recv(&self) -> Option<Message<M>> {
        self.rx.recv().ok().map(|m| self.taken(m))
    }

    /// Wait up to `timeout` for the next message.
    ///
    /// # Errors
    ///
    /// `Timeout` if nothing arrived, `Disconnected` once every sender is
    /// gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Message<M>, RecvTimeoutError> {
        self.rx.recv_timeout(timeout).map(|m| self.taken(m))
    }

    /// Take a message if one is waiting.
    pub fn try_recv(&self) -> Option<Message<M>> {
        self.rx.try_recv().ok().map(|m| self.taken(m))
    }

    /// Ticks dropped so far.
    #[must_use]
    pub fn ticks_dropped(&self) -> u64 {
        self.shared.ticks_dropped.load(Ordering::Relaxed)
    }

    fn taken(&self, message: Message<M>) -> Message<M> {
        if matches!(message, Message::Tick(_)) {
            self.shared.tick_pending.store(false, Ordering::Release);
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn user(n: u32) -> Message<u32> {
        Message::User(n)
    }

    fn as_user(m: Option<Message<u32>>) -> Option<u32> {
        match m {
            Some(Message::User(n)) => Some(n),
            _ => None,
        }
    }

    #[test]
    fn fifo_order() {
        let (tx, rx) = bounded(8);
        for n in 0..5 {
            tx.send(user(n)).unwrap();
        }
        let got: Vec<_> = (0..5).filter_map(|_| as_user(rx.try_recv())).collect();
        assert_eq!(got, [0, 1, 2, 3, 4]);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn second_tick_is_coalesced_until_first_is_taken() {
        let (tx, rx) = bounded::<u32>(8);
        let now = Instant::now();
        assert_eq!(tx.offer_tick(now), TickOffer::Queued);
        assert_eq!(tx.offer_tick(now), TickOffer::Coalesced);
        assert_eq!(tx.offer_tick(now), TickOffer::Coalesced);
        assert_eq!(tx.ticks_dropped(), 2);

        assert!(matches!(rx.try_recv(), Some(Message::Tick(_))));
        assert!(rx.try_recv().is_none());
        assert_eq!(tx.offer_tick(now), TickOffer::Queued);
        assert_eq!(rx.ticks_dropped(), 2);
    }

    #[test]
    fn tick_into_full_queue_is_dropped_without_blocking() {
        let (tx, rx) = bounded(2);
        tx.send(user(1)).unwrap();
        tx.send(user(2)).unwrap();
        assert_eq!(tx.offer_tick(Instant::now()), TickOffer::Full);
        assert_eq!(tx.ticks_dropped(), 1);

        // A full-queue drop does not leave a phantom pending tick behind.
        assert_eq!(as_user(rx.try_recv()), Some(1));
        assert_eq!(tx.offer_tick(Instant::now()), TickOffer::Queued);
    }

    #[test]
    fn ticks_never_displace_input() {
        let (tx, rx) = bounded(4);
        let now = Instant::now();
        tx.offer_tick(now);
        for n in 0..3 {
            tx.send(user(n)).unwrap();
        }
        // Queue is full: one tick plus three messages. More ticks drop.
        for _ in 0..10 {
            assert_ne!(tx.offer_tick(now), TickOffer::Queued);
        }
        assert!(matches!(rx.try_recv(), Some(Message::Tick(_))));
        let got: Vec<_> = (0..3).filter_map(|_| as_user(rx.try_recv())).collect();
        assert_eq!(got, [0, 1, 2]);
    }

    #[test]
    fn blocking_send_waits_for_room() {
        let (tx, rx) = bounded(2);
        tx.send(user(0)).unwrap();
        tx.send(user(1)).unwrap();
        let producer = thread::spawn(move || tx.send(user(2)));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(as_user(rx.recv()), Some(0));
        producer.join().unwrap().unwrap();
        assert_eq!(as_user(rx.recv()), Some(1));
        assert_eq!(as_user(rx.recv()), Some(2));
    }

    #[test]
    fn closed_after_receiver_dropped() {
        let (tx, rx) = bounded::<u32>(2);
        drop(rx);
        assert_eq!(tx.send(user(1)), Err(Closed));
        assert_eq!(tx.offer_tick(Instant::now()), TickOffer::Closed);
    }

    #[test]
    fn recv_none_after_senders_dropped() {
        let (tx, rx) = bounded::<u32>(2);
        drop(tx);
        assert!(rx.recv().is_none());
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(1)).unwrap_err(),
            RecvTimeoutError::Disconnected
        );
    }
}
