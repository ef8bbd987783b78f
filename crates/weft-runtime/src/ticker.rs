// SPDX-License-Identifier: MIT
//
// Frame-rate timer.
//
// A thread that offers a tick to the event queue every `interval`. Ticks
// are offered, never forced: the queue drops one when an earlier tick is
// still waiting or there is no room, so a busy loop is never handed a
// backlog. Deadlines advance by whole intervals to keep the rate steady;
// after a long stall (a suspended process) the schedule restarts from now
// instead of firing a burst to catch up.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::queue::{QueueSender, TickOffer};

/// Handle to the ticker thread. Stops the thread on drop.
#[derive(Debug)]
pub struct Ticker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Start offering ticks every `interval`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<M: Send + 'static>(
        interval: Duration,
        tx: QueueSender<M>,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("weft-ticker".into())
            .spawn(move || {
                let mut next = Instant::now() + interval;
                loop {
                    let wait = next.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let now = Instant::now();
                    match tx.offer_tick(now) {
                        TickOffer::Queued => {}
                        TickOffer::Coalesced | TickOffer::Full => {
                            log::debug!("ticker: tick dropped ({} total)", tx.ticks_dropped());
                        }
                        TickOffer::Closed => break,
                    }

                    next += interval;
                    if next < now {
                        next = now + interval;
                    }
                }
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{self, Message};

    #[test]
    fn delivers_ticks() {
        let (tx, rx) = queue::bounded::<()>(4);
        let mut ticker = Ticker::spawn(Duration::from_millis(2), tx).unwrap();
        for _ in 0..3 {
            let msg = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert!(matches!(msg, Message::Tick(_)));
        }
        ticker.stop();
    }

    #[test]
    fn unconsumed_ticks_are_coalesced() {
        let (tx, rx) = queue::bounded::<()>(16);
        let ticker = Ticker::spawn(Duration::from_millis(1), tx).unwrap();
        thread::sleep(Duration::from_millis(40));
        drop(ticker);

        // Only one tick waits in the queue, however many fired.
        assert!(matches!(rx.try_recv(), Some(Message::Tick(_))));
        assert!(rx.try_recv().is_none());
        assert!(rx.ticks_dropped() > 0);
    }

    #[test]
    fn stop_is_prompt_and_idempotent() {
        let (tx, _rx) = queue::bounded::<()>(4);
        let mut ticker = Ticker::spawn(Duration::from_secs(3600), tx).unwrap();
        let start = Instant::now();
        ticker.stop();
        ticker.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn exits_when_queue_closes() {
        let (tx, rx) = queue::bounded::<()>(4);
        let mut ticker = Ticker::spawn(Duration::from_millis(1), tx).unwrap();
        drop(rx);
        thread::sleep(Duration::from_millis(20));
        assert!(ticker.handle.as_ref().is_some_and(JoinHandle::is_finished));
        ticker.stop();
    }
}
