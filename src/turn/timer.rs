//! Cancellable one-shot timers.
//!
//! A [`Timer`] schedules a single event onto an unbounded channel after a
//! delay. Every arming gets a fresh id that travels with the event, so an
//! event from a timer that was cancelled or re-armed after it had already
//! fired is recognised as stale via [`Timer::is_current`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub(crate) struct Timer {
    name: &'static str,
    next_id: u64,
    armed: Option<(u64, JoinHandle<()>)>,
}

impl Timer {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: 0,
            armed: None,
        }
    }

    /// Cancel any pending firing, then schedule `make(id)` to be sent on
    /// `tx` after `delay`.
    pub(crate) fn arm<T, F>(&mut self, delay: Duration, tx: &mpsc::UnboundedSender<T>, make: F)
    where
        T: Send + 'static,
        F: FnOnce(u64) -> T + Send + 'static,
    {
        self.cancel();

        let id = self.next_id;
        self.next_id += 1;

        let tx = tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(make(id));
        });

        log::trace!("timer {}: armed #{id} for {delay:?}", self.name);
        self.armed = Some((id, handle));
    }

    pub(crate) fn cancel(&mut self) {
        if let Some((id, handle)) = self.armed.take() {
            handle.abort();
            log::trace!("timer {}: cancelled #{id}", self.name);
        }
    }

    /// `true` if `id` belongs to the arming still pending.
    pub(crate) fn is_current(&self, id: u64) -> bool {
        matches!(self.armed, Some((armed, _)) if armed == id)
    }

    /// Forget the arming after its event has been handled.
    pub(crate) fn clear(&mut self) {
        self.armed = None;
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}
