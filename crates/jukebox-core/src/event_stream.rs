//! Queued event stream for pull-based clients.
//!
//! Registered as a player observer; buffers the events a polling front-end cares
//! about and hands them out one at a time.
//!
//! ## Delivery
//! Work-queue semantics: every buffered event goes to exactly one `take_next*`
//! call, in FIFO order. Concurrent takers each get a distinct event. Clients that
//! all need every event should each own a stream.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use jukebox_types::PlayerEvent;

use crate::dispatcher::PlayerObserver;
use crate::error::WaitError;

/// Unbounded FIFO of player events.
///
/// The `closed` flag lives under the same mutex as the queue so a close can never
/// slip between a waiter's check and its wait.
#[derive(Default)]
pub struct EventStream {
    inner: Mutex<StreamInner>,
    cv: Condvar,
}

#[derive(Default)]
struct StreamInner {
    queue: VecDeque<PlayerEvent>,
    closed: bool,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this stream keeps `event`. Tags and new-source events are left to
    /// the display snapshot.
    pub fn accepts(event: &PlayerEvent) -> bool {
        matches!(
            event,
            PlayerEvent::StateChanged { .. }
                | PlayerEvent::Error { .. }
                | PlayerEvent::PlaylistChanged { .. }
        )
    }

    /// Append an event and wake one taker. Ignored once closed.
    pub fn push(&self, event: PlayerEvent) {
        let Ok(mut g) = self.inner.lock() else {
            tracing::warn!(kind = event.kind(), "event stream poisoned; event dropped");
            return;
        };
        if g.closed {
            return;
        }
        g.queue.push_back(event);
        drop(g);
        self.cv.notify_one();
    }

    /// Block until an event is available, then remove and return it.
    ///
    /// Buffered events are still handed out after [`close`](Self::close); once the
    /// stream is closed and empty this fails with [`WaitError::Closed`].
    pub fn take_next(&self) -> Result<PlayerEvent, WaitError> {
        let mut g = self.inner.lock()?;
        loop {
            if let Some(event) = g.queue.pop_front() {
                return Ok(event);
            }
            if g.closed {
                return Err(WaitError::Closed);
            }
            g = self.cv.wait(g)?;
        }
    }

    /// Like [`take_next`](Self::take_next) but gives up after `timeout`,
    /// returning `Ok(None)`.
    pub fn take_next_timeout(&self, timeout: Duration) -> Result<Option<PlayerEvent>, WaitError> {
        let deadline = Instant::now() + timeout;
        let mut g = self.inner.lock()?;
        loop {
            if let Some(event) = g.queue.pop_front() {
                return Ok(Some(event));
            }
            if g.closed {
                return Err(WaitError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (ng, _timeout) = self.cv.wait_timeout(g, deadline - now)?;
            g = ng;
        }
    }

    /// Pop the oldest event without blocking.
    pub fn try_take_next(&self) -> Result<Option<PlayerEvent>, WaitError> {
        let mut g = self.inner.lock()?;
        if let Some(event) = g.queue.pop_front() {
            return Ok(Some(event));
        }
        if g.closed {
            return Err(WaitError::Closed);
        }
        Ok(None)
    }

    /// Number of buffered events (best-effort snapshot).
    pub fn len(&self) -> usize {
        self.inner.lock().map(|g| g.queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting events and wake every waiter.
    ///
    /// Idempotent.
    pub fn close(&self) {
        if let Ok(mut g) = self.inner.lock() {
            g.closed = true;
        }
        self.cv.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().map(|g| g.closed).unwrap_or(true)
    }
}

impl PlayerObserver for EventStream {
    fn on_event(&self, event: &PlayerEvent) {
        if Self::accepts(event) {
            self.push(event.clone());
        }
    }
}
