//! Coalesced "now playing" snapshot for long-polling clients.
//!
//! Tags and source changes are merged into one key/value map. Waiters block until
//! the map changed since they last looked and then receive a copy of it.
//!
//! ## Wake discipline
//! Every update bumps a monotonically increasing version and wakes *all* waiters.
//! Each consumer keeps its own [`DisplayCursor`] (the last version it saw), so any
//! number of concurrent long-polls observe every update they were waiting for;
//! a fast update burst is coalesced into a single wakeup per waiter.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use jukebox_types::{DisplayData, PlaybackState, PlayerEvent, SOURCE_KEY};

use crate::dispatcher::PlayerObserver;
use crate::error::WaitError;

/// Per-consumer position in the update sequence.
///
/// A default cursor has seen nothing, so its first wait returns as soon as any
/// update happened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisplayCursor {
    seen: u64,
}

impl DisplayCursor {
    /// Version of the last snapshot handed to this cursor.
    pub fn seen(&self) -> u64 {
        self.seen
    }
}

#[derive(Default)]
pub struct DisplaySnapshot {
    inner: Mutex<DisplayInner>,
    cv: Condvar,
}

#[derive(Default)]
struct DisplayInner {
    data: DisplayData,
    version: u64,
    closed: bool,
}

impl DisplaySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor positioned at the current version: its first wait blocks until the
    /// next update.
    pub fn cursor(&self) -> DisplayCursor {
        DisplayCursor {
            seen: self.version(),
        }
    }

    /// Current data, without blocking and without moving any cursor.
    pub fn peek(&self) -> DisplayData {
        self.inner
            .lock()
            .map(|g| g.data.clone())
            .unwrap_or_default()
    }

    pub fn version(&self) -> u64 {
        self.inner.lock().map(|g| g.version).unwrap_or(0)
    }

    /// Block until the data changed past `cursor`, then advance it and return a copy.
    ///
    /// Fails with [`WaitError::Closed`] once the snapshot is closed.
    pub fn await_update(&self, cursor: &mut DisplayCursor) -> Result<DisplayData, WaitError> {
        let mut g = self.inner.lock()?;
        loop {
            if g.closed {
                return Err(WaitError::Closed);
            }
            if g.version > cursor.seen {
                cursor.seen = g.version;
                return Ok(g.data.clone());
            }
            g = self.cv.wait(g)?;
        }
    }

    /// Like [`await_update`](Self::await_update) but returns `Ok(None)` after
    /// `timeout` without moving the cursor.
    pub fn await_update_timeout(
        &self,
        cursor: &mut DisplayCursor,
        timeout: Duration,
    ) -> Result<Option<DisplayData>, WaitError> {
        let deadline = Instant::now() + timeout;
        let mut g = self.inner.lock()?;
        loop {
            if g.closed {
                return Err(WaitError::Closed);
            }
            if g.version > cursor.seen {
                cursor.seen = g.version;
                return Ok(Some(g.data.clone()));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (ng, _timeout) = self.cv.wait_timeout(g, deadline - now)?;
            g = ng;
        }
    }

    /// Wake every waiter with [`WaitError::Closed`]. Idempotent.
    pub fn close(&self) {
        if let Ok(mut g) = self.inner.lock() {
            g.closed = true;
        }
        self.cv.notify_all();
    }

    fn update(&self, apply: impl FnOnce(&mut DisplayData)) {
        let Ok(mut g) = self.inner.lock() else {
            tracing::warn!("display snapshot poisoned; update dropped");
            return;
        };
        apply(&mut g.data);
        g.version += 1;
        drop(g);
        self.cv.notify_all();
    }
}

impl PlayerObserver for DisplaySnapshot {
    fn on_event(&self, event: &PlayerEvent) {
        match event {
            PlayerEvent::Tag { key, value } => self.update(|data| {
                data.insert(key.clone(), value.clone());
            }),
            PlayerEvent::NewSource { item } => self.update(|data| {
                data.insert(SOURCE_KEY.to_string(), item.display_title().to_string());
            }),
            PlayerEvent::StateChanged {
                state: PlaybackState::Stopped,
            } => self.update(DisplayData::clear),
            PlayerEvent::StateChanged { .. } => self.update(|_| {}),
            PlayerEvent::Error { .. } | PlayerEvent::PlaylistChanged { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jukebox_types::MediaItem;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn data(pairs: &[(&str, &str)]) -> DisplayData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn tags_merge_into_snapshot() {
        let display = DisplaySnapshot::new();
        display.on_event(&PlayerEvent::tag("artist", "old"));
        display.on_event(&PlayerEvent::state_changed(PlaybackState::Stopped));
        display.on_event(&PlayerEvent::tag("artist", "X"));
        display.on_event(&PlayerEvent::tag("title", "Y"));

        assert_eq!(display.peek(), data(&[("artist", "X"), ("title", "Y")]));
    }

    #[test]
    fn tag_upsert_overwrites_existing_key() {
        let display = DisplaySnapshot::new();
        display.on_event(&PlayerEvent::tag("title", "first"));
        display.on_event(&PlayerEvent::tag("title", "second"));
        assert_eq!(display.peek(), data(&[("title", "second")]));
    }

    #[test]
    fn new_source_sets_source_title() {
        let display = DisplaySnapshot::new();
        display.on_event(&PlayerEvent::NewSource {
            item: MediaItem::new("/music/a.flac", ""),
        });
        assert_eq!(display.peek(), data(&[(SOURCE_KEY, "/music/a.flac")]));

        display.on_event(&PlayerEvent::NewSource {
            item: MediaItem::new("/music/b.flac", "Song B"),
        });
        assert_eq!(display.peek(), data(&[(SOURCE_KEY, "Song B")]));
    }

    #[test]
    fn stopped_clears_everything() {
        let display = DisplaySnapshot::new();
        display.on_event(&PlayerEvent::tag("artist", "X"));
        display.on_event(&PlayerEvent::state_changed(PlaybackState::Paused));
        assert_eq!(display.peek(), data(&[("artist", "X")]));

        display.on_event(&PlayerEvent::state_changed(PlaybackState::Stopped));
        assert!(display.peek().is_empty());
    }

    #[test]
    fn errors_and_playlist_changes_do_not_bump_version() {
        let display = DisplaySnapshot::new();
        display.on_event(&PlayerEvent::error("boom"));
        assert_eq!(display.version(), 0);
        display.on_event(&PlayerEvent::tag("a", "b"));
        assert_eq!(display.version(), 1);
    }

    #[test]
    fn await_update_returns_immediately_when_unseen_data_exists() {
        let display = DisplaySnapshot::new();
        display.on_event(&PlayerEvent::tag("artist", "X"));

        let mut cursor = DisplayCursor::default();
        assert_eq!(
            display.await_update(&mut cursor).unwrap(),
            data(&[("artist", "X")])
        );
        assert_eq!(cursor.seen(), 1);
        assert_eq!(
            display
                .await_update_timeout(&mut cursor, Duration::from_millis(10))
                .unwrap(),
            None
        );
    }

    #[test]
    fn peek_does_not_consume_update() {
        let display = DisplaySnapshot::new();
        display.on_event(&PlayerEvent::tag("artist", "X"));
        let _ = display.peek();

        let mut cursor = DisplayCursor::default();
        assert!(
            display
                .await_update_timeout(&mut cursor, Duration::from_millis(10))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn every_waiter_observes_the_update() {
        let display = Arc::new(DisplaySnapshot::new());
        let waiters = 4;
        let barrier = Arc::new(Barrier::new(waiters + 1));

        let handles: Vec<_> = (0..waiters)
            .map(|_| {
                let display = display.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let mut cursor = display.cursor();
                    barrier.wait();
                    display.await_update(&mut cursor).unwrap()
                })
            })
            .collect();

        barrier.wait();
        display.on_event(&PlayerEvent::tag("title", "Y"));

        for handle in handles {
            assert_eq!(handle.join().unwrap(), data(&[("title", "Y")]));
        }
    }

    #[test]
    fn burst_is_coalesced_into_latest_state() {
        let display = DisplaySnapshot::new();
        let mut cursor = display.cursor();
        display.on_event(&PlayerEvent::tag("artist", "X"));
        display.on_event(&PlayerEvent::tag("title", "Y"));
        display.on_event(&PlayerEvent::tag("album", "Z"));

        let snapshot = display.await_update(&mut cursor).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(cursor.seen(), 3);
    }

    #[test]
    fn close_interrupts_waiters() {
        let display = Arc::new(DisplaySnapshot::new());
        let waiter = display.clone();
        let barrier = Arc::new(Barrier::new(2));
        let start = barrier.clone();

        let handle = thread::spawn(move || {
            let mut cursor = waiter.cursor();
            start.wait();
            waiter.await_update(&mut cursor)
        });

        barrier.wait();
        thread::sleep(Duration::from_millis(20));
        display.close();

        assert_eq!(handle.join().unwrap(), Err(WaitError::Closed));
    }
}
