//! Simulated playback engine.
//!
//! Sessions "play" by the clock: one engine thread keeps every open session's
//! playing time, reports tags after `tag_delay_ms`, and end-of-stream after
//! `track_ms`. Items listed in `fail_items` fault once, halfway through.
//!
//! Session handles only post messages to the engine thread and never wait on it;
//! the engine thread is the only caller of [`SessionCallbacks`].

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use jukebox_core::{EngineSession, EngineState, PlaybackEngine, SessionCallbacks, SessionId};
use jukebox_types::MediaItem;

use crate::config::EngineConfig;

/// Messages accepted by the engine thread.
#[derive(Debug)]
enum EngineMsg {
    Open {
        item: MediaItem,
        callbacks: SessionCallbacks,
    },
    Play(SessionId),
    Pause(SessionId),
    Stop(SessionId),
    Close(SessionId),
    Shutdown,
}

struct EngineThread {
    tx: Sender<EngineMsg>,
    join: JoinHandle<()>,
}

pub struct TimerEngine {
    settings: EngineConfig,
    thread: Mutex<Option<EngineThread>>,
}

impl TimerEngine {
    pub fn new(settings: EngineConfig) -> Self {
        Self {
            settings,
            thread: Mutex::new(None),
        }
    }

    fn sender(&self) -> Result<Sender<EngineMsg>> {
        let guard = self
            .thread
            .lock()
            .map_err(|_| anyhow!("timer engine lock poisoned"))?;
        guard
            .as_ref()
            .map(|t| t.tx.clone())
            .ok_or_else(|| anyhow!("timer engine not initialized"))
    }
}

impl PlaybackEngine for TimerEngine {
    fn init(&self) -> Result<()> {
        let mut guard = self
            .thread
            .lock()
            .map_err(|_| anyhow!("timer engine lock poisoned"))?;
        if guard.is_some() {
            anyhow::bail!("timer engine already initialized");
        }
        let (tx, rx) = crossbeam_channel::unbounded();
        let settings = self.settings.clone();
        let join = std::thread::Builder::new()
            .name("timer-engine".to_string())
            .spawn(move || engine_thread_main(settings, rx))?;
        tracing::info!(
            track_ms = self.settings.track_ms,
            tag_delay_ms = self.settings.tag_delay_ms,
            recover_errors = self.settings.recover_errors,
            "timer engine started"
        );
        *guard = Some(EngineThread { tx, join });
        Ok(())
    }

    fn create(
        &self,
        item: &MediaItem,
        callbacks: SessionCallbacks,
    ) -> Result<Box<dyn EngineSession>> {
        let tx = self.sender()?;
        let id = callbacks.session();
        tx.send(EngineMsg::Open {
            item: item.clone(),
            callbacks,
        })
        .map_err(|_| anyhow!("timer engine is shut down"))?;
        Ok(Box::new(TimerSession {
            id,
            tx,
            recover_errors: self.settings.recover_errors,
        }))
    }

    fn shutdown(&self) {
        let Ok(mut guard) = self.thread.lock() else {
            return;
        };
        if let Some(thread) = guard.take() {
            let _ = thread.tx.send(EngineMsg::Shutdown);
            // The engine thread may be blocked on the caller's lock; join elsewhere.
            std::thread::spawn(move || {
                let _ = thread.join.join();
            });
            tracing::info!("timer engine stopped");
        }
    }
}

struct TimerSession {
    id: SessionId,
    tx: Sender<EngineMsg>,
    recover_errors: bool,
}

impl TimerSession {
    fn post(&self, msg: EngineMsg) -> Result<()> {
        self.tx
            .send(msg)
            .map_err(|_| anyhow!("timer engine is shut down"))
    }
}

impl EngineSession for TimerSession {
    fn play(&mut self) -> Result<()> {
        self.post(EngineMsg::Play(self.id))
    }

    fn pause(&mut self) -> Result<()> {
        self.post(EngineMsg::Pause(self.id))
    }

    fn stop(&mut self) -> Result<()> {
        self.post(EngineMsg::Stop(self.id))
    }

    fn error_recovery_allowed(&self) -> bool {
        self.recover_errors
    }
}

impl Drop for TimerSession {
    fn drop(&mut self) {
        let _ = self.tx.send(EngineMsg::Close(self.id));
    }
}

/// Clock state of one open session.
struct SimSession {
    item: MediaItem,
    callbacks: SessionCallbacks,
    played: Duration,
    running_since: Option<Instant>,
    tags_sent: bool,
    fault_pending: bool,
    finished: bool,
}

impl SimSession {
    fn position(&self, now: Instant) -> Duration {
        self.played
            + self
                .running_since
                .map_or(Duration::ZERO, |since| now.saturating_duration_since(since))
    }

    fn next_deadline(&self, settings: &EngineConfig) -> Option<Instant> {
        if self.finished {
            return None;
        }
        let since = self.running_since?;
        let at = |mark: Duration| since + mark.saturating_sub(self.played);
        let track = Duration::from_millis(settings.track_ms);
        let mut due = at(track);
        if !self.tags_sent {
            due = due.min(at(Duration::from_millis(settings.tag_delay_ms)));
        }
        if self.fault_pending {
            due = due.min(at(track / 2));
        }
        Some(due)
    }

    /// Report whatever became due by `now`.
    fn fire_due(&mut self, settings: &EngineConfig, now: Instant) {
        if self.finished || self.running_since.is_none() {
            return;
        }
        let pos = self.position(now);
        let track = Duration::from_millis(settings.track_ms);
        if !self.tags_sent && pos >= Duration::from_millis(settings.tag_delay_ms) {
            self.tags_sent = true;
            for (key, value) in tags_for(&self.item) {
                self.callbacks.tag(key, value);
            }
        }
        if self.fault_pending && pos >= track / 2 {
            self.fault_pending = false;
            self.finished = true;
            tracing::debug!(session = self.callbacks.session(), item = %self.item.id, "simulated fault");
            self.callbacks
                .error(format!("simulated decode fault in {}", self.item.id));
        } else if pos >= track {
            self.finished = true;
            self.callbacks.end_of_stream();
        }
    }
}

/// Tags reported for an item: `title`, plus `artist` for "Artist - Title".
pub fn tags_for(item: &MediaItem) -> Vec<(String, String)> {
    let display = item.display_title();
    match display.split_once(" - ") {
        Some((artist, title)) if !artist.trim().is_empty() && !title.trim().is_empty() => vec![
            ("artist".to_string(), artist.trim().to_string()),
            ("title".to_string(), title.trim().to_string()),
        ],
        _ => vec![("title".to_string(), display.to_string())],
    }
}

/// Main loop for the engine thread.
fn engine_thread_main(settings: EngineConfig, rx: Receiver<EngineMsg>) {
    let mut sessions: HashMap<SessionId, SimSession> = HashMap::new();
    let mut faulted: HashSet<String> = HashSet::new();

    loop {
        let next_due = sessions
            .values()
            .filter_map(|s| s.next_deadline(&settings))
            .min();
        let msg = match next_due {
            Some(due) => {
                match rx.recv_timeout(due.saturating_duration_since(Instant::now())) {
                    Ok(msg) => Some(msg),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => break,
            },
        };

        let now = Instant::now();
        match msg {
            None => {
                for session in sessions.values_mut() {
                    session.fire_due(&settings, now);
                }
            }
            Some(EngineMsg::Shutdown) => break,
            Some(EngineMsg::Open { item, callbacks }) => {
                let id = callbacks.session();
                let fault_pending =
                    settings.fail_items.contains(&item.id) && faulted.insert(item.id.clone());
                callbacks.state_changed(EngineState::Ready);
                sessions.insert(
                    id,
                    SimSession {
                        item,
                        callbacks,
                        played: Duration::ZERO,
                        running_since: None,
                        tags_sent: false,
                        fault_pending,
                        finished: false,
                    },
                );
            }
            Some(EngineMsg::Play(id)) => {
                if let Some(s) = sessions.get_mut(&id) {
                    if s.running_since.is_none() && !s.finished {
                        s.running_since = Some(now);
                        s.callbacks.state_changed(EngineState::Playing);
                    }
                }
            }
            Some(EngineMsg::Pause(id)) => {
                if let Some(s) = sessions.get_mut(&id) {
                    if let Some(since) = s.running_since.take() {
                        s.played += now.saturating_duration_since(since);
                        s.callbacks.state_changed(EngineState::Paused);
                    }
                }
            }
            Some(EngineMsg::Stop(id)) => {
                if let Some(s) = sessions.get_mut(&id) {
                    s.running_since = None;
                    s.played = Duration::ZERO;
                    s.finished = true;
                    s.callbacks.state_changed(EngineState::Stopped);
                }
            }
            Some(EngineMsg::Close(id)) => {
                sessions.remove(&id);
            }
        }
    }
    tracing::debug!(open_sessions = sessions.len(), "timer engine thread exiting");
}
