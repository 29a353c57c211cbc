//! Playback session controller.
//!
//! Owns the playlist and at most one engine session, runs the
//! stopped/playing/paused state machine and feeds the event dispatcher.
//!
//! ## Locking
//! Every command and every engine callback takes the single state mutex for its
//! full duration, and events are emitted while it is held. Multi-step operations
//! (`next` = advance + stop + play, error recovery, end-of-stream advance) are
//! therefore atomic with respect to every other command and callback.
//!
//! ## Stale callbacks
//! Each session gets a fresh [`SessionId`]. Engine notifications carrying any id
//! other than the live session's are dropped, so a late end-of-stream from a
//! session a command already replaced cannot skip a track.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use anyhow::{Context, Result};
use jukebox_types::{MediaItem, PlaybackState, PlayerEvent, PlaylistChange};

use crate::dispatcher::{Dispatcher, ObserverId, PlayerObserver};
use crate::engine::{
    EngineListener, EngineSession, EngineState, PlaybackEngine, SessionCallbacks, SessionId,
};
use crate::playlist::Playlist;

/// Cloneable handle to the shared player.
#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    engine: Arc<dyn PlaybackEngine>,
    dispatcher: Dispatcher,
    state: Mutex<PlayerState>,
    session_ids: AtomicU64,
    me: Weak<PlayerInner>,
}

#[derive(Default)]
struct PlayerState {
    playlist: Playlist,
    session: Option<ActiveSession>,
    playback: PlaybackState,
    shut_down: bool,
}

struct ActiveSession {
    id: SessionId,
    item: MediaItem,
    handle: Box<dyn EngineSession>,
}

impl Player {
    /// Initialize `engine` and create an idle player with an empty playlist.
    pub fn new(engine: Arc<dyn PlaybackEngine>) -> Result<Self> {
        engine.init().context("init playback engine")?;
        let inner = Arc::new_cyclic(|me| PlayerInner {
            engine,
            dispatcher: Dispatcher::new(),
            state: Mutex::new(PlayerState::default()),
            session_ids: AtomicU64::new(0),
            me: me.clone(),
        });
        Ok(Self { inner })
    }

    /// Start or resume playback of the current playlist item.
    pub fn play(&self) {
        let mut st = self.inner.lock();
        if self.inner.rejected(&st, "play") {
            return;
        }
        self.inner.play_locked(&mut st);
    }

    pub fn pause(&self) {
        let mut st = self.inner.lock();
        if self.inner.rejected(&st, "pause") {
            return;
        }
        self.inner.pause_locked(&mut st);
    }

    pub fn stop(&self) {
        let mut st = self.inner.lock();
        if self.inner.rejected(&st, "stop") {
            return;
        }
        self.inner.stop_locked(&mut st);
    }

    /// Skip to the next item and play it. No-op at the end of the playlist.
    pub fn next(&self) {
        let mut st = self.inner.lock();
        if self.inner.rejected(&st, "next") {
            return;
        }
        self.inner.next_locked(&mut st);
    }

    /// Go back to the previous item and play it. No-op at the start.
    pub fn previous(&self) {
        let mut st = self.inner.lock();
        if self.inner.rejected(&st, "previous") {
            return;
        }
        if st.playlist.previous() {
            self.inner.emit_playlist(&st, PlaylistChange::Retreated);
            self.inner.restart_locked(&mut st);
        }
    }

    /// Replace the playlist. A live session keeps playing its item.
    pub fn set_playlist(&self, items: Vec<MediaItem>) {
        let mut st = self.inner.lock();
        if self.inner.rejected(&st, "set_playlist") {
            return;
        }
        st.playlist.set(items);
        tracing::info!(
            items = st.playlist.len(),
            cursor = st.playlist.cursor_index(),
            "playlist replaced"
        );
        self.inner.emit_playlist(&st, PlaylistChange::Replaced);
    }

    /// Stop playback and release the engine subsystem. Terminal.
    pub fn shutdown(&self) {
        let mut st = self.inner.lock();
        if st.shut_down {
            return;
        }
        self.inner.stop_locked(&mut st);
        self.inner.engine.shutdown();
        st.shut_down = true;
        tracing::info!("player shut down");
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().playback
    }

    /// Read-only copy of the playlist.
    pub fn playlist(&self) -> Playlist {
        self.inner.lock().playlist.clone()
    }

    /// Item bound to the live session, if any.
    pub fn current_item(&self) -> Option<MediaItem> {
        self.inner.lock().session.as_ref().map(|s| s.item.clone())
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.inner.lock().session.as_ref().map(|s| s.id)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().shut_down
    }

    pub fn add_observer(&self, observer: Arc<dyn PlayerObserver>) -> ObserverId {
        self.inner.dispatcher.add_observer(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.inner.dispatcher.remove_observer(id)
    }
}

impl PlayerInner {
    fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("player state lock poisoned; continuing with inner state");
            PoisonError::into_inner(poisoned)
        })
    }

    fn rejected(&self, st: &PlayerState, command: &'static str) -> bool {
        if st.shut_down {
            tracing::warn!(command, "command ignored after shutdown");
        }
        st.shut_down
    }

    fn emit(&self, event: PlayerEvent) {
        self.dispatcher.emit(&event);
    }

    fn emit_playlist(&self, st: &PlayerState, change: PlaylistChange) {
        self.emit(PlayerEvent::PlaylistChanged {
            change,
            cursor: st.playlist.cursor(),
        });
    }

    fn set_playback(&self, st: &mut PlayerState, state: PlaybackState) {
        if st.playback != state {
            st.playback = state;
            tracing::info!(state = %state, "playback state changed");
            self.emit(PlayerEvent::state_changed(state));
        }
    }

    fn is_live(&self, st: &PlayerState, session: SessionId, callback: &'static str) -> bool {
        let live = st.session.as_ref().is_some_and(|s| s.id == session);
        if !live {
            tracing::debug!(session, callback, "ignoring callback from stale session");
        }
        live
    }

    fn create_session(&self, item: &MediaItem) -> Result<ActiveSession> {
        let id = self.session_ids.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        let listener: Weak<dyn EngineListener> = self.me.clone();
        let handle = self
            .engine
            .create(item, SessionCallbacks::new(id, listener))
            .with_context(|| format!("create session for {}", item.id))?;
        tracing::debug!(session = id, item = %item.id, "engine session created");
        Ok(ActiveSession {
            id,
            item: item.clone(),
            handle,
        })
    }

    /// Drop the live session and publish `Stopped`.
    fn release_session(&self, st: &mut PlayerState) {
        if let Some(session) = st.session.take() {
            tracing::debug!(session = session.id, item = %session.item.id, "engine session released");
        }
        st.playback = PlaybackState::Stopped;
        self.emit(PlayerEvent::state_changed(PlaybackState::Stopped));
    }

    /// Command play on the live session; a failure is fatal for the session.
    fn start_session(&self, st: &mut PlayerState) {
        let Some(session) = st.session.as_mut() else {
            return;
        };
        match session.handle.play() {
            Ok(()) => self.set_playback(st, PlaybackState::Playing),
            Err(e) => {
                tracing::warn!(session = session.id, error = %e, "engine play failed");
                self.release_session(st);
                self.emit(PlayerEvent::error(format!("{e:#}")));
            }
        }
    }

    fn play_locked(&self, st: &mut PlayerState) {
        if st.session.is_none() {
            let Some(item) = st.playlist.current().cloned() else {
                tracing::debug!("play ignored: no current playlist item");
                return;
            };
            match self.create_session(&item) {
                Ok(session) => {
                    tracing::info!(item = %item.id, title = item.display_title(), "new source");
                    st.session = Some(session);
                    self.emit(PlayerEvent::NewSource { item });
                }
                Err(e) => {
                    tracing::warn!(item = %item.id, error = %e, "engine session creation failed");
                    self.emit(PlayerEvent::error(format!("{e:#}")));
                    return;
                }
            }
        }
        self.start_session(st);
    }

    fn pause_locked(&self, st: &mut PlayerState) {
        let Some(session) = st.session.as_mut() else {
            return;
        };
        match session.handle.pause() {
            Ok(()) => self.set_playback(st, PlaybackState::Paused),
            Err(e) => {
                tracing::warn!(session = session.id, error = %e, "engine pause failed");
                self.emit(PlayerEvent::error(format!("{e:#}")));
            }
        }
    }

    fn stop_locked(&self, st: &mut PlayerState) {
        let Some(session) = st.session.as_mut() else {
            return;
        };
        let result = session.handle.stop();
        self.release_session(st);
        if let Err(e) = result {
            tracing::warn!(error = %e, "engine stop failed");
            self.emit(PlayerEvent::error(format!("{e:#}")));
        }
    }

    fn restart_locked(&self, st: &mut PlayerState) {
        self.stop_locked(st);
        self.play_locked(st);
    }

    fn next_locked(&self, st: &mut PlayerState) -> bool {
        if !st.playlist.next() {
            return false;
        }
        self.emit_playlist(st, PlaylistChange::Advanced);
        self.restart_locked(st);
        true
    }
}

impl EngineListener for PlayerInner {
    fn on_state_changed(&self, session: SessionId, state: EngineState) {
        let st = self.lock();
        if self.is_live(&st, session, "state_changed") {
            tracing::debug!(session, engine_state = ?state, player_state = %st.playback, "engine state");
        }
    }

    fn on_error(&self, session: SessionId, message: String) {
        let mut st = self.lock();
        if !self.is_live(&st, session, "error") {
            return;
        }
        let Some(faulted) = st.session.take() else {
            return;
        };
        if faulted.handle.error_recovery_allowed() {
            tracing::warn!(session, item = %faulted.item.id, error = %message, "engine fault; recreating session");
            let item = faulted.item.clone();
            drop(faulted);
            match self.create_session(&item) {
                Ok(fresh) => {
                    st.session = Some(fresh);
                    self.start_session(&mut st);
                }
                Err(e) => {
                    tracing::warn!(item = %item.id, error = %e, "session recreation failed");
                    self.release_session(&mut st);
                    self.emit(PlayerEvent::error(format!("{e:#}")));
                }
            }
        } else {
            tracing::warn!(session, item = %faulted.item.id, error = %message, "fatal engine fault; stopping");
            st.session = Some(faulted);
            self.stop_locked(&mut st);
        }
        self.emit(PlayerEvent::error(message));
    }

    fn on_tag(&self, session: SessionId, key: String, value: String) {
        let st = self.lock();
        if self.is_live(&st, session, "tag") {
            self.emit(PlayerEvent::Tag { key, value });
        }
    }

    fn on_end_of_stream(&self, session: SessionId) {
        let mut st = self.lock();
        if !self.is_live(&st, session, "end_of_stream") {
            return;
        }
        tracing::info!(session, "end of stream");
        self.release_session(&mut st);
        if !self.next_locked(&mut st) {
            tracing::info!("end of playlist reached");
        }
    }
}
