//! Playback engine collaborator contract.
//!
//! The engine is a black box that turns one [`MediaItem`] into a live session and
//! reports back on its own thread. Implementations translate these calls into a
//! concrete backend; the player only sees the traits below.

use std::sync::{Arc, Weak};

use anyhow::Result;
use jukebox_types::MediaItem;

/// Identifier of one engine session, unique for the lifetime of a player.
pub type SessionId = u64;

/// State reported by the engine itself through `state_changed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Ready,
    Playing,
    Paused,
    Stopped,
}

/// Process-wide playback engine.
pub trait PlaybackEngine: Send + Sync {
    /// Initialize the engine subsystem. Called once before any session exists.
    fn init(&self) -> Result<()>;

    /// Create a session bound to `item`.
    ///
    /// The engine must deliver every asynchronous notification for this session
    /// through `callbacks`, from its own thread, until the session is dropped.
    fn create(&self, item: &MediaItem, callbacks: SessionCallbacks)
    -> Result<Box<dyn EngineSession>>;

    /// Release the engine subsystem. No sessions are alive when this is called.
    fn shutdown(&self);
}

/// Live, resource-holding handle bound to exactly one item.
///
/// Dropping the session releases it. Commands must not wait on the engine's
/// callback thread: the player holds its lock while issuing them.
pub trait EngineSession: Send {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    /// Whether a fault on this session should be answered by recreating it.
    fn error_recovery_allowed(&self) -> bool;
}

/// Receiver of engine notifications, implemented by the player.
pub trait EngineListener: Send + Sync {
    fn on_state_changed(&self, session: SessionId, state: EngineState);
    fn on_error(&self, session: SessionId, message: String);
    fn on_tag(&self, session: SessionId, key: String, value: String);
    fn on_end_of_stream(&self, session: SessionId);
}

/// Notification handle handed to an engine for one session.
///
/// Holds the listener weakly so an engine thread outliving the player cannot
/// keep it alive; notifications after the player is gone are dropped.
#[derive(Clone)]
pub struct SessionCallbacks {
    session: SessionId,
    listener: Weak<dyn EngineListener>,
}

impl SessionCallbacks {
    pub fn new(session: SessionId, listener: Weak<dyn EngineListener>) -> Self {
        Self { session, listener }
    }

    /// Build callbacks from a strong listener reference (the handle stays weak).
    pub fn for_listener(session: SessionId, listener: &Arc<dyn EngineListener>) -> Self {
        Self::new(session, Arc::downgrade(listener))
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn state_changed(&self, state: EngineState) {
        if let Some(listener) = self.listener.upgrade() {
            listener.on_state_changed(self.session, state);
        }
    }

    pub fn error(&self, message: impl Into<String>) {
        if let Some(listener) = self.listener.upgrade() {
            listener.on_error(self.session, message.into());
        }
    }

    pub fn tag(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Some(listener) = self.listener.upgrade() {
            listener.on_tag(self.session, key.into(), value.into());
        }
    }

    pub fn end_of_stream(&self) {
        if let Some(listener) = self.listener.upgrade() {
            listener.on_end_of_stream(self.session);
        }
    }
}

impl std::fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("session", &self.session)
            .field("listener_alive", &(self.listener.strong_count() > 0))
            .finish()
    }
}
