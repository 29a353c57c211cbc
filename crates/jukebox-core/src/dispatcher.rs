//! Observer registry and synchronous event fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use jukebox_types::PlayerEvent;

/// Capability of receiving player events.
///
/// Called on the emitting thread while the player lock is held: implementations
/// must do bounded, non-blocking work and must not call back into the player.
pub trait PlayerObserver: Send + Sync {
    fn on_event(&self, event: &PlayerEvent);
}

/// Handle returned on registration, used to deregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registry of observers with synchronous broadcast.
#[derive(Default)]
pub struct Dispatcher {
    observers: Mutex<Vec<(ObserverId, Arc<dyn PlayerObserver>)>>,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&self, observer: Arc<dyn PlayerObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry().push((id, observer));
        tracing::debug!(observer = id.0, "observer registered");
        id
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.registry();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        let removed = observers.len() != before;
        if removed {
            tracing::debug!(observer = id.0, "observer removed");
        }
        removed
    }

    pub fn observer_count(&self) -> usize {
        self.registry().len()
    }

    /// Deliver `event` to every registered observer on the calling thread.
    ///
    /// The registry is snapshotted first, so observers may (de)register while
    /// being notified; changes apply from the next event on.
    pub fn emit(&self, event: &PlayerEvent) {
        let observers: Vec<Arc<dyn PlayerObserver>> = self
            .registry()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        tracing::trace!(kind = event.kind(), observers = observers.len(), "emit");
        for observer in observers {
            observer.on_event(event);
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Vec<(ObserverId, Arc<dyn PlayerObserver>)>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
