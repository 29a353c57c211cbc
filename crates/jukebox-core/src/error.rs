//! Failures surfaced by the blocking consumer calls.

use thiserror::Error;

/// Why a blocking wait (`take_next`, `await_update`) gave up.
///
/// Neither variant affects the player or other consumers; the caller decides
/// whether to retry or report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The consumer was closed while (or before) waiting.
    #[error("wait interrupted: consumer closed")]
    Closed,
    /// A producer panicked while holding the consumer lock.
    #[error("wait interrupted: consumer lock poisoned")]
    Poisoned,
}

impl<T> From<std::sync::PoisonError<T>> for WaitError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        WaitError::Poisoned
    }
}
