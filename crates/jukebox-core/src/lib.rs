//! Playback session control for the jukebox: playlist sequencing, one engine
//! session at a time, and event fan-out to the queued and coalesced consumers.

pub mod dispatcher;
pub mod display;
pub mod engine;
pub mod error;
pub mod event_stream;
pub mod player;
pub mod playlist;

pub use dispatcher::{Dispatcher, ObserverId, PlayerObserver};
pub use display::{DisplayCursor, DisplaySnapshot};
pub use engine::{
    EngineListener, EngineSession, EngineState, PlaybackEngine, SessionCallbacks, SessionId,
};
pub use error::WaitError;
pub use event_stream::EventStream;
pub use player::Player;
pub use playlist::Playlist;
