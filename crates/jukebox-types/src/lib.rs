use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Playable entry placed into a playlist by the library layer.
///
/// Items are immutable once queued; the player only reads them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MediaItem {
    /// Opaque identifier (path, URL, library key).
    pub id: String,
    /// Human-readable title, may be empty.
    #[serde(default)]
    pub title: String,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }

    /// Title shown to clients; falls back to the id when the title is blank.
    pub fn display_title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() { self.id.as_str() } else { title }
    }
}

/// Playback state of the single active session.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No engine session is alive.
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the playlist changed.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistChange {
    /// The whole sequence was replaced.
    Replaced,
    /// The cursor moved forward by one.
    Advanced,
    /// The cursor moved back by one.
    Retreated,
}

/// Playback occurrence fanned out to every registered observer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerEvent {
    StateChanged {
        state: PlaybackState,
    },
    Error {
        message: String,
    },
    /// Stream tag reported by the engine, passed through unchanged.
    Tag {
        key: String,
        value: String,
    },
    /// A session was created for a new item.
    NewSource {
        item: MediaItem,
    },
    PlaylistChanged {
        change: PlaylistChange,
        /// Cursor after the change; `None` when the playlist is empty.
        cursor: Option<usize>,
    },
}

impl PlayerEvent {
    pub fn state_changed(state: PlaybackState) -> Self {
        PlayerEvent::StateChanged { state }
    }

    pub fn error(message: impl Into<String>) -> Self {
        PlayerEvent::Error {
            message: message.into(),
        }
    }

    pub fn tag(key: impl Into<String>, value: impl Into<String>) -> Self {
        PlayerEvent::Tag {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Short event name used in logs and client payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            PlayerEvent::StateChanged { .. } => "state_changed",
            PlayerEvent::Error { .. } => "error",
            PlayerEvent::Tag { .. } => "tag",
            PlayerEvent::NewSource { .. } => "new_source",
            PlayerEvent::PlaylistChanged { .. } => "playlist_changed",
        }
    }
}

/// Coalesced "now playing" key/value data (`artist`, `title`, `source`, ...).
pub type DisplayData = BTreeMap<String, String>;

/// Key under which the display snapshot stores the current item's title.
pub const SOURCE_KEY: &str = "source";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_title_falls_back_to_id() {
        assert_eq!(MediaItem::new("a.flac", "Song").display_title(), "Song");
        assert_eq!(MediaItem::new("a.flac", "  ").display_title(), "a.flac");
        assert_eq!(MediaItem::new("a.flac", "").display_title(), "a.flac");
    }

    #[test]
    fn player_event_serializes_with_kind_tag() {
        let event = PlayerEvent::PlaylistChanged {
            change: PlaylistChange::Advanced,
            cursor: Some(1),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "playlist_changed");
        assert_eq!(json["change"], "advanced");
        assert_eq!(json["cursor"], 1);

        let state = serde_json::to_value(PlayerEvent::state_changed(PlaybackState::Paused)).unwrap();
        assert_eq!(state["kind"], "state_changed");
        assert_eq!(state["state"], "paused");
    }

    #[test]
    fn event_kind_matches_serde_tag() {
        let events = [
            PlayerEvent::state_changed(PlaybackState::Playing),
            PlayerEvent::error("boom"),
            PlayerEvent::tag("artist", "X"),
            PlayerEvent::NewSource {
                item: MediaItem::new("a", "A"),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["kind"], event.kind());
        }
    }
}
