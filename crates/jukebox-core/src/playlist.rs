//! Ordered playlist with a cursor.
//!
//! Pure data: no locking and no event emission. The [`crate::player::Player`]
//! owns the only instance, mutates it under its lock, and reports changes.

use jukebox_types::MediaItem;

/// Ordered sequence of items plus the index of the current one.
///
/// Invariant: `cursor` is `None` exactly when `items` is empty, otherwise it is
/// a valid index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Playlist {
    items: Vec<MediaItem>,
    cursor: Option<usize>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<MediaItem>) -> Self {
        let mut playlist = Self::new();
        playlist.set(items);
        playlist
    }

    /// Replace the whole sequence and reset the cursor to the first item.
    ///
    /// Returns the new cursor.
    pub fn set(&mut self, items: Vec<MediaItem>) -> Option<usize> {
        self.cursor = if items.is_empty() { None } else { Some(0) };
        self.items = items;
        self.cursor
    }

    /// Move to the next item. Never wraps; returns `false` at the end.
    pub fn next(&mut self) -> bool {
        match self.cursor {
            Some(idx) if idx + 1 < self.items.len() => {
                self.cursor = Some(idx + 1);
                true
            }
            _ => false,
        }
    }

    /// Move to the previous item. Never wraps; returns `false` at the start.
    pub fn previous(&mut self) -> bool {
        match self.cursor {
            Some(idx) if idx > 0 => {
                self.cursor = Some(idx - 1);
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&MediaItem> {
        self.cursor.and_then(|idx| self.items.get(idx))
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Cursor as a signed index, `-1` when the playlist is empty.
    pub fn cursor_index(&self) -> isize {
        self.cursor.map_or(-1, |idx| idx as isize)
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(ids: &[&str]) -> Vec<MediaItem> {
        ids.iter()
            .map(|id| MediaItem::new(*id, id.to_uppercase()))
            .collect()
    }

    fn assert_cursor_invariant(playlist: &Playlist) {
        match playlist.cursor() {
            None => assert!(playlist.is_empty()),
            Some(idx) => assert!(idx < playlist.len()),
        }
    }

    #[test]
    fn empty_playlist_has_no_current() {
        let playlist = Playlist::new();
        assert_eq!(playlist.cursor(), None);
        assert_eq!(playlist.cursor_index(), -1);
        assert!(playlist.current().is_none());
    }

    #[test]
    fn set_resets_cursor_to_first_item() {
        let mut playlist = Playlist::new();
        assert_eq!(playlist.set(items(&["a", "b", "c"])), Some(0));
        assert_eq!(playlist.current().map(|i| i.id.as_str()), Some("a"));

        playlist.next();
        playlist.next();
        assert_eq!(playlist.set(items(&["x"])), Some(0));
        assert_eq!(playlist.current().map(|i| i.id.as_str()), Some("x"));

        assert_eq!(playlist.set(Vec::new()), None);
        assert_eq!(playlist.cursor_index(), -1);
    }

    #[test]
    fn next_stops_at_last_item() {
        let mut playlist = Playlist::from_items(items(&["a", "b"]));
        assert!(playlist.next());
        assert_eq!(playlist.cursor(), Some(1));
        assert!(!playlist.next());
        assert_eq!(playlist.cursor(), Some(1));
        assert_eq!(playlist.current().map(|i| i.id.as_str()), Some("b"));
    }

    #[test]
    fn previous_stops_at_first_item() {
        let mut playlist = Playlist::from_items(items(&["a", "b"]));
        assert!(!playlist.previous());
        assert_eq!(playlist.cursor(), Some(0));
        playlist.next();
        assert!(playlist.previous());
        assert_eq!(playlist.cursor(), Some(0));
    }

    #[test]
    fn navigation_on_empty_playlist_is_noop() {
        let mut playlist = Playlist::new();
        assert!(!playlist.next());
        assert!(!playlist.previous());
        assert_eq!(playlist.cursor(), None);
    }

    #[test]
    fn cursor_stays_in_bounds_for_any_walk() {
        let mut playlist = Playlist::from_items(items(&["a", "b", "c"]));
        let walk = [true, true, true, true, false, false, false, false, true];
        for forward in walk {
            if forward {
                playlist.next();
            } else {
                playlist.previous();
            }
            assert_cursor_invariant(&playlist);
        }
        assert_eq!(playlist.cursor(), Some(1));
    }
}
