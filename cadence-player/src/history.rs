//! Finished-track history
//!
//! Bounded ring buffer of finished items per tenant, existing only to serve
//! "play previous": popping the two most recent entries (the track that just
//! finished and the one before it) and re-prepending both. Survives
//! disconnects; capped so it never grows unbounded.

use cadence_common::PlayableItem;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct History {
    entries: VecDeque<PlayableItem>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a finished item, evicting the oldest entry at capacity.
    ///
    /// The stream locator is stripped: by the time an entry is replayed it
    /// would have expired, so "previous" always goes through re-resolution.
    pub fn push(&mut self, mut item: PlayableItem) {
        item.locator = None;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(item);
    }

    /// Take the two most recent entries for "play previous".
    ///
    /// Returns `(previous, just_finished)` in playback order, or None when
    /// fewer than two entries exist (nothing meaningful to go back to).
    pub fn pop_last_two(&mut self) -> Option<(PlayableItem, PlayableItem)> {
        if self.entries.len() < 2 {
            return None;
        }
        let just_finished = self.entries.pop_back()?;
        let previous = self.entries.pop_back()?;
        Some((previous, just_finished))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_common::{PrincipalId, StreamLocator};

    fn item(n: u64) -> PlayableItem {
        PlayableItem {
            stable_id: Some(format!("id-{n}")),
            title: format!("Track {n}"),
            thumbnail: None,
            duration: None,
            uploader: None,
            requester: PrincipalId::new(1),
            locator: Some(StreamLocator::new("https://cdn.example.com/x")),
        }
    }

    #[test]
    fn push_strips_locator() {
        let mut history = History::new(4);
        history.push(item(1));
        assert_eq!(history.len(), 1);

        history.push(item(2));
        let (previous, finished) = history.pop_last_two().unwrap();
        assert!(previous.locator.is_none());
        assert!(finished.locator.is_none());
    }

    #[test]
    fn pop_last_two_orders_and_drains() {
        let mut history = History::new(4);
        history.push(item(1));
        history.push(item(2));
        history.push(item(3));

        let (previous, finished) = history.pop_last_two().unwrap();
        assert_eq!(previous.title, "Track 2");
        assert_eq!(finished.title, "Track 3");
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn needs_two_entries() {
        let mut history = History::new(4);
        assert!(history.pop_last_two().is_none());

        history.push(item(1));
        assert!(history.pop_last_two().is_none());
        // The lone entry was not consumed.
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut history = History::new(3);
        for n in 1..=5 {
            history.push(item(n));
        }
        assert_eq!(history.len(), 3);

        let (previous, finished) = history.pop_last_two().unwrap();
        assert_eq!(previous.title, "Track 4");
        assert_eq!(finished.title, "Track 5");
        // Tracks 1 and 2 were evicted; 3 remains.
        assert_eq!(history.len(), 1);
    }
}
