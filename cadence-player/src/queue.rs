//! Tenant queue
//!
//! Ordered playlist with FIFO "next" semantics plus front insertion (loop
//! replay, "previous") and 1-based positional removal. Pure data structure;
//! persistence is the coordinator's job, which stages a clone, persists the
//! snapshot, and only then commits it back.

use crate::error::{Error, Result};
use cadence_common::{PlayableItem, StoredItem};
use rand::seq::SliceRandom;

#[derive(Debug, Clone, Default)]
pub struct TenantQueue {
    items: Vec<PlayableItem>,
}

impl TenantQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from persisted items (no locators present).
    pub fn from_stored(stored: Vec<StoredItem>) -> Self {
        Self {
            items: stored.into_iter().map(PlayableItem::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push_back(&mut self, item: PlayableItem) {
        self.items.push(item);
    }

    pub fn insert_front(&mut self, item: PlayableItem) {
        self.items.insert(0, item);
    }

    pub fn pop_front(&mut self) -> Option<PlayableItem> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Look at the item at a 1-based position without removing it.
    pub fn get(&self, position: usize) -> Option<&PlayableItem> {
        position
            .checked_sub(1)
            .and_then(|idx| self.items.get(idx))
    }

    /// Remove the item at a 1-based position.
    ///
    /// Positions outside [1, len] fail with `IndexOutOfRange` and leave the
    /// queue untouched.
    pub fn remove_at(&mut self, position: usize) -> Result<PlayableItem> {
        if position == 0 || position > self.items.len() {
            return Err(Error::IndexOutOfRange {
                index: position,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(position - 1))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Uniform random permutation. Needs at least two items.
    pub fn shuffle(&mut self) -> Result<()> {
        if self.items.len() < 2 {
            return Err(Error::TooShortToShuffle);
        }
        self.items.shuffle(&mut rand::thread_rng());
        Ok(())
    }

    pub fn items(&self) -> &[PlayableItem] {
        &self.items
    }

    /// Durable snapshot for persistence.
    pub fn stored(&self) -> Vec<StoredItem> {
        self.items.iter().map(PlayableItem::to_stored).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_common::{PrincipalId, StreamLocator};

    fn item(n: u64) -> PlayableItem {
        PlayableItem {
            stable_id: Some(format!("https://example.com/watch?v={n}")),
            title: format!("Track {n}"),
            thumbnail: None,
            duration: Some(200),
            uploader: None,
            requester: PrincipalId::new(n),
            locator: Some(StreamLocator::new(format!("https://cdn.example.com/{n}"))),
        }
    }

    #[test]
    fn fifo_order() {
        let mut queue = TenantQueue::new();
        queue.push_back(item(1));
        queue.push_back(item(2));
        queue.push_back(item(3));

        assert_eq!(queue.pop_front().unwrap().title, "Track 1");
        assert_eq!(queue.pop_front().unwrap().title, "Track 2");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn insert_front_jumps_the_line() {
        let mut queue = TenantQueue::new();
        queue.push_back(item(1));
        queue.insert_front(item(2));
        assert_eq!(queue.pop_front().unwrap().title, "Track 2");
    }

    #[test]
    fn remove_at_is_one_based() {
        let mut queue = TenantQueue::new();
        queue.push_back(item(1));
        queue.push_back(item(2));
        queue.push_back(item(3));

        let removed = queue.remove_at(2).unwrap();
        assert_eq!(removed.title, "Track 2");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.items()[1].title, "Track 3");
    }

    #[test]
    fn remove_at_rejects_out_of_range() {
        let mut queue = TenantQueue::new();
        queue.push_back(item(1));

        assert!(matches!(
            queue.remove_at(0),
            Err(Error::IndexOutOfRange { index: 0, len: 1 })
        ));
        assert!(matches!(
            queue.remove_at(2),
            Err(Error::IndexOutOfRange { index: 2, len: 1 })
        ));
        // No mutation on failure.
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn shuffle_needs_two_items() {
        let mut queue = TenantQueue::new();
        assert!(matches!(queue.shuffle(), Err(Error::TooShortToShuffle)));

        queue.push_back(item(1));
        assert!(matches!(queue.shuffle(), Err(Error::TooShortToShuffle)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn shuffle_preserves_contents() {
        let mut queue = TenantQueue::new();
        for n in 1..=8 {
            queue.push_back(item(n));
        }
        queue.shuffle().unwrap();

        let mut titles: Vec<_> = queue.items().iter().map(|i| i.title.clone()).collect();
        titles.sort();
        let expected: Vec<_> = (1..=8).map(|n| format!("Track {n}")).collect();
        assert_eq!(titles, expected);
    }

    #[test]
    fn from_stored_has_no_locators() {
        let stored: Vec<StoredItem> = (1..=3).map(|n| item(n).to_stored()).collect();
        let queue = TenantQueue::from_stored(stored);
        assert_eq!(queue.len(), 3);
        assert!(queue.items().iter().all(|i| i.locator.is_none()));
    }

    #[test]
    fn get_is_one_based() {
        let mut queue = TenantQueue::new();
        queue.push_back(item(1));
        queue.push_back(item(2));

        assert!(queue.get(0).is_none());
        assert_eq!(queue.get(1).unwrap().title, "Track 1");
        assert_eq!(queue.get(2).unwrap().title, "Track 2");
        assert!(queue.get(3).is_none());
    }
}
