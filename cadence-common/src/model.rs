//! Core data model: tenant/principal identifiers, playable items, loop modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an independent tenant (a guild/server).
///
/// Each tenant owns its own queue, session state, and vote tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(u64);

impl TenantId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an acting user (command author, voter, requester).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(u64);

impl PrincipalId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short-lived URI granting direct audio access.
///
/// Locators expire a bounded time after resolution and are never persisted;
/// note the deliberate absence of serde derives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLocator {
    pub uri: String,
}

impl StreamLocator {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// A track as it sits in a tenant's queue.
///
/// `locator` is present only when the item was freshly resolved; items
/// restored from the database carry `None` and are lazily re-resolved via
/// their `stable_id` just before playback.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableItem {
    /// Stable source URL. May be absent for ephemeral search results, in
    /// which case the item cannot be re-resolved once its locator expires.
    pub stable_id: Option<String>,
    pub title: String,
    pub thumbnail: Option<String>,
    /// Duration in seconds, when the catalog reports one.
    pub duration: Option<u64>,
    pub uploader: Option<String>,
    pub requester: PrincipalId,
    pub locator: Option<StreamLocator>,
}

impl PlayableItem {
    /// Strip the item down to its durable fields for persistence.
    pub fn to_stored(&self) -> StoredItem {
        StoredItem {
            stable_id: self.stable_id.clone(),
            title: self.title.clone(),
            thumbnail: self.thumbnail.clone(),
            duration: self.duration,
            uploader: self.uploader.clone(),
            requester_id: self.requester,
        }
    }
}

/// The durable shape of a queued item.
///
/// This is what the `queues` table stores: metadata only, never the raw
/// resolver payload and never a stream locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub stable_id: Option<String>,
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration: Option<u64>,
    pub uploader: Option<String>,
    pub requester_id: PrincipalId,
}

impl From<StoredItem> for PlayableItem {
    fn from(stored: StoredItem) -> Self {
        Self {
            stable_id: stored.stable_id,
            title: stored.title,
            thumbnail: stored.thumbnail,
            duration: stored.duration,
            uploader: stored.uploader,
            requester: stored.requester_id,
            locator: None,
        }
    }
}

/// What happens to a track when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Finished tracks go to history only.
    #[default]
    Off,
    /// The finished track is reinserted at the front of the queue.
    Song,
    /// The finished track is appended at the back of the queue.
    Queue,
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopMode::Off => "off",
            LoopMode::Song => "song",
            LoopMode::Queue => "queue",
        };
        f.write_str(s)
    }
}

impl FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(LoopMode::Off),
            "song" => Ok(LoopMode::Song),
            "queue" => Ok(LoopMode::Queue),
            other => Err(other.to_string()),
        }
    }
}

/// The vote-gated session actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Skip,
    Pause,
    Stop,
    Shuffle,
    Remove,
    Clear,
    Disconnect,
    Loop,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Skip => "skip",
            ActionKind::Pause => "pause",
            ActionKind::Stop => "stop",
            ActionKind::Shuffle => "shuffle",
            ActionKind::Remove => "remove",
            ActionKind::Clear => "clear",
            ActionKind::Disconnect => "disconnect",
            ActionKind::Loop => "loop",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_item_roundtrip_drops_locator() {
        let item = PlayableItem {
            stable_id: Some("https://example.com/watch?v=abc".into()),
            title: "A Song".into(),
            thumbnail: None,
            duration: Some(241),
            uploader: Some("Someone".into()),
            requester: PrincipalId::new(42),
            locator: Some(StreamLocator::new("https://cdn.example.com/abc.opus")),
        };

        let restored: PlayableItem = item.to_stored().into();
        assert_eq!(restored.stable_id, item.stable_id);
        assert_eq!(restored.title, item.title);
        assert_eq!(restored.duration, item.duration);
        assert_eq!(restored.uploader, item.uploader);
        assert_eq!(restored.requester, item.requester);
        assert!(restored.locator.is_none());
    }

    #[test]
    fn stored_item_serde() {
        let stored = StoredItem {
            stable_id: None,
            title: "Ephemeral".into(),
            thumbnail: Some("https://i.example.com/t.jpg".into()),
            duration: None,
            uploader: None,
            requester_id: PrincipalId::new(7),
        };

        let json = serde_json::to_string(&stored).unwrap();
        assert!(json.contains("\"requester_id\":7"));
        let back: StoredItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stored);
    }

    #[test]
    fn loop_mode_parsing() {
        assert_eq!("song".parse::<LoopMode>().unwrap(), LoopMode::Song);
        assert_eq!("QUEUE".parse::<LoopMode>().unwrap(), LoopMode::Queue);
        assert_eq!("off".parse::<LoopMode>().unwrap(), LoopMode::Off);
        assert!("forever".parse::<LoopMode>().is_err());
        assert_eq!(LoopMode::default(), LoopMode::Off);
    }
}
