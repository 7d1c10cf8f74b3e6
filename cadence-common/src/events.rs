//! Notification events emitted by the coordinator.
//!
//! The coordinator communicates outward through a broadcast [`EventBus`]:
//! every successful state transition yields one event that the presentation
//! collaborator renders (chat messages, embeds, button refreshes). Events are
//! serde-serializable so they can also be shipped over a wire if the
//! embedding process is split from the renderer.

use crate::model::{ActionKind, LoopMode, PrincipalId, TenantId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// A disconnect action passed (voted or admin bypass).
    Requested,
    /// The inactivity ticker found the session idle past the timeout.
    Inactivity,
    /// The last non-bot listener left the voice channel.
    ChannelEmpty,
}

/// Coordinator notification events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// A new track started playing.
    NowPlaying {
        tenant: TenantId,
        title: String,
        stable_id: Option<String>,
        uploader: Option<String>,
        duration: Option<u64>,
        requester: PrincipalId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The queue drained; the session is idle until something is enqueued.
    QueueFinished {
        tenant: TenantId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An item could not be resolved to a stream and was discarded.
    ///
    /// Emitted once per discarded item; playback continues with the next one.
    TrackUnplayable {
        tenant: TenantId,
        title: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A vote was recorded but the threshold has not been reached yet.
    VoteProgress {
        tenant: TenantId,
        action: ActionKind,
        count: usize,
        required: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A vote reached its threshold and the guarded action was applied.
    VotePassed {
        tenant: TenantId,
        action: ActionKind,
        count: usize,
        required: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback paused.
    Paused {
        tenant: TenantId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback resumed.
    Resumed {
        tenant: TenantId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback stopped and the queue was cleared.
    Stopped {
        tenant: TenantId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The session was torn down and the voice connection closed.
    Disconnected {
        tenant: TenantId,
        reason: DisconnectReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The tenant's volume setting changed.
    VolumeChanged {
        tenant: TenantId,
        volume: u16,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The tenant's loop mode changed.
    LoopModeChanged {
        tenant: TenantId,
        mode: LoopMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The queue contents changed (enqueue, remove, shuffle, clear).
    QueueChanged {
        tenant: TenantId,
        len: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// The tenant this event concerns.
    pub fn tenant(&self) -> TenantId {
        match self {
            PlayerEvent::NowPlaying { tenant, .. }
            | PlayerEvent::QueueFinished { tenant, .. }
            | PlayerEvent::TrackUnplayable { tenant, .. }
            | PlayerEvent::VoteProgress { tenant, .. }
            | PlayerEvent::VotePassed { tenant, .. }
            | PlayerEvent::Paused { tenant, .. }
            | PlayerEvent::Resumed { tenant, .. }
            | PlayerEvent::Stopped { tenant, .. }
            | PlayerEvent::Disconnected { tenant, .. }
            | PlayerEvent::VolumeChanged { tenant, .. }
            | PlayerEvent::LoopModeChanged { tenant, .. }
            | PlayerEvent::QueueChanged { tenant, .. } => *tenant,
        }
    }
}

/// One-to-many event broadcaster backed by `tokio::sync::broadcast`.
///
/// Subscribers that lag past the channel capacity lose the oldest events;
/// notifications are advisory, so that is acceptable.
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Err` when no subscriber is listening.
    pub fn emit(&self, event: PlayerEvent) -> Result<usize, Box<PlayerEvent>> {
        self.tx
            .send(event)
            .map_err(|broadcast::error::SendError(ev)| Box::new(ev))
    }

    /// Emit an event, ignoring the absence of subscribers.
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample_event() -> PlayerEvent {
        PlayerEvent::QueueFinished {
            tenant: TenantId::new(1),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert!(bus.emit(sample_event()).is_err());
        // Lossy emission never fails.
        bus.emit_lossy(sample_event());
    }

    #[tokio::test]
    async fn emit_with_subscriber() {
        let bus = Arc::new(EventBus::new(10));
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(sample_event()).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.tenant(), TenantId::new(1));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&PlayerEvent::VolumeChanged {
            tenant: TenantId::new(9),
            volume: 120,
            timestamp: chrono::Utc::now(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"VolumeChanged\""));
        assert!(json.contains("\"volume\":120"));
    }
}
