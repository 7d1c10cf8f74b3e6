//! Per-tenant session state
//!
//! One [`TenantSession`] per tenant, owned by the coordinator behind a
//! `tokio::sync::Mutex`. Everything that must transition atomically lives
//! here: the state machine position, the active track, the queue, loop mode,
//! history, vote tallies, and the inactivity mark. All mutation happens with
//! the session lock held, which is the per-tenant serialization domain.

use crate::history::History;
use crate::queue::TenantQueue;
use crate::votes::VoteLedger;
use cadence_common::{LoopMode, PlayableItem, StoredItem};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Playback state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No active track. A voice connection may or may not exist.
    Idle,
    Playing,
    Paused,
    /// Between track end and next track start.
    Transitioning,
}

/// The track currently occupying the session.
#[derive(Debug, Clone)]
pub struct ActiveTrack {
    pub item: PlayableItem,
    /// Sequence number issued when this track was started. Completion
    /// signals carrying any other number are stale and dropped.
    pub seq: u64,
    pub started_at: Instant,
}

impl ActiveTrack {
    /// Seconds played so far, clamped to the item duration when known.
    pub fn elapsed_secs(&self) -> u64 {
        let elapsed = self.started_at.elapsed().as_secs();
        match self.item.duration {
            Some(duration) => elapsed.min(duration),
            None => elapsed,
        }
    }
}

#[derive(Debug)]
pub(crate) struct TenantSession {
    pub state: SessionState,
    pub current: Option<ActiveTrack>,
    pub queue: TenantQueue,
    pub loop_mode: LoopMode,
    pub history: History,
    pub votes: VoteLedger,
    /// Cached volume (percent), loaded from settings on session creation.
    pub volume: u16,
    /// Set when the session goes quiet (idle queue, pause); cleared when a
    /// track starts or playback resumes. Sampled by the inactivity ticker.
    pub inactive_since: Option<Instant>,
    /// Last issued track sequence number.
    track_seq: u64,
}

impl TenantSession {
    pub fn new(stored_queue: Vec<StoredItem>, volume: u16, history_capacity: usize) -> Self {
        Self {
            state: SessionState::Idle,
            current: None,
            queue: TenantQueue::from_stored(stored_queue),
            loop_mode: LoopMode::Off,
            history: History::new(history_capacity),
            votes: VoteLedger::new(),
            volume,
            inactive_since: None,
            track_seq: 0,
        }
    }

    /// Issue the sequence number for the next started track.
    pub fn next_seq(&mut self) -> u64 {
        self.track_seq += 1;
        self.track_seq
    }

    /// Whether a completion signal refers to something other than the
    /// currently active track.
    pub fn is_stale(&self, seq: u64) -> bool {
        self.current.as_ref().map(|active| active.seq) != Some(seq)
    }

    pub fn mark_inactive(&mut self) {
        self.inactive_since = Some(Instant::now());
    }

    pub fn clear_inactive(&mut self) {
        self.inactive_since = None;
    }

    /// Whether the session has been quiet longer than `timeout`.
    pub fn inactive_for(&self, timeout: Duration) -> bool {
        self.state != SessionState::Playing
            && self
                .inactive_since
                .is_some_and(|since| since.elapsed() >= timeout)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Playing | SessionState::Paused)
    }
}
