//! Normalized action requests and structured replies
//!
//! User gestures reach the coordinator from two origins — prefix commands and
//! button interactions — normalized by the presentation layer into one
//! [`ActionRequest`] shape. The coordinator is origin-agnostic: every command
//! takes a request and yields exactly one structured [`Reply`] (or an error),
//! which the presentation layer renders however its origin demands.

use crate::session::ActiveTrack;
use cadence_common::{ActionKind, LoopMode, PlayableItem, PrincipalId, StoredItem, TenantId};

/// Where a gesture came from. Carried for logging; command semantics never
/// depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOrigin {
    Command,
    Button,
}

/// A normalized user gesture.
#[derive(Debug, Clone, Copy)]
pub struct ActionRequest {
    pub tenant: TenantId,
    pub principal: PrincipalId,
    /// Whether the principal is a privileged administrator of the tenant.
    /// Authentication is the embedder's problem; this is its verdict.
    pub is_admin: bool,
    pub origin: ActionOrigin,
}

impl ActionRequest {
    pub fn command(tenant: TenantId, principal: PrincipalId, is_admin: bool) -> Self {
        Self {
            tenant,
            principal,
            is_admin,
            origin: ActionOrigin::Command,
        }
    }

    pub fn button(tenant: TenantId, principal: PrincipalId, is_admin: bool) -> Self {
        Self {
            tenant,
            principal,
            is_admin,
            origin: ActionOrigin::Button,
        }
    }
}

/// Display snapshot of the active track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub title: String,
    pub stable_id: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<u64>,
    pub uploader: Option<String>,
    pub requester: PrincipalId,
    /// Seconds played so far, clamped to the duration when known.
    pub elapsed_secs: u64,
}

impl TrackInfo {
    pub(crate) fn from_active(active: &ActiveTrack) -> Self {
        Self::new(&active.item, active.elapsed_secs())
    }

    fn new(item: &PlayableItem, elapsed_secs: u64) -> Self {
        Self {
            title: item.title.clone(),
            stable_id: item.stable_id.clone(),
            thumbnail: item.thumbnail.clone(),
            duration: item.duration,
            uploader: item.uploader.clone(),
            requester: item.requester,
            elapsed_secs,
        }
    }
}

/// Display snapshot of the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueView {
    pub now_playing: Option<TrackInfo>,
    pub upcoming: Vec<StoredItem>,
    pub loop_mode: LoopMode,
}

/// Structured outcome of a command. Exactly one per command invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Playback started with this track.
    NowPlaying(TrackInfo),
    /// The item was appended behind an already-active session.
    Added { title: String },
    /// Playlist intake finished; this many items were enqueued.
    AddedMany { count: usize },
    Resumed,
    Paused,
    Skipped,
    /// Playback stopped, queue cleared.
    Stopped,
    /// History rewound; the previous track is restarting.
    Previous,
    Shuffled,
    Removed { title: String },
    Cleared,
    Disconnected,
    LoopSet { mode: LoopMode },
    /// Current or newly set volume.
    Volume { volume: u16, changed: bool },
    Queue(QueueView),
    /// Vote recorded, threshold not reached.
    VoteProgress {
        action: ActionKind,
        count: usize,
        required: usize,
    },
    /// This principal already voted for this action.
    AlreadyVoted { action: ActionKind },
}
