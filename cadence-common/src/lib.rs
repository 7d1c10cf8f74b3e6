//! Shared vocabulary for the cadence playback coordinator.
//!
//! Types in this crate are used both by the coordinator core
//! (`cadence-player`) and by presentation-layer collaborators that subscribe
//! to its event stream.

pub mod events;
pub mod model;

pub use events::{DisconnectReason, EventBus, PlayerEvent};
pub use model::{
    ActionKind, LoopMode, PlayableItem, PrincipalId, StoredItem, StreamLocator, TenantId,
};
