//! # Cadence Player Library (cadence-player)
//!
//! Multi-tenant media playback coordinator.
//!
//! **Purpose:** Maintain one isolated playback session per tenant: an ordered
//! queue, a play/pause/stop state machine, democratic vote-gated controls
//! with privileged bypass, SQLite-persisted queues that survive restarts, and
//! automatic teardown of abandoned sessions.
//!
//! **Architecture:** One [`coordinator::Coordinator`] owns every tenant
//! session behind per-tenant locks. Audio transport and track resolution are
//! trait seams ([`gateway::VoiceGateway`], [`resolver::TrackResolver`])
//! implemented by the embedding process; state changes are announced on the
//! broadcast event bus from `cadence-common`.

pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod gateway;
pub mod history;
pub mod queue;
pub mod request;
pub mod resolver;
pub mod session;
pub mod votes;

pub use config::Config;
pub use coordinator::Coordinator;
pub use error::{Error, Result};
