//! Error types for cadence-player
//!
//! One module-wide error enum using thiserror. Domain rejections (queue
//! empty, index out of range, ...) are ordinary variants that command
//! handlers surface as failed replies; vote progress and duplicate-vote
//! outcomes are NOT errors and live in [`crate::votes::VoteOutcome`].

use thiserror::Error;

/// Main error type for cadence-player
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Queue blob (de)serialization errors
    #[error("Queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog lookup failed or yielded nothing playable
    #[error("Track resolution failed: {0}")]
    Resolution(String),

    /// Voice transport errors
    #[error("Voice gateway error: {0}")]
    Gateway(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The acting principal does not share a voice channel with the session
    #[error("You are not in the session's voice channel")]
    NotInVoiceChannel,

    /// No voice connection exists for the tenant
    #[error("No active voice session")]
    NotConnected,

    /// The queue has no items
    #[error("The queue is empty")]
    QueueEmpty,

    /// A 1-based queue position outside [1, len]
    #[error("Position {index} is out of range (queue has {len} items)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Shuffle requires at least two items
    #[error("The queue is too short to shuffle")]
    TooShortToShuffle,

    /// An action that needs an active track found none
    #[error("Nothing is currently playing")]
    NothingPlaying,

    /// Resume was requested but playback is not paused
    #[error("Playback is not paused")]
    NotPaused,

    /// "Previous" needs at least two history entries
    #[error("Not enough history to go back")]
    NoPrevious,

    /// Unrecognized loop mode keyword
    #[error("Invalid loop mode: {0}")]
    InvalidLoopMode(String),

    /// Volume outside the 0-200 percent range
    #[error("Volume must be between 0 and 200, got {0}")]
    VolumeOutOfRange(u16),
}

/// Convenience Result type using cadence-player Error
pub type Result<T> = std::result::Result<T, Error>;
