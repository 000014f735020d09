//! Error types for the simulation core.
//!
//! Simulation-level failures (a command that cannot be carried out) are
//! values of [`crate::command::CommandCost`], not errors. The types here cover
//! the exceptional cases: malformed state, unreadable settings, bad snapshots.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for exceptional core failures.
#[derive(Debug, Error)]
pub enum GameError {
    /// A pool has no room for another item.
    #[error("Pool '{0}' is full")]
    PoolFull(&'static str),

    /// Settings or data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or source name) of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Desync detected in multiplayer.
    #[error("Desync detected at frame {frame}: local hash {local_hash}, remote hash {remote_hash}")]
    DesyncDetected {
        /// Frame where desync occurred.
        frame: u32,
        /// Local world hash.
        local_hash: u64,
        /// Remote world hash.
        remote_hash: u64,
    },
}
