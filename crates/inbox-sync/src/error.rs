//! Engine-wide error types.

use thiserror::Error;

/// Engine-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Commit operations that can fail and roll back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CommitOp {
    MarkRead,
    MarkAllRead,
    Delete,
}

/// Engine-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The initial fetch could not complete. The store stays empty; the
    /// consumer decides whether to retry.
    #[error("Initial fetch failed: {0}")]
    FetchFailure(String),

    /// An optimistic mutation's server confirmation failed. The local
    /// rollback has already been applied when this is returned.
    #[error("Commit failed for {op}: {reason}")]
    CommitFailure { op: CommitOp, reason: String },

    /// The feed subscription dropped. Not fatal; last-known state keeps
    /// serving until the channel is re-established.
    #[error("Feed channel disconnected: {0}")]
    ChannelDisconnect(String),

    /// Operation referenced a notification the store has never seen.
    #[error("Notification not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::FetchFailure(msg.into())
    }

    pub fn commit(op: CommitOp, reason: impl std::fmt::Display) -> Self {
        Self::CommitFailure {
            op,
            reason: reason.to_string(),
        }
    }

    pub fn disconnect(msg: impl Into<String>) -> Self {
        Self::ChannelDisconnect(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }
}
