//! The error taxonomy surfaced to clients.
//!
//! Every error a client can see maps to one of these variants. The wire form
//! is a `(kind, detail)` pair: `kind` is the stable machine-readable string,
//! `detail` is human-readable and free to change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::RoomId;

/// Stable wire-level error kinds.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr, strum::EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ErrorKind {
    /// Malformed or out-of-range message. Connection-local; no shared state
    /// was mutated.
    Protocol,
    /// The requested room does not exist (only under `RequireExisting` join
    /// policy).
    UnknownRoom,
    /// An operation's base revision is newer than the document, a protocol
    /// violation; the session is dropped.
    StaleOperation,
    /// An execution/AI collaborator did not respond in time.
    UpstreamTimeout,
    /// An execution/AI collaborator returned an error.
    UpstreamFailure,
}

impl ErrorKind {
    /// Kinds that end the connection after delivery.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::StaleOperation)
    }
}

/// Errors reported to a single session.
#[derive(Clone, Debug, Error)]
pub enum SyncError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown room: {0}")]
    UnknownRoom(RoomId),

    #[error("stale operation: base revision {base} is ahead of document revision {current}")]
    StaleOperation { base: u64, current: u64 },

    #[error("upstream timed out after {timeout_ms}ms")]
    UpstreamTimeout { timeout_ms: u64 },

    #[error("upstream failure: {0}")]
    UpstreamFailure(String),
}

impl SyncError {
    /// The stable wire kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Protocol(_) => ErrorKind::Protocol,
            SyncError::UnknownRoom(_) => ErrorKind::UnknownRoom,
            SyncError::StaleOperation { .. } => ErrorKind::StaleOperation,
            SyncError::UpstreamTimeout { .. } => ErrorKind::UpstreamTimeout,
            SyncError::UpstreamFailure(_) => ErrorKind::UpstreamFailure,
        }
    }

    /// True if the session should be disconnected after receiving this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::StaleOperation { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
