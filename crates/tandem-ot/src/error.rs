//! Error types for document operations.

use thiserror::Error;

/// Errors that can occur while applying an operation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OtError {
    /// The operation references a revision the document hasn't reached.
    ///
    /// A client can only compose against revisions it has seen, so this
    /// indicates a protocol bug on the sender's side.
    #[error("stale operation: base revision {base} is ahead of document revision {current}")]
    StaleOperation { base: u64, current: u64 },

    /// Operation position (or position + deletion span) out of bounds.
    #[error("position {pos} out of bounds for document with length {len}")]
    PositionOutOfBounds { pos: usize, len: usize },
}
