//! Operational transform engine for tandem documents.
//!
//! The model is a single splice per operation: delete `deleted` characters
//! at `pos`, then insert `inserted` there. The server owns the canonical
//! document; concurrent operations are rebased against the committed log
//! with [`transform`] before they are applied, so every client that replays
//! the committed sequence in order converges to the same text.

pub mod document;
pub mod error;
pub mod operation;

pub use document::{Committed, Document};
pub use error::OtError;
pub use operation::{OpKind, Operation, Revision, transform};

/// Convenience alias for fallible engine calls.
pub type Result<T> = std::result::Result<T, OtError>;
