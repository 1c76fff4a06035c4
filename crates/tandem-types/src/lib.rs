//! Shared identifiers, session records, and wire protocol types for tandem.
//!
//! This crate is the relational foundation: typed IDs, session birth
//! certificates, the client/server message vocabulary, and the error
//! taxonomy. It has **no internal tandem dependencies**: a pure leaf crate
//! that other crates build on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Room (RoomId) ← one shared document + its participants
//!     └── owns Document (revision + committed-op log, see tandem-ot)
//!     └── owns ChatMessage log (append-only)
//!     └── tracks presence per SessionId
//!
//! Session (SessionId) ← one live connection
//!     └── belongs to exactly one Room
//!     └── carries a ClientId (stamped on every edit operation)
//!     └── posts ChatMessage (MessageId)
//! ```

pub mod error;
pub mod ids;
pub mod protocol;
pub mod session;

// Re-export primary types at crate root for convenience.
pub use error::{ErrorKind, SyncError};
pub use ids::{ClientId, MessageId, RoomId, SessionId};
pub use protocol::{
    ChatMessage, ClientMessage, EditOp, OpBody, PresenceDelta, PresenceEntry, RemoteOp,
    SelectionRange, ServerMessage,
};
pub use session::{COLOR_PALETTE, Session, color_for};

/// Current time as Unix milliseconds. Used by constructors throughout
/// the workspace.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
