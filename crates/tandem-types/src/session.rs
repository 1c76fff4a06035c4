//! Session metadata types.
//!
//! A `Session` records the fact that a client connected to a room. It's a
//! birth certificate; runtime state (cursor, typing flag, outbound channel)
//! lives in the room actor, keyed by `SessionId`.

use serde::{Deserialize, Serialize};

use crate::ids::{ClientId, RoomId, SessionId};

/// Participant colors, assigned round-robin by join order within a room.
pub const COLOR_PALETTE: [&str; 8] = [
    "#e06c75", "#61afef", "#98c379", "#e5c07b",
    "#c678dd", "#56b6c2", "#d19a66", "#abb2bf",
];

/// Pick the palette entry for the nth participant to join a room.
pub fn color_for(join_index: usize) -> &'static str {
    COLOR_PALETTE[join_index % COLOR_PALETTE.len()]
}

/// Birth certificate for a connection session.
///
/// Created when a client joins a room. Immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Globally unique session identifier (UUIDv7, time-ordered).
    pub id: SessionId,
    /// The client identity stamped on this session's operations.
    pub client: ClientId,
    /// Which room the session joined.
    pub room: RoomId,
    /// Display name chosen by the client.
    pub display_name: String,
    /// Assigned cursor color (hex, from `COLOR_PALETTE`).
    pub color: String,
    /// When the session was created (Unix millis).
    pub connected_at: u64,
}

impl Session {
    /// Create a new session record.
    pub fn new(room: RoomId, display_name: impl Into<String>, join_index: usize) -> Self {
        Self {
            id: SessionId::new(),
            client: ClientId::new(),
            room,
            display_name: display_name.into(),
            color: color_for(join_index).to_string(),
            connected_at: crate::now_millis(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
