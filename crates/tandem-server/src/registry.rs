//! The session registry: which sessions are live, and where.
//!
//! One entry per connected session, inserted at join and removed exactly
//! once at disconnect. `release` returning `Some` is the idempotency gate
//! for the whole disconnect path. A connection can die twice over (explicit
//! `leave` racing a read timeout, say) but only the first release runs the
//! room cleanup.

use dashmap::DashMap;
use tandem_types::{ClientId, RoomId, Session, SessionId};

/// What the registry remembers about a live session.
#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub session: SessionId,
    pub client: ClientId,
    pub room: RoomId,
    pub display_name: String,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionRecord>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly joined session.
    pub fn register(&self, session: &Session) {
        self.sessions.insert(
            session.id,
            SessionRecord {
                session: session.id,
                client: session.client,
                room: session.room.clone(),
                display_name: session.display_name.clone(),
            },
        );
    }

    /// Remove a session. `Some` exactly once per registered session; every
    /// later call gets `None` and must do nothing.
    pub fn release(&self, session: SessionId) -> Option<SessionRecord> {
        self.sessions.remove(&session).map(|(_, record)| record)
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Sessions currently in a given room.
    pub fn sessions_in(&self, room: &RoomId) -> Vec<SessionRecord> {
        self.sessions
            .iter()
            .filter(|entry| &entry.room == room)
            .map(|entry| entry.value().clone())
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
