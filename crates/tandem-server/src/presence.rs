//! Per-room presence state: cursors, selections, typing flags.
//!
//! Owned by the room task, mutated only from its command loop. Typing flags
//! carry an epoch so a stale expiry timer (one that fired after the client
//! refreshed or cleared the flag) can be told apart from the live one.

use std::collections::HashMap;

use tandem_types::{PresenceEntry, SelectionRange, Session, SessionId};

#[derive(Debug)]
struct PresenceState {
    client: tandem_types::ClientId,
    display_name: String,
    color: String,
    cursor: usize,
    selection: Option<SelectionRange>,
    typing: bool,
    typing_epoch: u64,
}

/// What a `set_typing` call requires of the room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypingUpdate {
    /// The flag actually flipped; broadcast a delta.
    pub changed: bool,
    /// Arm an expiry timer with this epoch (set only when typing went on
    /// or was refreshed).
    pub arm_epoch: Option<u64>,
}

/// Presence for every session in one room.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    entries: HashMap<SessionId, PresenceState>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session at cursor 0, not typing. Returns its snapshot entry.
    pub fn add(&mut self, session: &Session) -> PresenceEntry {
        self.entries.insert(
            session.id,
            PresenceState {
                client: session.client,
                display_name: session.display_name.clone(),
                color: session.color.clone(),
                cursor: 0,
                selection: None,
                typing: false,
                typing_epoch: 0,
            },
        );
        self.entry(session.id).expect("just inserted")
    }

    /// Remove a session. Returns false if it was already gone.
    pub fn remove(&mut self, session: SessionId) -> bool {
        self.entries.remove(&session).is_some()
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.entries.contains_key(&session)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move a session's cursor. Returns false for unknown sessions.
    pub fn update_cursor(
        &mut self,
        session: SessionId,
        position: usize,
        selection: Option<SelectionRange>,
    ) -> bool {
        match self.entries.get_mut(&session) {
            Some(state) => {
                state.cursor = position;
                state.selection = selection;
                true
            }
            None => false,
        }
    }

    /// Set the typing flag and bump the epoch (invalidating any armed
    /// timer). Returns `None` for unknown sessions, otherwise what the
    /// caller has to do about it.
    pub fn set_typing(&mut self, session: SessionId, typing: bool) -> Option<TypingUpdate> {
        let state = self.entries.get_mut(&session)?;
        state.typing_epoch += 1;
        let changed = state.typing != typing;
        state.typing = typing;
        Some(TypingUpdate {
            changed,
            arm_epoch: typing.then_some(state.typing_epoch),
        })
    }

    /// Handle a fired expiry timer. Returns true if the flag was actually
    /// cleared (the epoch still matched and the session was typing).
    pub fn expire_typing(&mut self, session: SessionId, epoch: u64) -> bool {
        match self.entries.get_mut(&session) {
            Some(state) if state.typing_epoch == epoch && state.typing => {
                state.typing = false;
                true
            }
            _ => false,
        }
    }

    pub fn is_typing(&self, session: SessionId) -> bool {
        self.entries.get(&session).is_some_and(|s| s.typing)
    }

    fn entry(&self, session: SessionId) -> Option<PresenceEntry> {
        self.entries.get(&session).map(|state| PresenceEntry {
            session,
            client: state.client,
            display_name: state.display_name.clone(),
            color: state.color.clone(),
            cursor: state.cursor,
            selection: state.selection,
            typing: state.typing,
        })
    }

    /// Full snapshot, ordered by session id for stable output.
    pub fn snapshot(&self) -> Vec<PresenceEntry> {
        let mut entries: Vec<_> = self
            .entries
            .keys()
            .filter_map(|id| self.entry(*id))
            .collect();
        entries.sort_by_key(|e| e.session);
        entries
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_types::RoomId;

    fn session() -> Session {
        Session::new(RoomId::generate(), "amy", 0)
    }

    #[test]
    fn test_add_and_snapshot() {
        let mut tracker = PresenceTracker::new();
        let s = session();
        let entry = tracker.add(&s);
        assert_eq!(entry.cursor, 0);
        assert!(!entry.typing);
        assert_eq!(tracker.snapshot().len(), 1);
    }

    #[test]
    fn test_cursor_update() {
        let mut tracker = PresenceTracker::new();
        let s = session();
        tracker.add(&s);
        assert!(tracker.update_cursor(s.id, 42, Some(SelectionRange { start: 40, end: 45 })));
        let snap = tracker.snapshot();
        assert_eq!(snap[0].cursor, 42);
        assert_eq!(snap[0].selection, Some(SelectionRange { start: 40, end: 45 }));

        assert!(!tracker.update_cursor(SessionId::new(), 1, None));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut tracker = PresenceTracker::new();
        let s = session();
        tracker.add(&s);
        assert!(tracker.remove(s.id));
        assert!(!tracker.remove(s.id));
    }

    #[test]
    fn test_typing_epoch_guards_stale_expiry() {
        let mut tracker = PresenceTracker::new();
        let s = session();
        tracker.add(&s);

        let first = tracker.set_typing(s.id, true).unwrap();
        assert!(first.changed);
        let first = first.arm_epoch.unwrap();
        assert!(tracker.is_typing(s.id));

        // Refresh bumps the epoch; the old timer must not clear the flag.
        let refresh = tracker.set_typing(s.id, true).unwrap();
        assert!(!refresh.changed, "refresh is not a state change");
        let second = refresh.arm_epoch.unwrap();
        assert!(second > first);
        assert!(!tracker.expire_typing(s.id, first));
        assert!(tracker.is_typing(s.id));

        assert!(tracker.expire_typing(s.id, second));
        assert!(!tracker.is_typing(s.id));

        // Already cleared: even a matching epoch is a no-op.
        assert!(!tracker.expire_typing(s.id, second));
    }

    #[test]
    fn test_explicit_clear_invalidates_timer() {
        let mut tracker = PresenceTracker::new();
        let s = session();
        tracker.add(&s);

        let armed = tracker.set_typing(s.id, true).unwrap().arm_epoch.unwrap();
        let clear = tracker.set_typing(s.id, false).unwrap();
        assert!(clear.changed);
        assert_eq!(clear.arm_epoch, None);
        assert!(!tracker.expire_typing(s.id, armed));
        assert!(!tracker.is_typing(s.id));
    }

    #[test]
    fn test_clear_when_not_typing_needs_no_broadcast() {
        let mut tracker = PresenceTracker::new();
        let s = session();
        tracker.add(&s);
        let update = tracker.set_typing(s.id, false).unwrap();
        assert!(!update.changed);
        assert_eq!(update.arm_epoch, None);

        assert_eq!(tracker.set_typing(SessionId::new(), true), None);
    }
}
