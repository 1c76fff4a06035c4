//! Splice operations and the pairwise transform.
//!
//! An [`Operation`] is a single splice: at a character position, delete some
//! characters, insert some text. The three wire op types map onto it directly
//! (insert: `deleted == 0`; delete: `inserted` empty; replace: both).
//!
//! # Transform
//!
//! [`transform`] rewrites an operation composed against revision *r* so it
//! applies cleanly after one operation committed at revision *r + 1*. The
//! sync engine folds it over every committed operation between an incoming
//! op's base revision and the current revision, in commit order.
//!
//! The rules keep every transformed operation a single splice:
//!
//! - Positions shift by the committed op's net length change when the
//!   incoming op sits entirely after it.
//! - Overlapping deletions shrink by the overlap, so no character is deleted
//!   twice.
//! - Concurrent inserts at the same position order by `ClientId`: the lower
//!   id's text ends up first on every replica.
//! - An operation starting inside or at the end of a committed deletion
//!   re-anchors just after that op's own inserted text; the tie-break never
//!   applies to it, only to operations that shared a starting position.
//! - A deletion spanning a committed insert widens to cover it and re-emits
//!   the committed text in its own insert, which preserves the concurrent
//!   insert without splitting the splice in two.

use serde::{Deserialize, Serialize};

use tandem_types::{ClientId, OpBody, RemoteOp};

/// Monotonically increasing document revision. Revision 0 is the empty
/// document; revision n is the state after the nth committed operation.
pub type Revision = u64;

/// Kind of edit, derived from the splice shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Delete,
    Replace,
}

/// A single edit: delete `deleted` chars at `pos`, insert `inserted` there.
///
/// Positions and lengths are in characters, not bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// The submitting client. Tie-break key for concurrent inserts.
    pub client: ClientId,
    /// Document revision this edit was composed against.
    pub base_revision: Revision,
    /// Character offset of the edit.
    pub pos: usize,
    /// Characters removed at `pos`.
    pub deleted: usize,
    /// Text placed at `pos` after the removal.
    pub inserted: String,
}

impl Operation {
    /// An insert of `text` at `pos`.
    pub fn insert(client: ClientId, base_revision: Revision, pos: usize, text: impl Into<String>) -> Self {
        Self { client, base_revision, pos, deleted: 0, inserted: text.into() }
    }

    /// A deletion of `count` chars at `pos`.
    pub fn delete(client: ClientId, base_revision: Revision, pos: usize, count: usize) -> Self {
        Self { client, base_revision, pos, deleted: count, inserted: String::new() }
    }

    /// A replacement of `count` chars at `pos` with `text`.
    pub fn replace(
        client: ClientId,
        base_revision: Revision,
        pos: usize,
        count: usize,
        text: impl Into<String>,
    ) -> Self {
        Self { client, base_revision, pos, deleted: count, inserted: text.into() }
    }

    /// Build from a wire body.
    pub fn from_body(client: ClientId, base_revision: Revision, pos: usize, body: &OpBody) -> Self {
        Self {
            client,
            base_revision,
            pos,
            deleted: body.deleted(),
            inserted: body.inserted().to_string(),
        }
    }

    /// The derived wire kind.
    pub fn kind(&self) -> OpKind {
        match (self.deleted, self.inserted.is_empty()) {
            (0, _) => OpKind::Insert,
            (_, true) => OpKind::Delete,
            (_, false) => OpKind::Replace,
        }
    }

    /// Length of the inserted text in characters.
    pub fn inserted_len(&self) -> usize {
        self.inserted.chars().count()
    }

    /// True if the operation changes nothing. Transforms can reduce an
    /// operation to this; it still commits and bumps the revision.
    pub fn is_noop(&self) -> bool {
        self.deleted == 0 && self.inserted.is_empty()
    }

    /// One-past-the-end of the deleted range. Saturating: wire values are
    /// untrusted and absurd lengths must not panic before the bounds check
    /// rejects them.
    fn end(&self) -> usize {
        self.pos.saturating_add(self.deleted)
    }

    /// The rebroadcast form (drops `base_revision`, which is meaningless
    /// after transformation; the accompanying revision number replaces it).
    pub fn to_remote(&self) -> RemoteOp {
        RemoteOp {
            client: self.client,
            position: self.pos,
            body: OpBody::from_splice(self.deleted, &self.inserted),
        }
    }
}

/// Rewrite `op` to apply after `committed`.
///
/// `op` and `committed` must have been composed against the same document
/// state; the result is composed against the state just after `committed`.
pub fn transform(op: &Operation, committed: &Operation) -> Operation {
    let mut t = op.clone();
    let c_ins = committed.inserted_len();

    // Phase 1: account for the committed deletion. Remember HOW the position
    // came to rest at `committed.pos`: collapsed from strictly inside the
    // deleted range, or shifted down from its end. Either way the operation
    // sits positionally after the committed one, which settles the ordering
    // in phase 2 without a tie-break. Only operations that started at
    // `committed.pos` themselves are genuinely concurrent at one point.
    let mut after_committed = false;
    if committed.deleted > 0 {
        let c_end = committed.end();
        if t.deleted > 0 {
            let overlap = t.end().min(c_end).saturating_sub(t.pos.max(committed.pos));
            t.deleted -= overlap;
        }
        if t.pos >= c_end {
            t.pos -= committed.deleted;
            after_committed = true;
        } else if t.pos > committed.pos {
            t.pos = committed.pos;
            after_committed = true;
        }
        // t.pos <= committed.pos: unchanged
    }

    // Phase 2: account for the committed insert, which sits at
    // `committed.pos` in post-deletion coordinates. Saturating arithmetic
    // throughout: wire lengths are untrusted and rejection happens at the
    // bounds check, not here.
    if c_ins > 0 {
        let q = committed.pos;
        if t.pos > q {
            t.pos = t.pos.saturating_add(c_ins);
        } else if t.pos == q {
            if after_committed || t.client >= committed.client {
                // The committed text comes first: step past it.
                t.pos = t.pos.saturating_add(c_ins);
            } else if t.deleted > 0 {
                // Our text wins the tie but our deletion now starts under
                // the committed insert. Widen across it and re-emit the
                // committed text after our own, keeping a single splice.
                t.deleted = t.deleted.saturating_add(c_ins);
                t.inserted.push_str(&committed.inserted);
            }
            // else: pure insert, tie won, position stays.
        } else if q < t.end() {
            // Committed insert landed strictly inside our deletion range:
            // widen across it and re-emit it.
            t.deleted = t.deleted.saturating_add(c_ins);
            t.inserted.push_str(&committed.inserted);
        }
        // q >= t.end(): insert at or beyond our range end, no effect.
    }

    t
}

// ============================================================================
// Tests
// ============================================================================
