//! The authoritative room document.
//!
//! One [`Document`] per room, mutated only from the room's serialization
//! point. Applying an operation validates it, transforms it forward through
//! every operation committed after its base revision, splices the text, and
//! appends to the committed log. The log is what late joiners and laggy
//! clients catch up from.

use tracing::debug;

use crate::error::OtError;
use crate::operation::{Operation, Revision, transform};

/// An operation that has been transformed and applied.
///
/// Immutable once committed; `revision` is the document revision the
/// operation produced (log index + 1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Committed {
    pub revision: Revision,
    pub op: Operation,
}

/// Authoritative text plus revision counter plus committed-op log.
#[derive(Clone, Debug, Default)]
pub struct Document {
    text: String,
    revision: Revision,
    log: Vec<Committed>,
}

impl Document {
    /// An empty document at revision 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// A document seeded with initial content, still at revision 0.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into(), revision: 0, log: Vec::new() }
    }

    /// Current text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Current revision. Increases by exactly 1 per accepted operation.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Length in characters.
    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    /// Operations committed after `revision`, in commit order.
    ///
    /// Safe for concurrent read once returned; committed entries never
    /// change.
    pub fn ops_since(&self, revision: Revision) -> &[Committed] {
        let start = (revision as usize).min(self.log.len());
        &self.log[start..]
    }

    /// Validate, transform, and apply one operation.
    ///
    /// On success the revision has advanced by 1 and the returned entry
    /// holds the transformed operation, the form to rebroadcast. On error
    /// the document is untouched.
    pub fn apply(&mut self, op: Operation) -> Result<Committed, OtError> {
        if op.base_revision > self.revision {
            return Err(OtError::StaleOperation {
                base: op.base_revision,
                current: self.revision,
            });
        }

        // Fold the op forward through everything committed after its base.
        let mut transformed = op;
        for committed in self.ops_since(transformed.base_revision) {
            transformed = transform(&transformed, &committed.op);
        }

        // Bounds check in the current document's coordinates. Rejection
        // must not mutate anything, so check before splicing. Positions and
        // lengths come straight off the wire, so no unchecked sums.
        let len = self.len_chars();
        if transformed.pos > len || transformed.deleted > len - transformed.pos {
            return Err(OtError::PositionOutOfBounds {
                pos: transformed.pos.saturating_add(transformed.deleted),
                len,
            });
        }

        self.splice(transformed.pos, transformed.deleted, &transformed.inserted);
        self.revision += 1;

        debug!(
            revision = self.revision,
            pos = transformed.pos,
            deleted = transformed.deleted,
            inserted = transformed.inserted.len(),
            "committed operation"
        );

        let entry = Committed { revision: self.revision, op: transformed };
        self.log.push(entry.clone());
        Ok(entry)
    }

    /// Replace `deleted` chars at char offset `pos` with `inserted`.
    fn splice(&mut self, pos: usize, deleted: usize, inserted: &str) {
        let start = self.byte_offset(pos);
        let end = self.byte_offset(pos + deleted);
        self.text.replace_range(start..end, inserted);
    }

    /// Byte offset of the nth character (text length if n == char count).
    fn byte_offset(&self, n: usize) -> usize {
        self.text
            .char_indices()
            .nth(n)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
