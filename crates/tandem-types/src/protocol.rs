//! Wire protocol: the typed messages exchanged with clients.
//!
//! Frames are newline-delimited JSON. Every message carries a `type` tag;
//! field names are camelCase because the reference client is a browser app.
//!
//! Client → server kinds: `join`, `createRoom`, `editOp`, `cursorUpdate`,
//! `typing`, `chatPost`, `executeRequest`, `aiRequest`, `leave`, `ping`.
//!
//! Server → client kinds: `roomCreated`, `joined`, `ack`, `opBroadcast`,
//! `presenceSnapshot`, `presenceDelta`, `chatBroadcast`, `executionResult`,
//! `aiResult`, `pong`, `error`.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::ids::{ClientId, MessageId, RoomId, SessionId};

// ── Document operations ─────────────────────────────────────────────────────

/// The edit payload, discriminated by `opType`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opType", rename_all = "camelCase")]
pub enum OpBody {
    /// Insert `text` at the operation position.
    Insert { text: String },
    /// Delete `count` characters starting at the operation position.
    Delete { count: usize },
    /// Delete `count` characters and insert `text` in their place.
    Replace { count: usize, text: String },
}

impl OpBody {
    /// Characters deleted by this body.
    pub fn deleted(&self) -> usize {
        match self {
            OpBody::Insert { .. } => 0,
            OpBody::Delete { count } => *count,
            OpBody::Replace { count, .. } => *count,
        }
    }

    /// Text inserted by this body ("" for pure deletes).
    pub fn inserted(&self) -> &str {
        match self {
            OpBody::Insert { text } => text,
            OpBody::Delete { .. } => "",
            OpBody::Replace { text, .. } => text,
        }
    }

    /// Build the canonical body for a (deleted, inserted) splice pair.
    pub fn from_splice(deleted: usize, inserted: &str) -> Self {
        match (deleted, inserted.is_empty()) {
            (0, _) => OpBody::Insert { text: inserted.to_string() },
            (n, true) => OpBody::Delete { count: n },
            (n, false) => OpBody::Replace { count: n, text: inserted.to_string() },
        }
    }
}

/// An edit submitted by a client against a known revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOp {
    /// Document revision the edit was composed against.
    pub base_revision: u64,
    /// Character offset in the document.
    pub position: usize,
    /// What to do there.
    #[serde(flatten)]
    pub body: OpBody,
}

/// A committed edit as rebroadcast to the other sessions in a room.
///
/// This is the transformed operation, not the original submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOp {
    /// Which client authored the edit.
    pub client: ClientId,
    /// Character offset after transformation.
    pub position: usize,
    /// What was done there.
    #[serde(flatten)]
    pub body: OpBody,
}

// ── Presence ────────────────────────────────────────────────────────────────

/// A selection range in character offsets (`start <= end`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRange {
    pub start: usize,
    pub end: usize,
}

/// Full presence state for one session, as sent in snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub session: SessionId,
    pub client: ClientId,
    pub display_name: String,
    pub color: String,
    pub cursor: usize,
    pub selection: Option<SelectionRange>,
    pub typing: bool,
}

/// An incremental presence change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PresenceDelta {
    /// A session moved its cursor or changed its selection.
    CursorMoved {
        session: SessionId,
        position: usize,
        selection: Option<SelectionRange>,
    },
    /// A session started or stopped typing. Stop may be timer-driven.
    TypingChanged { session: SessionId, typing: bool },
    /// A new session joined the room.
    Joined { entry: PresenceEntry },
    /// A session left the room (explicitly or by disconnect).
    Left { session: SessionId },
}

// ── Chat ────────────────────────────────────────────────────────────────────

/// An immutable chat message. Append-only once stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: SessionId,
    pub display_name: String,
    pub text: String,
    /// Unix millis, assigned server-side at append time.
    pub sent_at: u64,
}

// ── Messages ────────────────────────────────────────────────────────────────

/// Messages a client sends to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Join a room by id. Must be the first message on a connection
    /// (alternatively `createRoom`).
    Join { room: RoomId, display_name: String },
    /// Create a fresh room and join it.
    CreateRoom { display_name: String },
    /// Submit a document edit.
    EditOp(EditOp),
    /// Move cursor / change selection.
    CursorUpdate {
        position: usize,
        selection: Option<SelectionRange>,
    },
    /// Set or refresh the typing flag.
    Typing { typing: bool },
    /// Post a chat message.
    ChatPost { text: String },
    /// Run the room's current document through the execution backend.
    ExecuteRequest {
        language: String,
        #[serde(default)]
        stdin: String,
    },
    /// Ask the AI assist gateway about the current document.
    AiRequest { instruction: String },
    /// Leave the room. The connection closes afterwards.
    Leave,
    /// Keep-alive.
    Ping,
}

/// Messages the server sends to a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Reply to `createRoom`; the client is also joined (a `joined`
    /// message follows).
    RoomCreated { room: RoomId },
    /// Room state snapshot for the joining session.
    Joined {
        room: RoomId,
        room_name: String,
        session: SessionId,
        client: ClientId,
        color: String,
        document: String,
        revision: u64,
        chat: Vec<ChatMessage>,
    },
    /// The submitter's own edit was committed at this revision.
    Ack { revision: u64 },
    /// Another session's edit, transformed, committed at this revision.
    OpBroadcast { op: RemoteOp, revision: u64 },
    /// Full presence state; sent once right after `joined`.
    PresenceSnapshot { entries: Vec<PresenceEntry> },
    /// Incremental presence change.
    PresenceDelta { delta: PresenceDelta },
    /// A chat message was appended. Sent to every session, sender included.
    ChatBroadcast { message: ChatMessage },
    /// Result from the execution backend.
    ExecutionResult {
        stdout: String,
        stderr: String,
        exit_code: i32,
    },
    /// Result from the AI assist gateway.
    AiResult { suggestion: String },
    /// Keep-alive reply.
    Pong,
    /// Typed error. `kind` is stable; `detail` is human-readable.
    Error { kind: ErrorKind, detail: String },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_op_wire_shape() {
        let msg = ClientMessage::EditOp(EditOp {
            base_revision: 5,
            position: 3,
            body: OpBody::Insert { text: "X".into() },
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"editOp","baseRevision":5,"position":3,"opType":"insert","text":"X"}"#
        );
        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_delete_op_roundtrip() {
        let op = EditOp {
            base_revision: 0,
            position: 4,
            body: OpBody::Delete { count: 2 },
        };
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains(r#""opType":"delete""#));
        let parsed: EditOp = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, op);
    }

    #[test]
    fn test_op_body_splice_accessors() {
        let body = OpBody::Replace { count: 3, text: "ab".into() };
        assert_eq!(body.deleted(), 3);
        assert_eq!(body.inserted(), "ab");

        assert_eq!(OpBody::from_splice(0, "hi"), OpBody::Insert { text: "hi".into() });
        assert_eq!(OpBody::from_splice(2, ""), OpBody::Delete { count: 2 });
        assert_eq!(
            OpBody::from_splice(2, "hi"),
            OpBody::Replace { count: 2, text: "hi".into() }
        );
    }

    #[test]
    fn test_join_message_tag() {
        let msg = ClientMessage::Join {
            room: RoomId::from("abc"),
            display_name: "amy".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"join","room":"abc","displayName":"amy"}"#);
    }

    #[test]
    fn test_server_error_shape() {
        let msg = ServerMessage::Error {
            kind: ErrorKind::Protocol,
            detail: "unexpected frame".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"error","kind":"protocol","detail":"unexpected frame"}"#
        );
    }

    #[test]
    fn test_presence_delta_roundtrip() {
        let delta = PresenceDelta::CursorMoved {
            session: SessionId::new(),
            position: 10,
            selection: Some(SelectionRange { start: 8, end: 12 }),
        };
        let msg = ServerMessage::PresenceDelta { delta: delta.clone() };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"presenceDelta""#));
        assert!(json.contains(r#""kind":"cursorMoved""#));
        let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ServerMessage::PresenceDelta { delta });
    }

    #[test]
    fn test_op_broadcast_roundtrip() {
        let msg = ServerMessage::OpBroadcast {
            op: RemoteOp {
                client: ClientId::new(),
                position: 7,
                body: OpBody::Replace { count: 1, text: "z".into() },
            },
            revision: 42,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_execute_request_default_stdin() {
        let json = r#"{"type":"executeRequest","language":"python"}"#;
        let parsed: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed,
            ClientMessage::ExecuteRequest { language: "python".into(), stdin: String::new() }
        );
    }

    #[test]
    fn test_ping_pong() {
        assert_eq!(
            serde_json::to_string(&ClientMessage::Ping).unwrap(),
            r#"{"type":"ping"}"#
        );
        assert_eq!(
            serde_json::to_string(&ServerMessage::Pong).unwrap(),
            r#"{"type":"pong"}"#
        );
    }
}
