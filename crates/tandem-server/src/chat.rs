//! Per-room chat: an append-only, in-memory message log.
//!
//! Messages get their id and timestamp server-side at append time, so the
//! log order is the one true order. Everyone in the room (sender included)
//! sees broadcasts in exactly this order; late joiners get the whole log in
//! their join snapshot.

use tandem_types::{ChatMessage, MessageId, SessionId, now_millis};

#[derive(Debug, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp and append a message; returns a clone for broadcasting.
    pub fn post(
        &mut self,
        sender: SessionId,
        display_name: impl Into<String>,
        text: impl Into<String>,
    ) -> ChatMessage {
        let message = ChatMessage {
            id: MessageId::new(),
            sender,
            display_name: display_name.into(),
            text: text.into(),
            sent_at: now_millis(),
        };
        self.messages.push(message.clone());
        message
    }

    /// The full log, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
