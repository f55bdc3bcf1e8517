//! ============================================================================
//! Message Thread - Ordered history of one conversation
//! ============================================================================
//! Pages fetched in any order are folded in by message id. The thread keeps
//! timestamp order and reports which messages it had not seen before, which
//! is what the subscription forwards.
//! ============================================================================

use std::collections::HashSet;

use crate::types::{ConversationId, Message};

/// Messages of one conversation, oldest first, each id at most once
#[derive(Debug, Clone)]
pub struct MessageThread {
    conversation_id: ConversationId,
    messages: Vec<Message>,
    seen: HashSet<String>,
}

impl MessageThread {
    pub fn new(conversation_id: impl Into<ConversationId>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Fold a fetched page into the thread. Returns the messages that were
    /// not known before, in timestamp order. Known messages are refreshed in
    /// place (their read flag may have changed); messages from other
    /// conversations are ignored.
    pub fn merge(&mut self, page: Vec<Message>) -> Vec<Message> {
        let mut fresh = Vec::new();

        for message in page {
            if message.conversation_id != self.conversation_id {
                continue;
            }
            if self.seen.contains(&message.id) {
                if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
                    *existing = message;
                }
                continue;
            }
            self.seen.insert(message.id.clone());
            fresh.push(message);
        }

        if !fresh.is_empty() {
            self.messages.extend(fresh.iter().cloned());
            self.messages.sort_by_key(|m| m.timestamp);
            fresh.sort_by_key(|m| m.timestamp);
        }
        fresh
    }

    /// Whether a message with this id has been merged
    pub fn contains(&self, message_id: &str) -> bool {
        self.seen.contains(message_id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Oldest loaded message; its timestamp pages further back
    pub fn oldest(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// Messages addressed to `viewer` that are still unread
    pub fn unread_for(&self, viewer: &str) -> usize {
        self.messages
            .iter()
            .filter(|m| m.receiver_id == viewer && !m.read)
            .count()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
