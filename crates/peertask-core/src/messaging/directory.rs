//! ============================================================================
//! Conversation Directory - One conversation per pair of participants
//! ============================================================================
//! Caches known conversations and serializes lookup-or-create behind one
//! async mutex, so concurrent requests for the same pair never create two.
//! ============================================================================

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::MessagingError;
use crate::backend::{MarketplaceBackend, DEFAULT_MESSAGE_PAGE};
use crate::retry::{retry_read, RetryConfig};
use crate::types::*;

pub struct ConversationDirectory {
    backend: Arc<dyn MarketplaceBackend>,
    retry: RetryConfig,
    known: Mutex<Vec<Conversation>>,
}

impl ConversationDirectory {
    pub fn new(backend: Arc<dyn MarketplaceBackend>) -> Self {
        Self::with_retry(backend, RetryConfig::default())
    }

    pub fn with_retry(backend: Arc<dyn MarketplaceBackend>, retry: RetryConfig) -> Self {
        Self {
            backend,
            retry,
            known: Mutex::new(Vec::new()),
        }
    }

    /// The conversation between the viewer and `other`, created if neither
    /// the cache nor the backend listing has one
    pub async fn open_with(
        &self,
        session: &Session,
        other: &str,
    ) -> Result<Conversation, MessagingError> {
        let me = session.user_id();
        let other = other.trim();
        if other.is_empty() || other == me {
            return Err(MessagingError::Invalid(format!(
                "cannot open a conversation with '{}'",
                other
            )));
        }

        // Held across lookup and create
        let mut known = self.known.lock().await;

        if let Some(existing) = known.iter().find(|c| c.involves(me, other)) {
            debug!("Conversation with {} found in cache: {}", other, existing.id);
            return Ok(existing.clone());
        }

        let listed = self.fetch_conversations(session).await?;
        remember(&mut known, listed);
        if let Some(existing) = known.iter().find(|c| c.involves(me, other)) {
            debug!("Conversation with {} found on backend: {}", other, existing.id);
            return Ok(existing.clone());
        }

        let created = self.backend.create_conversation(session, other).await?;
        info!("Started conversation {} with {}", created.id, other);
        known.push(created.clone());
        Ok(created)
    }

    /// Every conversation the viewer takes part in, most recent first
    pub async fn conversations(&self, session: &Session) -> Result<Vec<Conversation>, MessagingError> {
        let listed = self.fetch_conversations(session).await?;
        remember(&mut *self.known.lock().await, listed.clone());
        Ok(listed)
    }

    /// Display details for the counterparts of `conversations`
    pub async fn counterpart_details(
        &self,
        session: &Session,
        conversations: &[Conversation],
    ) -> Result<Vec<ReceiverDetails>, MessagingError> {
        let mut ids: Vec<UserId> = conversations
            .iter()
            .map(|c| c.counterpart(session.user_id()).to_string())
            .collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let backend = Arc::clone(&self.backend);
        let ids = &ids;
        let details = retry_read("receiver_details", &self.retry, || {
            let backend = Arc::clone(&backend);
            async move { backend.receiver_details(session, ids).await }
        })
        .await?;
        Ok(details)
    }

    /// One page of messages, older than `before` when given
    pub async fn load_page(
        &self,
        session: &Session,
        conversation_id: &str,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, MessagingError> {
        let backend = Arc::clone(&self.backend);
        let page = retry_read("load_messages", &self.retry, || {
            let backend = Arc::clone(&backend);
            async move {
                backend
                    .load_messages(session, conversation_id, before, DEFAULT_MESSAGE_PAGE)
                    .await
            }
        })
        .await?;
        Ok(page)
    }

    /// Send `content` to the other participant of `conversation`
    pub async fn send(
        &self,
        session: &Session,
        conversation: &Conversation,
        content: &str,
    ) -> Result<Message, MessagingError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MessagingError::Invalid("message must not be empty".to_string()));
        }
        let me = session.user_id();
        if conversation.sender_id != me && conversation.receiver_id != me {
            return Err(MessagingError::Invalid(format!(
                "{} is not part of conversation {}",
                me, conversation.id
            )));
        }

        let receiver = conversation.counterpart(me);
        let message = self
            .backend
            .send_message(session, &conversation.id, receiver, content)
            .await?;
        debug!("Sent message {} in {}", message.id, conversation.id);
        Ok(message)
    }

    async fn fetch_conversations(&self, session: &Session) -> Result<Vec<Conversation>, MessagingError> {
        let backend = Arc::clone(&self.backend);
        let listed = retry_read("list_conversations", &self.retry, || {
            let backend = Arc::clone(&backend);
            async move { backend.list_conversations(session).await }
        })
        .await?;
        Ok(listed)
    }
}

fn remember(known: &mut Vec<Conversation>, listed: Vec<Conversation>) {
    for conversation in listed {
        match known.iter_mut().find(|c| c.id == conversation.id) {
            Some(existing) => *existing = conversation,
            None => known.push(conversation),
        }
    }
}

/// Conversations whose counterpart's full name contains `term`,
/// case-insensitively. A blank term keeps everything; a counterpart with no
/// known details never matches a non-blank term.
pub fn filter_conversations<'a>(
    conversations: &'a [Conversation],
    viewer: &str,
    details: &[ReceiverDetails],
    term: &str,
) -> Vec<&'a Conversation> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return conversations.iter().collect();
    }

    let names: HashMap<&str, String> = details
        .iter()
        .map(|d| (d.id.as_str(), d.full_name.to_lowercase()))
        .collect();

    conversations
        .iter()
        .filter(|c| {
            names
                .get(c.counterpart(viewer))
                .map_or(false, |name| name.contains(&needle))
        })
        .collect()
}
