//! ============================================================================
//! Backend Seam - Everything the engine asks of the marketplace service
//! ============================================================================
//! Two implementations:
//! - `HttpBackend`: the REST service, JSON envelopes, bearer auth
//! - `InMemoryBackend`: authoritative in-process service for tests and the
//!   CLI's offline mode
//!
//! Every authenticated call takes the caller's `Session` explicitly.
//! ============================================================================

pub mod http;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::lifecycle::{LifecycleError, Transition};
use crate::retry::{classify_status, ErrorKind};
use crate::types::*;

pub use http::HttpBackend;
pub use memory::InMemoryBackend;

/// Page size used when loading a conversation's messages
pub const DEFAULT_MESSAGE_PAGE: usize = 20;

/// Failures talking to the marketplace service
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Not signed in or session expired")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected: {0}")]
    Rejected(#[from] LifecycleError),
}

impl BackendError {
    /// How the retry loop should treat this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Network(_) | BackendError::Timeout(_) => ErrorKind::Retryable,
            BackendError::Status { status, .. } => classify_status(*status),
            BackendError::Decode(_)
            | BackendError::Unauthorized
            | BackendError::NotFound(_)
            | BackendError::Rejected(_) => ErrorKind::Permanent,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout(e.to_string())
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            BackendError::Status {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

/// Operations the marketplace service offers
#[async_trait]
pub trait MarketplaceBackend: Send + Sync {
    // ---- users ----

    async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    async fn login(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    /// Returns the profile fields the backend echoes back, possibly partial
    async fn update_details(
        &self,
        session: &Session,
        update: &ProfileUpdate,
    ) -> Result<ProfileDetails, BackendError>;

    // ---- tasks ----

    async fn create_task(&self, session: &Session, task: &NewTask) -> Result<Task, BackendError>;

    /// Every task the service is willing to show this viewer
    async fn browse_tasks(&self, session: &Session) -> Result<Vec<Task>, BackendError>;

    /// Request a lifecycle transition; returns the task as the service now
    /// holds it
    async fn transition(
        &self,
        session: &Session,
        task_id: &str,
        transition: &Transition,
    ) -> Result<Task, BackendError>;

    // ---- messaging ----

    async fn create_conversation(
        &self,
        session: &Session,
        receiver_id: &str,
    ) -> Result<Conversation, BackendError>;

    async fn list_conversations(&self, session: &Session)
        -> Result<Vec<Conversation>, BackendError>;

    async fn receiver_details(
        &self,
        session: &Session,
        user_ids: &[UserId],
    ) -> Result<Vec<ReceiverDetails>, BackendError>;

    /// Latest `limit` messages strictly older than `before` (or the newest
    /// page when `before` is `None`), oldest first
    async fn load_messages(
        &self,
        session: &Session,
        conversation_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Message>, BackendError>;

    async fn send_message(
        &self,
        session: &Session,
        conversation_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<Message, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(BackendError::Network("reset".into()).kind(), ErrorKind::Retryable);
        assert_eq!(BackendError::Timeout("slow".into()).kind(), ErrorKind::Retryable);
        assert_eq!(
            BackendError::Status { status: 502, body: String::new() }.kind(),
            ErrorKind::Retryable
        );
        assert_eq!(
            BackendError::Status { status: 429, body: String::new() }.kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            BackendError::Status { status: 422, body: String::new() }.kind(),
            ErrorKind::Permanent
        );
        assert_eq!(BackendError::Unauthorized.kind(), ErrorKind::Permanent);
        assert_eq!(
            BackendError::from(LifecycleError::EmptyCoverLetter).kind(),
            ErrorKind::Permanent
        );
    }
}
