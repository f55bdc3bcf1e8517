//! ============================================================================
//! Messaging - Conversations, message threads and live delivery
//! ============================================================================
//! - `directory`: conversation lookup-or-create, listing and search
//! - `thread`: ordered, de-duplicated message history for one conversation
//! - `subscription`: background delivery of new messages
//! ============================================================================

pub mod directory;
pub mod subscription;
pub mod thread;

pub use directory::{filter_conversations, ConversationDirectory};
pub use subscription::{MessageSubscription, DEFAULT_POLL_INTERVAL};
pub use thread::MessageThread;

use crate::backend::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
