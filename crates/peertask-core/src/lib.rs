//! ============================================================================
//! PEERTASK-CORE: Task Visibility & Lifecycle Engine
//! ============================================================================
//! This crate handles the client-side logic of the PeerTask marketplace:
//! - Task store, browse visibility rules and task history views
//! - Guarded lifecycle transitions (apply, assign, complete, pay)
//! - REST and in-memory backends behind one async trait
//! - Conversations, message threads and live message delivery
//! - Local persistence of the session and task snapshot (redb)
//! ============================================================================

pub mod backend;
pub mod blog;
pub mod config;
pub mod db;
pub mod engine;
pub mod filter;
pub mod lifecycle;
pub mod messaging;
pub mod retry;
pub mod session;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use types::*;
pub use backend::{BackendError, HttpBackend, InMemoryBackend, MarketplaceBackend};
pub use blog::{BlogClient, BlogError};
pub use config::PeerTaskConfig;
pub use db::PeerTaskDb;
pub use engine::{EngineError, TaskEngine};
pub use filter::{BrowseCriteria, HistoryView};
pub use lifecycle::{LifecycleError, RejectionPolicy, Transition};
pub use messaging::{ConversationDirectory, MessageSubscription, MessageThread, MessagingError};
pub use retry::RetryConfig;
pub use session::{SessionError, SessionManager};
pub use store::TaskStore;
