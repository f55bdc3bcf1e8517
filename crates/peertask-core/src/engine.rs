//! ============================================================================
//! Task Engine - Owns the task store and drives it through the backend
//! ============================================================================
//! Flow:
//! 1. `refresh` fills the store from the backend (reads are retried)
//! 2. `browse` / `history` run the visibility filter over the store
//! 3. Transitions are sent once after a local caller check; the backend
//!    decides on state, and its snapshot is applied to the store on success
//! ============================================================================

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, MarketplaceBackend};
use crate::filter::{self, BrowseCriteria, HistoryView};
use crate::lifecycle::{LifecycleError, Transition};
use crate::retry::{retry_read, RetryConfig};
use crate::store::TaskStore;
use crate::types::*;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Invalid task: {0}")]
    InvalidTask(String),
}

pub struct TaskEngine {
    backend: Arc<dyn MarketplaceBackend>,
    store: Arc<RwLock<TaskStore>>,
    retry: RetryConfig,
}

impl TaskEngine {
    pub fn new(backend: Arc<dyn MarketplaceBackend>) -> Self {
        Self::with_retry(backend, RetryConfig::default())
    }

    pub fn with_retry(backend: Arc<dyn MarketplaceBackend>, retry: RetryConfig) -> Self {
        Self {
            backend,
            store: Arc::new(RwLock::new(TaskStore::new())),
            retry,
        }
    }

    /// Handle to the underlying store, for readers that outlive one call
    pub fn store(&self) -> Arc<RwLock<TaskStore>> {
        Arc::clone(&self.store)
    }

    /// Replace the store with a fresh fetch. On failure the previous
    /// contents are kept and the error is returned.
    pub async fn refresh(&self, session: &Session) -> Result<usize, EngineError> {
        let backend = Arc::clone(&self.backend);
        let fetched = retry_read("browse_tasks", &self.retry, || {
            let backend = Arc::clone(&backend);
            async move { backend.browse_tasks(session).await }
        })
        .await
        .map_err(|e| {
            warn!("Task refresh failed, keeping cached tasks: {}", e);
            e
        })?;

        let count = fetched.len();
        self.store.write().await.replace_all(fetched);
        info!("Refreshed task store: {} tasks", count);
        Ok(count)
    }

    pub async fn create_task(&self, session: &Session, new_task: NewTask) -> Result<Task, EngineError> {
        new_task
            .validate(Utc::now())
            .map_err(EngineError::InvalidTask)?;

        let created = self.backend.create_task(session, &new_task).await?;
        info!("Created task {} ({})", created.id, created.title);
        self.store.write().await.append(created.clone());
        Ok(created)
    }

    /// The viewer's browse view over the current store
    pub async fn browse(
        &self,
        session: &Session,
        criteria: &BrowseCriteria,
        now: DateTime<Utc>,
    ) -> Vec<Task> {
        let store = self.store.read().await;
        filter::browse(&*store, session.user_id(), criteria, now)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn history(
        &self,
        session: &Session,
        view: HistoryView,
        status: Option<TaskStatus>,
    ) -> Vec<Task> {
        let store = self.store.read().await;
        filter::history(&*store, session.user_id(), view, status)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn categories(&self) -> Vec<String> {
        self.store.read().await.categories()
    }

    pub async fn task(&self, task_id: &str) -> Result<Task, EngineError> {
        self.store
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))
    }

    pub async fn apply(
        &self,
        session: &Session,
        task_id: &str,
        cover_letter: &str,
    ) -> Result<Task, EngineError> {
        let transition = Transition::Apply {
            cover_letter: cover_letter.trim().to_string(),
        };
        self.run_transition(session, task_id, transition).await
    }

    pub async fn assign(
        &self,
        session: &Session,
        task_id: &str,
        applicant_id: &str,
    ) -> Result<Task, EngineError> {
        let transition = Transition::Assign {
            applicant_id: applicant_id.to_string(),
        };
        self.run_transition(session, task_id, transition).await
    }

    pub async fn complete(&self, session: &Session, task_id: &str) -> Result<Task, EngineError> {
        self.run_transition(session, task_id, Transition::Complete).await
    }

    pub async fn pay(&self, session: &Session, task_id: &str) -> Result<Task, EngineError> {
        self.run_transition(session, task_id, Transition::Pay).await
    }

    /// Copy of every stored task, for persistence
    pub async fn snapshot(&self) -> Vec<Task> {
        self.store.read().await.tasks().to_vec()
    }

    /// Load a previously persisted snapshot
    pub async fn restore(&self, tasks: Vec<Task>) {
        debug!("Restoring {} tasks from snapshot", tasks.len());
        self.store.write().await.replace_all(tasks);
    }

    async fn run_transition(
        &self,
        session: &Session,
        task_id: &str,
        transition: Transition,
    ) -> Result<Task, EngineError> {
        // The local copy may be stale, so only identity guards run here
        let local = self.store.read().await.get(task_id).cloned();
        transition.check_caller(local.as_ref(), session.user_id())?;

        // Writes are never retried
        let updated = self.backend.transition(session, task_id, &transition).await?;

        for violation in updated.invariant_violations() {
            warn!("Backend snapshot of task {} breaks an invariant: {}", updated.id, violation);
        }

        info!("{} on task {} succeeded ({})", transition.name(), task_id, updated.status);
        self.store.write().await.apply_snapshot(updated.clone());
        Ok(updated)
    }
}
