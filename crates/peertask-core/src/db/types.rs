// ============================================================================
// Database Types - Records persisted by PeerTaskDb
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Session;

/// The signed-in session plus when it was saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub session: Session,
    pub saved_at: DateTime<Utc>,
}

/// Database summary for `peertask stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub total_tasks: usize,
    /// Task count per status label
    pub task_counts: BTreeMap<String, usize>,
    pub signed_in_as: Option<String>,
    pub tasks_saved_at: Option<DateTime<Utc>>,
}
