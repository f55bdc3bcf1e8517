// ============================================================================
// PeerTaskDb - Embedded Database (redb)
// ============================================================================
// Local storage for the signed-in session and the last task snapshot.
// Default path: ~/.peertask/peertask.redb (override via PEERTASK_DB_PATH)
// Values are JSON so the wire types round-trip with their serde attributes.
// ============================================================================

pub mod types;

pub use types::{DbStats, StoredSession};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition, TableHandle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{Session, Task};

// Table definitions
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");
const TASKS: TableDefinition<&str, &[u8]> = TableDefinition::new("tasks");
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const CURRENT_SESSION: &str = "current";
const TASKS_SAVED_AT: &str = "tasks_saved_at";

fn encode<T: Serialize>(value: &T, what: &str) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| anyhow!("Failed to serialize {}: {}", what, e))
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| anyhow!("Failed to deserialize {}: {}", what, e))
}

/// Explicit path, then the environment override, then the home default
fn resolve_path(explicit: Option<&str>, from_env: Option<String>) -> Result<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
        return Ok(PathBuf::from(path));
    }
    if let Some(path) = from_env.filter(|p| !p.trim().is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".peertask").join("peertask.redb"))
}

/// Embedded database for the PeerTask client
pub struct PeerTaskDb {
    db: Database,
    path: PathBuf,
}

impl PeerTaskDb {
    /// Open (or create) the database. `path` wins over PEERTASK_DB_PATH,
    /// which wins over ~/.peertask/peertask.redb.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let path = resolve_path(path, std::env::var("PEERTASK_DB_PATH").ok())?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow!("Failed to create {}: {}", parent.display(), e))?;
        }

        let db = Database::create(&path)
            .map_err(|e| anyhow!("Failed to open database {}: {}", path.display(), e))?;

        // All tables exist from the first open, so readers never miss one
        let write_txn = db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        for table in [SESSIONS, TASKS, META] {
            write_txn.open_table(table)
                .map_err(|e| anyhow!("Failed to create table {}: {}", table.name(), e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        let db = Self { db, path };
        info!(
            "PeerTask database at {} ({} cached tasks)",
            db.path.display(),
            db.list_tasks()?.len()
        );
        Ok(db)
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Session Operations
    // ========================================================================

    pub fn store_session(&self, session: &Session) -> Result<()> {
        let record = StoredSession {
            session: session.clone(),
            saved_at: Utc::now(),
        };
        let value = encode(&record, "session")?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(SESSIONS)
                .map_err(|e| anyhow!("Failed to open sessions table: {}", e))?;
            table.insert(CURRENT_SESSION, value.as_slice())
                .map_err(|e| anyhow!("Failed to insert session: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored session for {}", session.user_id());
        Ok(())
    }

    pub fn get_session(&self) -> Result<Option<StoredSession>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(SESSIONS)
            .map_err(|e| anyhow!("Failed to open sessions table: {}", e))?;

        match table.get(CURRENT_SESSION).map_err(|e| anyhow!("Failed to get session: {}", e))? {
            Some(value) => Ok(Some(decode(value.value(), "session")?)),
            None => Ok(None),
        }
    }

    /// Remove the stored session. Returns whether one existed.
    pub fn clear_session(&self) -> Result<bool> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        {
            let mut table = write_txn.open_table(SESSIONS)
                .map_err(|e| anyhow!("Failed to open sessions table: {}", e))?;
            removed = table.remove(CURRENT_SESSION)
                .map_err(|e| anyhow!("Failed to remove session: {}", e))?
                .is_some();
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;

        if removed {
            debug!("Cleared stored session");
        }
        Ok(removed)
    }

    // ========================================================================
    // Task Snapshot Operations
    // ========================================================================

    /// Replace the stored snapshot with `tasks`, in one transaction
    pub fn store_tasks(&self, tasks: &[Task]) -> Result<()> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        write_txn.delete_table(TASKS)
            .map_err(|e| anyhow!("Failed to clear tasks: {}", e))?;
        {
            let mut table = write_txn.open_table(TASKS)
                .map_err(|e| anyhow!("Failed to open tasks table: {}", e))?;

            // Keys keep the snapshot's order under redb's sorted iteration
            for (position, task) in tasks.iter().enumerate() {
                let key = format!("{:08}:{}", position, task.id);
                let value = encode(task, "task")?;
                table.insert(key.as_str(), value.as_slice())
                    .map_err(|e| anyhow!("Failed to insert task: {}", e))?;
            }

            let mut meta = write_txn.open_table(META)
                .map_err(|e| anyhow!("Failed to open meta table: {}", e))?;
            let saved_at = encode(&Utc::now(), "timestamp")?;
            meta.insert(TASKS_SAVED_AT, saved_at.as_slice())
                .map_err(|e| anyhow!("Failed to record snapshot time: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored snapshot of {} tasks", tasks.len());
        Ok(())
    }

    /// The stored snapshot, in the order it was saved
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(TASKS)
            .map_err(|e| anyhow!("Failed to open tasks table: {}", e))?;

        let mut results = Vec::new();
        let iter = table.range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate tasks: {}", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            results.push(decode(value.value(), "task")?);
        }
        Ok(results)
    }

    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(self.list_tasks()?.into_iter().find(|t| t.id == task_id))
    }

    pub fn tasks_saved_at(&self) -> Result<Option<DateTime<Utc>>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(META)
            .map_err(|e| anyhow!("Failed to open meta table: {}", e))?;

        match table.get(TASKS_SAVED_AT).map_err(|e| anyhow!("Failed to get snapshot time: {}", e))? {
            Some(value) => Ok(Some(decode(value.value(), "timestamp")?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Stats
    // ========================================================================

    pub fn stats(&self) -> Result<DbStats> {
        let tasks = self.list_tasks()?;

        let mut task_counts = BTreeMap::new();
        for task in &tasks {
            *task_counts.entry(task.status.to_string()).or_insert(0usize) += 1;
        }

        Ok(DbStats {
            total_tasks: tasks.len(),
            task_counts,
            signed_in_as: self.get_session()?.map(|s| s.session.user.email),
            tasks_saved_at: self.tasks_saved_at()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_task, session};
    use crate::types::TaskStatus;
    use tempfile::TempDir;

    fn temp_db() -> (TempDir, PeerTaskDb) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");
        let db = PeerTaskDb::open(Some(path.to_str().unwrap())).unwrap();
        (dir, db)
    }

    #[test]
    fn test_session_round_trip() {
        let (_dir, db) = temp_db();
        assert!(db.get_session().unwrap().is_none());

        let session = session("u1");
        db.store_session(&session).unwrap();

        let stored = db.get_session().unwrap().unwrap();
        assert_eq!(stored.session, session);

        assert!(db.clear_session().unwrap());
        assert!(db.get_session().unwrap().is_none());
        assert!(!db.clear_session().unwrap());
    }

    #[test]
    fn test_task_snapshot_replaces_and_keeps_order() {
        let (_dir, db) = temp_db();
        let now = Utc::now();

        db.store_tasks(&[open_task("zeta", "u1", now, 1), open_task("alpha", "u2", now, 2)])
            .unwrap();
        let listed = db.list_tasks().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "zeta");
        assert_eq!(listed[1].id, "alpha");

        db.store_tasks(&[open_task("only", "u1", now, 1)]).unwrap();
        let listed = db.list_tasks().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(db.get_task("zeta").unwrap().is_none());
        assert!(db.get_task("only").unwrap().is_some());
    }

    #[test]
    fn test_stats() {
        let (_dir, db) = temp_db();
        let now = Utc::now();
        let mut assigned = open_task("b", "u1", now, 1);
        assigned.status = TaskStatus::Assigned;
        assigned.assigned_to = Some("u2".to_string());

        db.store_tasks(&[open_task("a", "u1", now, 1), assigned]).unwrap();
        db.store_session(&session("u1")).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.task_counts.get("open"), Some(&1));
        assert_eq!(stats.task_counts.get("assigned"), Some(&1));
        assert_eq!(stats.signed_in_as.as_deref(), Some("u1@example.com"));
        assert!(stats.tasks_saved_at.is_some());
    }

    #[test]
    fn test_path_resolution_order() {
        let explicit = resolve_path(Some("/tmp/a.redb"), Some("/tmp/b.redb".to_string())).unwrap();
        assert_eq!(explicit, PathBuf::from("/tmp/a.redb"));

        let from_env = resolve_path(Some(" "), Some("/tmp/b.redb".to_string())).unwrap();
        assert_eq!(from_env, PathBuf::from("/tmp/b.redb"));

        if let Ok(default) = resolve_path(None, None) {
            assert!(default.ends_with(".peertask/peertask.redb"));
        }
    }

    #[test]
    fn test_open_creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.redb");
        let db = PeerTaskDb::open(Some(path.to_str().unwrap())).unwrap();
        assert!(db.list_tasks().unwrap().is_empty());
        assert!(db.get_session().unwrap().is_none());
        assert!(path.exists());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.redb");
        let path = path.to_str().unwrap();

        {
            let db = PeerTaskDb::open(Some(path)).unwrap();
            db.store_session(&session("u9")).unwrap();
        }

        let db = PeerTaskDb::open(Some(path)).unwrap();
        assert_eq!(db.get_session().unwrap().unwrap().session.user_id(), "u9");
        assert_eq!(db.path(), Path::new(path));
    }
}
