//! ============================================================================
//! Task Store - Client-side copy of fetched and created tasks
//! ============================================================================
//! Holds tasks in arrival order with an id index. A full fetch replaces the
//! collection wholesale; creations and transition snapshots are upserted.
//! ============================================================================

use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::types::{Task, TaskId};

#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire collection with a fresh fetch. No merge with the
    /// previous contents. Duplicate ids keep the last copy at the first slot.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks.clear();
        self.index.clear();
        for task in tasks {
            self.upsert(task);
        }
        debug!("Task store replaced: {} tasks", self.tasks.len());
    }

    /// Add a newly created task without re-fetching
    pub fn append(&mut self, task: Task) {
        debug!("Appending task {}", task.id);
        self.upsert(task);
    }

    /// Adopt the backend's snapshot of one task after a transition
    pub fn apply_snapshot(&mut self, task: Task) {
        debug!("Applying snapshot for task {} ({})", task.id, task.status);
        self.upsert(task);
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Distinct non-blank categories, sorted
    pub fn categories(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter_map(|t| t.category.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn upsert(&mut self, task: Task) {
        match self.index.get(&task.id) {
            Some(&i) => self.tasks[i] = task,
            None => {
                self.index.insert(task.id.clone(), self.tasks.len());
                self.tasks.push(task);
            }
        }
    }
}

impl<'a> IntoIterator for &'a TaskStore {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_task;
    use crate::types::TaskStatus;
    use chrono::Utc;

    #[test]
    fn test_replace_all_discards_previous_contents() {
        let now = Utc::now();
        let mut store = TaskStore::new();
        store.replace_all(vec![open_task("a", "u1", now, 1), open_task("b", "u1", now, 2)]);
        assert_eq!(store.len(), 2);

        store.replace_all(vec![open_task("c", "u2", now, 1)]);
        assert_eq!(store.len(), 1);
        assert!(store.get("a").is_none());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_replace_all_dedupes_ids() {
        let now = Utc::now();
        let mut second = open_task("a", "u1", now, 1);
        second.title = "second copy".to_string();

        let mut store = TaskStore::new();
        store.replace_all(vec![open_task("a", "u1", now, 1), open_task("b", "u1", now, 1), second]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.tasks()[0].title, "second copy");
    }

    #[test]
    fn test_append_and_get() {
        let now = Utc::now();
        let mut store = TaskStore::new();
        assert!(store.get("missing").is_none());

        store.append(open_task("new", "u1", now, 0));
        assert_eq!(store.get("new").map(|t| t.created_by.as_str()), Some("u1"));
    }

    #[test]
    fn test_apply_snapshot_replaces_in_place() {
        let now = Utc::now();
        let mut store = TaskStore::new();
        store.replace_all(vec![open_task("a", "u1", now, 1), open_task("b", "u1", now, 2)]);

        let mut snapshot = open_task("a", "u1", now, 1);
        snapshot.status = TaskStatus::Assigned;
        snapshot.assigned_to = Some("u2".to_string());
        store.apply_snapshot(snapshot);

        assert_eq!(store.len(), 2);
        assert_eq!(store.tasks()[0].id, "a");
        assert_eq!(store.get("a").unwrap().status, TaskStatus::Assigned);
    }

    #[test]
    fn test_categories_distinct_and_sorted() {
        let now = Utc::now();
        let mut legal = open_task("a", "u1", now, 1);
        legal.category = Some("Legal".to_string());
        let mut editing = open_task("b", "u1", now, 1);
        editing.category = Some("Editing".to_string());
        let mut legal_again = open_task("c", "u1", now, 1);
        legal_again.category = Some("Legal".to_string());
        let mut blank = open_task("d", "u1", now, 1);
        blank.category = Some("  ".to_string());

        let mut store = TaskStore::new();
        store.replace_all(vec![legal, editing, legal_again, blank, open_task("e", "u1", now, 1)]);

        assert_eq!(store.categories(), vec!["Editing".to_string(), "Legal".to_string()]);
    }
}
