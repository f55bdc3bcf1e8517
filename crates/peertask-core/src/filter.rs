//! ============================================================================
//! Visibility Filter - Which tasks a viewer sees
//! ============================================================================
//! Pure functions over a task collection. Nothing here touches the network
//! or mutates state, so callers recompute on every input change.
//!
//! Browse order of operations:
//! 1. status must be open
//! 2. viewer must not be the creator
//! 3. deadline must not be in the past
//! 4. free-text search over title, description and tags
//! 5. category
//! 6. budget bounds
//! 7. newest first by creation time (stable)
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Task, TaskStatus};

/// Ad-hoc browse criteria. Every field is optional and independent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowseCriteria {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub min_budget: Option<f64>,
    #[serde(default)]
    pub max_budget: Option<f64>,
}

impl BrowseCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = term.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_min_budget(mut self, min: f64) -> Self {
        self.min_budget = Some(min);
        self
    }

    pub fn with_max_budget(mut self, max: f64) -> Self {
        self.max_budget = Some(max);
        self
    }

    /// True when no criterion narrows the result
    pub fn is_cleared(&self) -> bool {
        self.search_term().is_none()
            && self.category_filter().is_none()
            && self.min_budget.is_none()
            && self.max_budget.is_none()
    }

    fn search_term(&self) -> Option<String> {
        let term = self.search.trim();
        (!term.is_empty()).then(|| term.to_lowercase())
    }

    /// Labels compare trimmed, the same way `TaskStore::categories` lists them
    fn category_filter(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    /// Search, category and budget criteria
    fn admits(&self, task: &Task, needle: Option<&str>) -> bool {
        if let Some(needle) = needle {
            if !task.matches_search(needle) {
                return false;
            }
        }

        if let Some(category) = self.category_filter() {
            if task.category.as_deref().map(str::trim) != Some(category) {
                return false;
            }
        }

        if let Some(min) = self.min_budget {
            if task.budget < min {
                return false;
            }
        }
        if let Some(max) = self.max_budget {
            if task.budget > max {
                return false;
            }
        }

        true
    }
}

/// Steps 1-3: open, not the viewer's own, not expired
pub fn is_browsable(task: &Task, viewer: &str, now: DateTime<Utc>) -> bool {
    task.is_open() && !task.is_created_by(viewer) && !task.is_expired(now)
}

/// Compute the browse view for `viewer` at instant `now`
pub fn browse<'a, I>(
    tasks: I,
    viewer: &str,
    criteria: &BrowseCriteria,
    now: DateTime<Utc>,
) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let needle = criteria.search_term();

    let mut visible: Vec<&Task> = tasks
        .into_iter()
        .filter(|t| is_browsable(t, viewer, now))
        .filter(|t| criteria.admits(t, needle.as_deref()))
        .collect();

    newest_first(&mut visible);
    visible
}

/// Relationship between the viewer and a task in the history view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryView {
    /// Tasks the viewer posted
    Created,
    /// Tasks the viewer is fulfilling or has fulfilled
    Assigned,
    /// Tasks the viewer applied to but was not assigned
    Applied,
}

impl HistoryView {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "created" => Some(HistoryView::Created),
            "assigned" => Some(HistoryView::Assigned),
            "applied" => Some(HistoryView::Applied),
            _ => None,
        }
    }
}

/// Tasks related to `viewer` through `view`, optionally narrowed to one
/// status, newest first
pub fn history<'a, I>(
    tasks: I,
    viewer: &str,
    view: HistoryView,
    status: Option<TaskStatus>,
) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut related: Vec<&Task> = tasks
        .into_iter()
        .filter(|t| match view {
            HistoryView::Created => t.is_created_by(viewer),
            HistoryView::Assigned => t.is_assigned_to(viewer),
            HistoryView::Applied => t.has_applied(viewer) && !t.is_assigned_to(viewer),
        })
        .filter(|t| status.map_or(true, |s| t.status == s))
        .collect();

    newest_first(&mut related);
    related
}

// sort_by is stable: equal timestamps keep input order
fn newest_first(tasks: &mut [&Task]) {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
