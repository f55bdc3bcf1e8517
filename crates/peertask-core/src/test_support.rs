//! ============================================================================
//! Test Support - Fixtures shared by the unit tests
//! ============================================================================

use chrono::{DateTime, Duration, Utc};

use crate::types::*;

/// Open task created `age_hours` before `now`, due a week after `now`
pub fn open_task(id: &str, created_by: &str, now: DateTime<Utc>, age_hours: i64) -> Task {
    Task {
        id: id.to_string(),
        title: format!("Task {}", id),
        description: "Help needed with a document".to_string(),
        requirements: None,
        budget: 100.0,
        deadline: now + Duration::days(7),
        category: None,
        tags: Vec::new(),
        status: TaskStatus::Open,
        created_by: created_by.to_string(),
        created_at: now - Duration::hours(age_hours),
        assigned_to: None,
        assigned_at: None,
        completed_at: None,
        applicants: Vec::new(),
        payment_status: None,
        attachments: Vec::new(),
    }
}

pub fn profile(id: &str) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        full_name: format!("User {}", id),
        email: format!("{}@example.com", id),
        bio: None,
        skills: Vec::new(),
        avatar: None,
        created_at: None,
    }
}

pub fn session(id: &str) -> Session {
    Session {
        access_token: format!("token-{}", id),
        user: profile(id),
    }
}
