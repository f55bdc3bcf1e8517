//! ============================================================================
//! Core Types for the PeerTask Engine
//! ============================================================================
//! Data model shared by the task store, visibility filter, lifecycle rules
//! and the backend clients. Field names follow the backend's camelCase JSON;
//! Mongo-style `_id` keys are accepted wherever an `id` is expected.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub type TaskId = String;
pub type UserId = String;
pub type ConversationId = String;

/// Treats an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Assigned,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "open" => Some(TaskStatus::Open),
            "assigned" | "in-progress" | "in_progress" => Some(TaskStatus::Assigned),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment sub-state, only meaningful once a task is completed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A viewer's application to an open task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub user_id: UserId,
    pub applied_at: DateTime<Utc>,
    #[serde(default)]
    pub cover_letter: String,
    pub status: ApplicationStatus,
}

/// File descriptor attached to a task. Opaque to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// A unit of work posted by one viewer and optionally fulfilled by another
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(alias = "_id")]
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    pub budget: f64,
    pub deadline: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    pub status: TaskStatus,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub applicants: Vec<Application>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
}

/// Structural invariant a task snapshot can break
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("assignedTo must be set exactly when status is assigned or completed")]
    AssigneeMismatch,
    #[error("applicants must be empty once the task is completed")]
    ApplicantsAfterCompletion,
    #[error("paymentStatus must be present exactly when status is completed")]
    PaymentMismatch,
}

impl Task {
    pub fn is_open(&self) -> bool {
        self.status == TaskStatus::Open
    }

    /// Deadline strictly before `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline < now
    }

    pub fn is_created_by(&self, viewer: &str) -> bool {
        self.created_by == viewer
    }

    pub fn is_assigned_to(&self, viewer: &str) -> bool {
        self.assigned_to.as_deref() == Some(viewer)
    }

    pub fn has_applied(&self, viewer: &str) -> bool {
        self.applicants.iter().any(|a| a.user_id == viewer)
    }

    /// Case-insensitive substring match over title, description and tags.
    /// `needle` must already be lowercased.
    pub fn matches_search(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }

    /// Lists every structural invariant this snapshot breaks
    pub fn invariant_violations(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        let needs_assignee = matches!(self.status, TaskStatus::Assigned | TaskStatus::Completed);
        if needs_assignee != self.assigned_to.is_some() {
            violations.push(InvariantViolation::AssigneeMismatch);
        }
        if self.status == TaskStatus::Completed && !self.applicants.is_empty() {
            violations.push(InvariantViolation::ApplicantsAfterCompletion);
        }
        if (self.status == TaskStatus::Completed) != self.payment_status.is_some() {
            violations.push(InvariantViolation::PaymentMismatch);
        }

        violations
    }
}

/// Payload for creating a task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    pub budget: f64,
    pub deadline: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewTask {
    /// Checks the payload before it is sent. A task whose deadline is not in
    /// the future could never appear in anyone's browse view.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if !self.budget.is_finite() || self.budget < 0.0 {
            return Err(format!("budget must be a non-negative amount, got {}", self.budget));
        }
        if self.deadline <= now {
            return Err(format!("deadline {} is not in the future", self.deadline));
        }
        Ok(())
    }
}

// ============================================================================
// Users & Sessions
// ============================================================================

/// Public profile of a registered user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Signed-in identity: bearer credential plus the user it belongs to.
/// Passed explicitly to every authenticated call.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub user: UserProfile,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Partial profile update; unset fields are left unchanged by the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.bio.is_none()
            && self.skills.is_none()
            && self.avatar.is_none()
    }
}

/// Profile fields as echoed back by an update. Any of them may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<UserProfile> for ProfileDetails {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: Some(profile.id),
            full_name: Some(profile.full_name),
            email: Some(profile.email),
            bio: profile.bio,
            skills: Some(profile.skills),
            avatar: profile.avatar,
        }
    }
}

impl UserProfile {
    /// Overlay the fields present in `details`. The id never changes.
    pub fn merge(&mut self, details: ProfileDetails) {
        if let Some(full_name) = details.full_name {
            self.full_name = full_name;
        }
        if let Some(email) = details.email {
            self.email = email;
        }
        if details.bio.is_some() {
            self.bio = details.bio;
        }
        if let Some(skills) = details.skills {
            self.skills = skills;
        }
        if details.avatar.is_some() {
            self.avatar = details.avatar;
        }
    }
}

// ============================================================================
// Messaging
// ============================================================================

/// Conversation between two participants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(alias = "_id")]
    pub id: ConversationId,
    pub sender_id: UserId,
    /// Spelled the way the backend spells it
    #[serde(rename = "recieverId")]
    pub receiver_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// True if the conversation is between `a` and `b`, in either direction
    pub fn involves(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }

    /// The participant that is not `viewer`
    pub fn counterpart(&self, viewer: &str) -> &str {
        if self.sender_id == viewer {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(alias = "_id")]
    pub id: String,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    #[serde(rename = "recieverId")]
    pub receiver_id: UserId,
    pub content: String,
    #[serde(alias = "createdAt")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// Display details for a conversation counterpart
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverDetails {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

// ============================================================================
// Blog
// ============================================================================

/// Blog post ids are integers in the datastore but some deployments use uuids
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BlogPostId {
    Int(i64),
    Text(String),
}

impl fmt::Display for BlogPostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlogPostId::Int(n) => write!(f, "{}", n),
            BlogPostId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlogPost {
    pub id: BlogPostId,
    pub title: String,
    pub content: String,
    /// Older rows may have no author
    #[serde(default)]
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BlogPost {
    pub fn author(&self) -> &str {
        self.author_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("Anonymous")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBlogPost {
    pub title: String,
    pub content: String,
    pub author_name: String,
}
