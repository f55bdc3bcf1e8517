//! ============================================================================
//! In-Memory Backend - Authoritative marketplace service inside the process
//! ============================================================================
//! Holds users, tasks, conversations and messages behind one async lock and
//! enforces the same lifecycle rules the real service does. Used by the test
//! suite and by the CLI's offline mode.
//! ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::{BackendError, MarketplaceBackend};
use crate::lifecycle::{RejectionPolicy, Transition};
use crate::types::*;

#[derive(Debug, Clone)]
struct Account {
    profile: UserProfile,
    password: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<UserId, Account>,
    emails: HashMap<String, UserId>,
    tokens: HashMap<String, UserId>,
    tasks: Vec<Task>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
}

impl MemoryState {
    fn issue_session(&mut self, profile: UserProfile) -> Session {
        let access_token = Uuid::new_v4().to_string();
        self.tokens.insert(access_token.clone(), profile.id.clone());
        Session {
            access_token,
            user: profile,
        }
    }

    fn task_mut(&mut self, task_id: &str) -> Result<&mut Task, BackendError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| BackendError::NotFound(format!("task {}", task_id)))
    }

    fn conversation_for(
        &self,
        conversation_id: &str,
        viewer: &str,
    ) -> Result<&Conversation, BackendError> {
        let conversation = self
            .conversations
            .iter()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| BackendError::NotFound(format!("conversation {}", conversation_id)))?;

        if conversation.sender_id != viewer && conversation.receiver_id != viewer {
            return Err(BackendError::Unauthorized);
        }
        Ok(conversation)
    }
}

fn bad_request(body: impl Into<String>) -> BackendError {
    BackendError::Status {
        status: 400,
        body: body.into(),
    }
}

/// In-process marketplace service
#[derive(Clone)]
pub struct InMemoryBackend {
    state: Arc<RwLock<MemoryState>>,
    policy: RejectionPolicy,
    trust_sessions: bool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            policy: RejectionPolicy::default(),
            trust_sessions: false,
        }
    }

    /// Start from an existing set of tasks
    pub fn seeded(tasks: Vec<Task>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState {
                tasks,
                ..Default::default()
            })),
            ..Self::new()
        }
    }

    pub fn with_policy(mut self, policy: RejectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Accept any session, even one this instance never issued. The offline
    /// CLI restores sessions from disk across process runs.
    pub fn trusting(mut self) -> Self {
        self.trust_sessions = true;
        self
    }

    /// Current copy of every task, in insertion order
    pub async fn tasks(&self) -> Vec<Task> {
        self.state.read().await.tasks.clone()
    }

    /// Seed one task directly, bypassing validation
    pub async fn insert_task(&self, task: Task) {
        self.state.write().await.tasks.push(task);
    }

    async fn admit(&self, session: &Session) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        let known = state
            .tokens
            .get(&session.access_token)
            .map_or(false, |user_id| user_id == session.user_id());
        if known {
            return Ok(());
        }
        if !self.trust_sessions || session.user_id().is_empty() {
            return Err(BackendError::Unauthorized);
        }

        if !state.accounts.contains_key(session.user_id()) {
            state.accounts.insert(
                session.user.id.clone(),
                Account {
                    profile: session.user.clone(),
                    password: String::new(),
                },
            );
            state
                .emails
                .insert(session.user.email.to_lowercase(), session.user.id.clone());
        }
        state
            .tokens
            .insert(session.access_token.clone(), session.user.id.clone());
        Ok(())
    }
}

#[async_trait]
impl MarketplaceBackend for InMemoryBackend {
    async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let email_key = email.trim().to_lowercase();
        let mut state = self.state.write().await;

        if state.emails.contains_key(&email_key) {
            return Err(BackendError::Status {
                status: 409,
                body: format!("{} is already registered", email_key),
            });
        }

        let profile = UserProfile {
            id: Uuid::new_v4().to_string(),
            full_name: full_name.trim().to_string(),
            email: email_key.clone(),
            bio: None,
            skills: Vec::new(),
            avatar: None,
            created_at: Some(Utc::now()),
        };

        info!("Registered user {} ({})", profile.id, email_key);
        state.emails.insert(email_key, profile.id.clone());
        state.accounts.insert(
            profile.id.clone(),
            Account {
                profile: profile.clone(),
                password: password.to_string(),
            },
        );
        Ok(state.issue_session(profile))
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let email_key = email.trim().to_lowercase();
        let mut state = self.state.write().await;

        let profile = state
            .emails
            .get(&email_key)
            .and_then(|id| state.accounts.get(id))
            .filter(|account| account.password == password)
            .map(|account| account.profile.clone())
            .ok_or(BackendError::Unauthorized)?;

        Ok(state.issue_session(profile))
    }

    async fn update_details(
        &self,
        session: &Session,
        update: &ProfileUpdate,
    ) -> Result<ProfileDetails, BackendError> {
        self.admit(session).await?;
        let mut state = self.state.write().await;

        let account = state
            .accounts
            .get_mut(session.user_id())
            .ok_or_else(|| BackendError::NotFound(format!("user {}", session.user_id())))?;

        let profile = &mut account.profile;
        if let Some(full_name) = &update.full_name {
            profile.full_name = full_name.clone();
        }
        if let Some(bio) = &update.bio {
            profile.bio = Some(bio.clone());
        }
        if let Some(skills) = &update.skills {
            profile.skills = skills.clone();
        }
        if let Some(avatar) = &update.avatar {
            profile.avatar = Some(avatar.clone());
        }

        Ok(profile.clone().into())
    }

    async fn create_task(&self, session: &Session, task: &NewTask) -> Result<Task, BackendError> {
        self.admit(session).await?;
        let now = Utc::now();
        task.validate(now).map_err(bad_request)?;

        let created = Task {
            id: Uuid::new_v4().to_string(),
            title: task.title.trim().to_string(),
            description: task.description.clone(),
            requirements: task.requirements.clone(),
            budget: task.budget,
            deadline: task.deadline,
            category: task.category.clone(),
            tags: task.tags.clone(),
            status: TaskStatus::Open,
            created_by: session.user_id().to_string(),
            created_at: now,
            assigned_to: None,
            assigned_at: None,
            completed_at: None,
            applicants: Vec::new(),
            payment_status: None,
            attachments: Vec::new(),
        };

        debug!("Created task {} for {}", created.id, created.created_by);
        self.state.write().await.tasks.push(created.clone());
        Ok(created)
    }

    async fn browse_tasks(&self, session: &Session) -> Result<Vec<Task>, BackendError> {
        self.admit(session).await?;
        Ok(self.state.read().await.tasks.clone())
    }

    async fn transition(
        &self,
        session: &Session,
        task_id: &str,
        transition: &Transition,
    ) -> Result<Task, BackendError> {
        self.admit(session).await?;
        let mut state = self.state.write().await;

        let task = state.task_mut(task_id)?;
        let next = transition.apply_to(task, session.user_id(), Utc::now(), self.policy)?;
        *task = next.clone();

        debug!("Task {} is now {}", task_id, next.status);
        Ok(next)
    }

    async fn create_conversation(
        &self,
        session: &Session,
        receiver_id: &str,
    ) -> Result<Conversation, BackendError> {
        self.admit(session).await?;
        if receiver_id == session.user_id() {
            return Err(bad_request("cannot start a conversation with yourself"));
        }

        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            sender_id: session.user_id().to_string(),
            receiver_id: receiver_id.to_string(),
            updated_at: Some(Utc::now()),
        };

        self.state
            .write()
            .await
            .conversations
            .push(conversation.clone());
        Ok(conversation)
    }

    async fn list_conversations(
        &self,
        session: &Session,
    ) -> Result<Vec<Conversation>, BackendError> {
        self.admit(session).await?;
        let viewer = session.user_id();

        let mut conversations: Vec<Conversation> = self
            .state
            .read()
            .await
            .conversations
            .iter()
            .filter(|c| c.sender_id == viewer || c.receiver_id == viewer)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn receiver_details(
        &self,
        session: &Session,
        user_ids: &[UserId],
    ) -> Result<Vec<ReceiverDetails>, BackendError> {
        self.admit(session).await?;
        let state = self.state.read().await;

        Ok(user_ids
            .iter()
            .filter_map(|id| state.accounts.get(id))
            .map(|account| ReceiverDetails {
                id: account.profile.id.clone(),
                full_name: account.profile.full_name.clone(),
                avatar: account.profile.avatar.clone(),
            })
            .collect())
    }

    async fn load_messages(
        &self,
        session: &Session,
        conversation_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Message>, BackendError> {
        self.admit(session).await?;
        let viewer = session.user_id();
        let mut state = self.state.write().await;
        state.conversation_for(conversation_id, viewer)?;

        let mut page: Vec<&mut Message> = state
            .messages
            .iter_mut()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| before.map_or(true, |b| m.timestamp < b))
            .collect();
        page.sort_by_key(|m| m.timestamp);
        let skip = page.len().saturating_sub(limit);

        // Reading a page marks what was sent to the viewer as read
        Ok(page
            .into_iter()
            .skip(skip)
            .map(|m| {
                if m.receiver_id == viewer {
                    m.read = true;
                }
                m.clone()
            })
            .collect())
    }

    async fn send_message(
        &self,
        session: &Session,
        conversation_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<Message, BackendError> {
        self.admit(session).await?;
        if content.trim().is_empty() {
            return Err(bad_request("message content must not be empty"));
        }

        let sender = session.user_id();
        let mut state = self.state.write().await;
        let counterpart = state
            .conversation_for(conversation_id, sender)?
            .counterpart(sender)
            .to_string();
        if counterpart != receiver_id {
            return Err(bad_request(format!(
                "{} is not part of conversation {}",
                receiver_id, conversation_id
            )));
        }

        // Keep timestamps strictly increasing within a conversation
        let latest = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .map(|m| m.timestamp)
            .max();
        let mut timestamp = Utc::now();
        if let Some(latest) = latest {
            if timestamp <= latest {
                timestamp = latest + Duration::milliseconds(1);
            }
        }

        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            timestamp,
            read: false,
        };

        if let Some(conversation) = state
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            conversation.updated_at = Some(timestamp);
        }
        state.messages.push(message.clone());
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleError;
    use crate::test_support::{open_task, session};

    async fn two_users(backend: &InMemoryBackend) -> (Session, Session) {
        let creator = backend.register("Riya", "riya@uni.edu", "pw1").await.unwrap();
        let doer = backend.register("Sam", "sam@uni.edu", "pw2").await.unwrap();
        (creator, doer)
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let backend = InMemoryBackend::new();
        let registered = backend.register("Riya", "Riya@Uni.edu", "pw").await.unwrap();
        assert_eq!(registered.user.email, "riya@uni.edu");

        let again = backend.register("Other", "riya@uni.edu", "pw").await;
        assert!(matches!(again, Err(BackendError::Status { status: 409, .. })));

        let session = backend.login("riya@uni.edu", "pw").await.unwrap();
        assert_eq!(session.user_id(), registered.user_id());
        assert_ne!(session.access_token, registered.access_token);

        let wrong = backend.login("riya@uni.edu", "nope").await;
        assert!(matches!(wrong, Err(BackendError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_unknown_session_rejected_unless_trusting() {
        let now = Utc::now();
        let backend = InMemoryBackend::seeded(vec![open_task("T1", "U2", now, 1)]);
        let stranger = session("U1");

        assert!(matches!(
            backend.browse_tasks(&stranger).await,
            Err(BackendError::Unauthorized)
        ));

        let trusting = InMemoryBackend::seeded(vec![open_task("T1", "U2", now, 1)]).trusting();
        assert_eq!(trusting.browse_tasks(&stranger).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transitions_enforced() {
        let backend = InMemoryBackend::new();
        let (creator, doer) = two_users(&backend).await;

        let task = backend
            .create_task(
                &creator,
                &NewTask {
                    title: "Format bibliography".to_string(),
                    description: "APA style".to_string(),
                    requirements: None,
                    budget: 25.0,
                    deadline: Utc::now() + Duration::days(3),
                    category: Some("Editing".to_string()),
                    tags: Vec::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(task.created_by, creator.user_id());

        let apply = Transition::Apply {
            cover_letter: "Done this before".to_string(),
        };
        let applied = backend.transition(&doer, &task.id, &apply).await.unwrap();
        assert_eq!(applied.applicants.len(), 1);

        let premature = backend.transition(&creator, &task.id, &Transition::Pay).await;
        assert!(matches!(
            premature,
            Err(BackendError::Rejected(LifecycleError::NotCompleted(_)))
        ));

        let assign = Transition::Assign {
            applicant_id: doer.user_id().to_string(),
        };
        backend.transition(&creator, &task.id, &assign).await.unwrap();
        backend.transition(&doer, &task.id, &Transition::Complete).await.unwrap();
        let paid = backend.transition(&creator, &task.id, &Transition::Pay).await.unwrap();

        assert_eq!(paid.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(backend.tasks().await[0], paid);
    }

    #[tokio::test]
    async fn test_create_task_validates() {
        let backend = InMemoryBackend::new();
        let (creator, _) = two_users(&backend).await;

        let result = backend
            .create_task(
                &creator,
                &NewTask {
                    title: "Late".to_string(),
                    description: String::new(),
                    requirements: None,
                    budget: 10.0,
                    deadline: Utc::now() - Duration::hours(1),
                    category: None,
                    tags: Vec::new(),
                },
            )
            .await;
        assert!(matches!(result, Err(BackendError::Status { status: 400, .. })));
        assert!(backend.tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_messages_paged_and_marked_read() {
        let backend = InMemoryBackend::new();
        let (a, b) = two_users(&backend).await;

        let conversation = backend.create_conversation(&a, b.user_id()).await.unwrap();
        for i in 0..5 {
            backend
                .send_message(&a, &conversation.id, b.user_id(), &format!("msg {}", i))
                .await
                .unwrap();
        }

        let latest = backend.load_messages(&b, &conversation.id, None, 2).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].content, "msg 3");
        assert_eq!(latest[1].content, "msg 4");
        assert!(latest.iter().all(|m| m.read));

        let older = backend
            .load_messages(&b, &conversation.id, Some(latest[0].timestamp), 20)
            .await
            .unwrap();
        assert_eq!(older.len(), 3);
        assert_eq!(older[0].content, "msg 0");
    }

    #[tokio::test]
    async fn test_outsider_cannot_read_conversation() {
        let backend = InMemoryBackend::new();
        let (a, b) = two_users(&backend).await;
        let outsider = backend.register("Eve", "eve@uni.edu", "pw").await.unwrap();

        let conversation = backend.create_conversation(&a, b.user_id()).await.unwrap();
        let result = backend.load_messages(&outsider, &conversation.id, None, 20).await;
        assert!(matches!(result, Err(BackendError::Unauthorized)));

        let misdirected = backend
            .send_message(&a, &conversation.id, outsider.user_id(), "hi")
            .await;
        assert!(matches!(misdirected, Err(BackendError::Status { status: 400, .. })));
    }

    #[tokio::test]
    async fn test_update_details_and_receiver_details() {
        let backend = InMemoryBackend::new();
        let (a, b) = two_users(&backend).await;

        let updated = backend
            .update_details(
                &b,
                &ProfileUpdate {
                    bio: Some("Stats tutor".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Stats tutor"));
        assert_eq!(updated.full_name.as_deref(), Some("Sam"));

        let details = backend
            .receiver_details(&a, &[b.user_id().to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].full_name, "Sam");
    }
}
