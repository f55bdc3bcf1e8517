//! ============================================================================
//! HTTP Backend - REST client for the marketplace service
//! ============================================================================
//! Every response body is wrapped as `{ "data": ... }`. Authenticated calls
//! carry `Authorization: Bearer <accessToken>`.
//! ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::{BackendError, MarketplaceBackend};
use crate::lifecycle::Transition;
use crate::types::*;

/// Default service location for local development
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

/// Map a non-success response to an error
fn status_error(status: u16, body: String) -> BackendError {
    match status {
        401 | 403 => BackendError::Unauthorized,
        404 => BackendError::NotFound(body),
        _ => BackendError::Status { status, body },
    }
}

fn bearer(session: &Session) -> String {
    format!("Bearer {}", session.access_token)
}

/// REST implementation of the marketplace backend
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("peertask/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self::with_client(client, base_url)
    }

    /// Share an existing client (connection pool) with other components
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and unwrap the `data` envelope
    async fn send<T: DeserializeOwned>(
        &self,
        label: &str,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        debug!("{}: sending request", label);

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(format!("{}: {}", label, e)))?;

        envelope
            .data
            .ok_or_else(|| BackendError::Decode(format!("{}: response has no data", label)))
    }

    fn transition_path(task_id: &str, transition: &Transition) -> String {
        format!("tasks/{}/{}", task_id, transition.name())
    }
}

#[async_trait]
impl MarketplaceBackend for HttpBackend {
    async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        info!("Registering {}", email);
        let request = self
            .client
            .post(self.url("users/register"))
            .json(&json!({ "fullName": full_name, "email": email, "password": password }));
        self.send("register", request).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        info!("Logging in {}", email);
        let request = self
            .client
            .post(self.url("users/login"))
            .json(&json!({ "email": email, "password": password }));
        self.send("login", request).await
    }

    async fn update_details(
        &self,
        session: &Session,
        update: &ProfileUpdate,
    ) -> Result<ProfileDetails, BackendError> {
        let request = self
            .client
            .post(self.url("users/update_details"))
            .header("Authorization", bearer(session))
            .json(update);
        self.send("update_details", request).await
    }

    async fn create_task(&self, session: &Session, task: &NewTask) -> Result<Task, BackendError> {
        info!("Creating task: {}", task.title);
        let request = self
            .client
            .post(self.url("tasks/create-task"))
            .header("Authorization", bearer(session))
            .json(task);
        self.send("create_task", request).await
    }

    async fn browse_tasks(&self, session: &Session) -> Result<Vec<Task>, BackendError> {
        let request = self
            .client
            .get(self.url("tasks/browse-task"))
            .query(&[("userId", session.user_id())])
            .header("Authorization", bearer(session));
        self.send("browse_tasks", request).await
    }

    async fn transition(
        &self,
        session: &Session,
        task_id: &str,
        transition: &Transition,
    ) -> Result<Task, BackendError> {
        info!("Requesting {} on task {}", transition.name(), task_id);
        let request = self
            .client
            .post(self.url(&Self::transition_path(task_id, transition)))
            .header("Authorization", bearer(session))
            .json(transition);
        self.send(transition.name(), request).await
    }

    async fn create_conversation(
        &self,
        session: &Session,
        receiver_id: &str,
    ) -> Result<Conversation, BackendError> {
        let request = self
            .client
            .post(self.url("messages_route/create-conversation"))
            .header("Authorization", bearer(session))
            .json(&json!({ "senderId": session.user_id(), "recieverId": receiver_id }));
        self.send("create_conversation", request).await
    }

    async fn list_conversations(
        &self,
        session: &Session,
    ) -> Result<Vec<Conversation>, BackendError> {
        let request = self
            .client
            .get(self.url("messages_route/get-all-conversations"))
            .query(&[("userId", session.user_id())])
            .header("Authorization", bearer(session));
        self.send("list_conversations", request).await
    }

    async fn receiver_details(
        &self,
        session: &Session,
        user_ids: &[UserId],
    ) -> Result<Vec<ReceiverDetails>, BackendError> {
        let request = self
            .client
            .post(self.url("messages_route/get-all-reciever-details"))
            .header("Authorization", bearer(session))
            .json(&json!({ "recieverIds": user_ids }));
        self.send("receiver_details", request).await
    }

    async fn load_messages(
        &self,
        session: &Session,
        conversation_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Message>, BackendError> {
        let request = self
            .client
            .post(self.url("messages_route/get-messages"))
            .header("Authorization", bearer(session))
            .json(&json!({
                "senderId": session.user_id(),
                "conversationId": conversation_id,
                "timeStamp": before,
                "limit": limit,
            }));
        self.send("load_messages", request).await
    }

    async fn send_message(
        &self,
        session: &Session,
        conversation_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<Message, BackendError> {
        let request = self
            .client
            .post(self.url("messages_route/send-message"))
            .header("Authorization", bearer(session))
            .json(&json!({
                "content": content,
                "conversationId": conversation_id,
                "senderId": session.user_id(),
                "recieverId": receiver_id,
            }));
        self.send("send_message", request).await
    }
}
