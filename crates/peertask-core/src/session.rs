//! ============================================================================
//! Session Manager - Sign-in state for one client
//! ============================================================================
//! Holds at most one signed-in `Session`. Nothing reads it implicitly: callers
//! take a copy with `require()` and pass it to every authenticated call.
//! ============================================================================

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::backend::{BackendError, MarketplaceBackend};
use crate::types::{ProfileUpdate, Session};

/// Shortest password accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Not signed in")]
    NotSignedIn,

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn validate_credentials(email: &str, password: &str) -> Result<(), SessionError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => return Err(SessionError::Invalid(format!("'{}' is not an email address", email))),
    }
    if password.is_empty() {
        return Err(SessionError::Invalid("password must not be empty".to_string()));
    }
    Ok(())
}

pub struct SessionManager {
    backend: Arc<dyn MarketplaceBackend>,
    current: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn MarketplaceBackend>) -> Self {
        Self {
            backend,
            current: RwLock::new(None),
        }
    }

    pub async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, SessionError> {
        if full_name.trim().is_empty() {
            return Err(SessionError::Invalid("full name must not be empty".to_string()));
        }
        validate_credentials(email, password)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SessionError::Invalid(format!(
                "password must be at least {} characters long",
                MIN_PASSWORD_LEN
            )));
        }

        let session = self
            .backend
            .register(full_name.trim(), email.trim(), password)
            .await?;
        info!("Registered and signed in as {}", session.user_id());
        *self.current.write().await = Some(session.clone());
        Ok(session)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        validate_credentials(email, password)?;

        let session = self.backend.login(email.trim(), password).await.map_err(|e| {
            warn!("Login failed for {}: {}", email.trim(), e);
            e
        })?;
        info!("Signed in as {}", session.user_id());
        *self.current.write().await = Some(session.clone());
        Ok(session)
    }

    /// Send a profile update and merge the returned profile into the
    /// signed-in session
    pub async fn update_details(&self, update: &ProfileUpdate) -> Result<Session, SessionError> {
        if update.is_empty() {
            return Err(SessionError::Invalid("nothing to update".to_string()));
        }

        let session = self.require().await?;
        let details = self.backend.update_details(&session, update).await?;

        let mut current = self.current.write().await;
        let mut updated = current.clone().unwrap_or(session);
        updated.user.merge(details);
        *current = Some(updated.clone());
        Ok(updated)
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn require(&self) -> Result<Session, SessionError> {
        self.current().await.ok_or(SessionError::NotSignedIn)
    }

    /// Adopt a session persisted by an earlier run
    pub async fn restore(&self, session: Session) {
        *self.current.write().await = Some(session);
    }

    /// Forget the signed-in session; returns it if there was one
    pub async fn logout(&self) -> Option<Session> {
        let previous = self.current.write().await.take();
        if let Some(session) = &previous {
            info!("Signed out {}", session.user_id());
        }
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(InMemoryBackend::new()))
    }

    #[tokio::test]
    async fn test_register_login_logout() {
        let sessions = manager();
        assert!(matches!(sessions.require().await, Err(SessionError::NotSignedIn)));

        let registered = sessions.register("Noor", "noor@uni.edu", "secret").await.unwrap();
        assert_eq!(sessions.current().await, Some(registered.clone()));

        let signed_out = sessions.logout().await.unwrap();
        assert_eq!(signed_out.user_id(), registered.user_id());
        assert!(sessions.current().await.is_none());

        let again = sessions.login("noor@uni.edu", "secret").await.unwrap();
        assert_eq!(again.user_id(), registered.user_id());
    }

    #[tokio::test]
    async fn test_input_validation() {
        let sessions = manager();
        assert!(matches!(
            sessions.register(" ", "a@b.io", "pw").await,
            Err(SessionError::Invalid(_))
        ));
        assert!(matches!(
            sessions.register("Noor", "noor@uni.edu", "short").await,
            Err(SessionError::Invalid(_))
        ));
        assert!(matches!(
            sessions.login("not-an-email", "pw").await,
            Err(SessionError::Invalid(_))
        ));
        assert!(matches!(
            sessions.login("a@b.io", "").await,
            Err(SessionError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_login_keeps_previous_session() {
        let sessions = manager();
        let registered = sessions.register("Noor", "noor@uni.edu", "secret").await.unwrap();

        let result = sessions.login("noor@uni.edu", "wrong").await;
        assert!(matches!(result, Err(SessionError::Backend(BackendError::Unauthorized))));
        assert_eq!(sessions.current().await, Some(registered));
    }

    #[tokio::test]
    async fn test_update_details_merges_profile() {
        let sessions = manager();
        let registered = sessions.register("Noor", "noor@uni.edu", "secret").await.unwrap();

        let update = ProfileUpdate {
            skills: Some(vec!["Python".to_string(), "Statistics".to_string()]),
            ..Default::default()
        };
        let updated = sessions.update_details(&update).await.unwrap();

        assert_eq!(updated.access_token, registered.access_token);
        assert_eq!(updated.user.skills.len(), 2);
        assert_eq!(updated.user.full_name, "Noor");
        assert_eq!(sessions.current().await, Some(updated));

        assert!(matches!(
            sessions.update_details(&ProfileUpdate::default()).await,
            Err(SessionError::Invalid(_))
        ));
    }
}
