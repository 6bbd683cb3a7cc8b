mod identity_toolkit;

pub use identity_toolkit::IdentityToolkitProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::storage::{LocalStorage, AUTH_KEY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl User {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// A signed-in user plus the tokens the hosted service issued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: User,
    pub id_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account with this email already exists")]
    EmailExists,
    #[error("Password is too weak")]
    WeakPassword,
    #[error("No account found for this email")]
    UserNotFound,
    #[error("Identity service error: {0}")]
    Service(String),
    #[error("Network Error: {0}")]
    Network(String),
    #[error("Session storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthSession, AuthError>;

    async fn sign_in_with_provider(
        &self,
        provider_id: &str,
        access_token: &str,
    ) -> Result<AuthSession, AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError>;
}

/// Owns the signed-in session for the whole process.
///
/// Built once at startup and handed to whatever needs it. Views that care
/// about sign-in changes hold a [`watch::Receiver`] from [`subscribe`].
///
/// [`subscribe`]: AuthGateway::subscribe
pub struct AuthGateway {
    provider: Box<dyn IdentityProvider>,
    storage: LocalStorage,
    session: Option<AuthSession>,
    tx: watch::Sender<Option<User>>,
}

impl AuthGateway {
    pub fn new(provider: Box<dyn IdentityProvider>, storage: LocalStorage) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            provider,
            storage,
            session: None,
            tx,
        }
    }

    /// Picks up a session persisted by an earlier run.
    pub async fn restore(&mut self) {
        let restored = match self.storage.get_item(AUTH_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<AuthSession>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "ignoring unreadable auth session");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "failed to read auth session");
                None
            }
        };

        if let Some(session) = &restored {
            info!(uid = %session.user.uid, "restored signed-in user");
        }
        self.set_session(restored);
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<User, AuthError> {
        let session = self.provider.sign_in(email, password).await?;
        self.accept(session).await
    }

    pub async fn signup(
        &mut self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let session = self.provider.sign_up(email, password, display_name).await?;
        self.accept(session).await
    }

    pub async fn sign_in_with_provider(
        &mut self,
        provider_id: &str,
        access_token: &str,
    ) -> Result<User, AuthError> {
        let session = self
            .provider
            .sign_in_with_provider(provider_id, access_token)
            .await?;
        self.accept(session).await
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        self.provider.send_password_reset(email).await?;
        info!("password reset email requested");
        Ok(())
    }

    /// Signs out. The local session is cleared even if the provider call fails.
    pub async fn logout(&mut self) {
        if let Some(session) = &self.session {
            if let Err(e) = self.provider.sign_out(session).await {
                warn!(error = %e, "identity service sign-out failed");
            }
        }
        if let Err(e) = self.storage.remove_item(AUTH_KEY).await {
            warn!(error = %e, "failed to clear stored auth session");
        }
        self.set_session(None);
        info!("signed out");
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn id_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id_token.as_str())
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.tx.subscribe()
    }

    async fn accept(&mut self, session: AuthSession) -> Result<User, AuthError> {
        let raw = serde_json::to_string(&session).map_err(|e| AuthError::Storage(e.to_string()))?;
        if let Err(e) = self.storage.set_item(AUTH_KEY, &raw).await {
            // Still signed in for this run
            warn!(error = %e, "failed to persist auth session");
        }

        let user = session.user.clone();
        info!(uid = %user.uid, "signed in");
        self.set_session(Some(session));
        Ok(user)
    }

    fn set_session(&mut self, session: Option<AuthSession>) {
        let user = session.as_ref().map(|s| s.user.clone());
        self.session = session;
        self.tx.send_replace(user);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    struct FakeProvider {
        sign_outs: Arc<AtomicUsize>,
        fail_sign_out: bool,
    }

    fn session_for(email: &str) -> AuthSession {
        AuthSession {
            user: User {
                uid: format!("uid-{}", email),
                email: email.to_string(),
                display_name: None,
            },
            id_token: "id".to_string(),
            refresh_token: "refresh".to_string(),
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
            if password == "correct" {
                Ok(session_for(email))
            } else {
                Err(AuthError::InvalidCredentials)
            }
        }

        async fn sign_up(
            &self,
            email: &str,
            _password: &str,
            display_name: Option<&str>,
        ) -> Result<AuthSession, AuthError> {
            let mut session = session_for(email);
            session.user.display_name = display_name.map(str::to_string);
            Ok(session)
        }

        async fn sign_in_with_provider(
            &self,
            provider_id: &str,
            _access_token: &str,
        ) -> Result<AuthSession, AuthError> {
            Ok(session_for(&format!("someone@{}", provider_id)))
        }

        async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
            if email.contains('@') {
                Ok(())
            } else {
                Err(AuthError::UserNotFound)
            }
        }

        async fn sign_out(&self, _session: &AuthSession) -> Result<(), AuthError> {
            self.sign_outs.fetch_add(1, Ordering::SeqCst);
            if self.fail_sign_out {
                Err(AuthError::Network("offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn gateway(storage: &LocalStorage, fail_sign_out: bool) -> (AuthGateway, Arc<AtomicUsize>) {
        let sign_outs = Arc::new(AtomicUsize::new(0));
        let provider = FakeProvider {
            sign_outs: sign_outs.clone(),
            fail_sign_out,
        };
        (AuthGateway::new(Box::new(provider), storage.clone()), sign_outs)
    }

    #[tokio::test]
    async fn test_login_publishes_and_persists() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let storage = LocalStorage::new(dir.path());
        let (mut auth, _) = gateway(&storage, false);
        let mut rx = auth.subscribe();
        assert!(rx.borrow().is_none());

        let user = auth.login("amina@example.com", "correct").await?;
        assert_eq!(user.email, "amina@example.com");
        assert_eq!(auth.current_user(), Some(&user));
        assert_eq!(auth.id_token(), Some("id"));

        assert!(rx.has_changed()?);
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&user));

        // A fresh gateway picks the session back up
        let (mut again, _) = gateway(&storage, false);
        again.restore().await;
        assert_eq!(again.current_user(), Some(&user));
        Ok(())
    }

    #[tokio::test]
    async fn test_login_error_propagates() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (mut auth, _) = gateway(&LocalStorage::new(dir.path()), false);

        let err = auth.login("amina@example.com", "wrong").await;
        assert!(matches!(err, Err(AuthError::InvalidCredentials)));
        assert!(auth.current_user().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_provider_fails() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let storage = LocalStorage::new(dir.path());
        let (mut auth, sign_outs) = gateway(&storage, true);
        auth.signup("yusuf@example.com", "pw", Some("Yusuf")).await?;
        assert_eq!(auth.current_user().map(User::label), Some("Yusuf"));

        let rx = auth.subscribe();
        auth.logout().await;

        assert_eq!(sign_outs.load(Ordering::SeqCst), 1);
        assert!(auth.current_user().is_none());
        assert!(rx.borrow().is_none());
        assert_eq!(storage.get_item(AUTH_KEY).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_sign_in_and_reset() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (mut auth, _) = gateway(&LocalStorage::new(dir.path()), false);

        let user = auth.sign_in_with_provider("google.com", "access").await?;
        assert_eq!(user.email, "someone@google.com");

        auth.reset_password("a@b.c").await?;
        assert!(matches!(
            auth.reset_password("nobody").await,
            Err(AuthError::UserNotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_ignores_garbage() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let storage = LocalStorage::new(dir.path());
        storage.set_item(AUTH_KEY, "{{{").await?;

        let (mut auth, _) = gateway(&storage, false);
        auth.restore().await;
        assert!(auth.current_user().is_none());
        Ok(())
    }
}
