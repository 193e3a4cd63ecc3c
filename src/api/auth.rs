use crate::config::BackendConfig;
use crate::error::AppError;
use crate::storage::{LocalStore, StoreKey};
use kiln_auth::{AuthEvent, AuthService, AuthUser, Session};
use std::sync::Arc;
use tokio::sync::watch;

/// Auth endpoints plus persistence of the session between runs.
///
/// Clones share one service, so a restore running on a spawned task
/// notifies the same subscribers.
#[derive(Clone)]
pub struct AuthGateway {
    service: Arc<AuthService>,
    store: LocalStore,
    reset_redirect: Option<String>,
}

impl AuthGateway {
    pub fn new(
        backend: &BackendConfig,
        store: LocalStore,
        reset_redirect: Option<String>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            service: Arc::new(AuthService::new(&backend.url, &backend.anon_key)?),
            store,
            reset_redirect,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AuthEvent>> {
        self.service.subscribe()
    }

    pub fn stored_session(&self) -> Option<Session> {
        self.store.get(StoreKey::AuthSession, None)
    }

    pub fn persist_session(&self, session: Option<&Session>) {
        match session {
            Some(session) => self.store.set(StoreKey::AuthSession, session),
            None => self.store.remove(StoreKey::AuthSession),
        }
    }

    /// Restores the persisted session; always produces the initial
    /// notification, with or without a session.
    ///
    /// The stored session is only dropped when the server rejects its
    /// refresh token. After a network failure it stays for the next run.
    pub async fn restore(&self) -> Option<Session> {
        match self.service.restore_session(self.stored_session()).await {
            Ok(session) => session,
            Err(e) if e.is_rejected() => {
                log::warn!("Stored session rejected, signing out: {}", e);
                self.persist_session(None);
                None
            }
            Err(e) => {
                log::warn!("Could not refresh stored session, keeping it: {}", e);
                None
            }
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Option<Session>, AppError> {
        Ok(self.service.sign_up(email, password, username).await?)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        Ok(self.service.sign_in(email, password).await?)
    }

    pub async fn sign_out(&self) -> Result<(), AppError> {
        self.service.sign_out().await?;
        self.persist_session(None);
        Ok(())
    }

    pub async fn current_user(&self) -> Result<Option<AuthUser>, AppError> {
        Ok(self.service.get_user().await?)
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AppError> {
        Ok(self
            .service
            .reset_password(email, self.reset_redirect.as_deref())
            .await?)
    }

    pub async fn update_password(&self, new_password: &str) -> Result<AuthUser, AppError> {
        Ok(self.service.update_password(new_password).await?)
    }
}
