//! Identity and session lifecycle
//!
//! One [`IdentityContext`] is built at startup and passed to whoever needs
//! the signed-in user. It owns the auth subscription and the session restore
//! for as long as it lives; [`IdentityContext::shutdown`] drops both.

use crate::api::auth::AuthGateway;
use crate::api::{self, Gateway};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{Profile, ProfileUpdate};
use crate::services::retry::RetryPolicy;
use crate::services::sync::SyncMode;
use crate::storage::{LocalStore, StoreKey};
use kiln_auth::{AuthEvent, AuthEventKind, AuthUser, Session};
use kiln_media::ImageUpload;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Uninitialized,
    Loading,
    Authenticated,
    Unauthenticated,
    /// No backend configured
    Offline,
}

pub struct IdentityContext {
    auth: Option<AuthGateway>,
    gateway: Option<Gateway>,
    store: LocalStore,
    policy: RetryPolicy,
    loading_timeout: Duration,
    events: Option<watch::Receiver<Option<AuthEvent>>>,
    restore: Option<JoinHandle<()>>,
    phase: AuthPhase,
    session: Option<Session>,
    profile: Option<Profile>,
}

impl IdentityContext {
    /// Context for the given configuration; offline when no backend is set
    pub fn new(config: &AppConfig, store: LocalStore) -> Result<Self, AppError> {
        let (auth, gateway) = match config.backend() {
            Some(backend) => (
                Some(AuthGateway::new(
                    &backend,
                    store.clone(),
                    config.password_reset_redirect.clone(),
                )?),
                Some(Gateway::new(&backend)?),
            ),
            None => (None, None),
        };

        Ok(Self {
            auth,
            gateway,
            store,
            policy: config.retry_policy(),
            loading_timeout: config.loading_timeout(),
            events: None,
            restore: None,
            phase: AuthPhase::Uninitialized,
            session: None,
            profile: None,
        })
    }

    pub fn offline(store: LocalStore) -> Self {
        Self {
            auth: None,
            gateway: None,
            store,
            policy: RetryPolicy::default(),
            loading_timeout: Duration::from_secs(3),
            events: None,
            restore: None,
            phase: AuthPhase::Uninitialized,
            session: None,
            profile: None,
        }
    }

    pub fn phase(&self) -> AuthPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Gateway pointed at the current session, `None` offline
    pub fn gateway(&self) -> Option<&Gateway> {
        self.gateway.as_ref()
    }

    pub fn is_offline(&self) -> bool {
        self.auth.is_none()
    }

    /// Name shown on posts and memberships
    pub fn username(&self) -> String {
        if let Some(profile) = &self.profile {
            return profile.username.clone();
        }
        self.session
            .as_ref()
            .and_then(|s| s.user.username())
            .map(str::to_string)
            .unwrap_or_else(|| Profile::default().username)
    }

    pub fn sync_mode(&self) -> SyncMode {
        match self.phase {
            AuthPhase::Offline => SyncMode::Offline,
            AuthPhase::Authenticated => SyncMode::Online,
            _ => SyncMode::SignedOut,
        }
    }

    /// Resolves the loading phase.
    ///
    /// Offline this reads the stored profile. With a backend the persisted
    /// session is restored in the background and the first auth
    /// notification decides the phase. When none arrives within the loading
    /// timeout the context is unauthenticated for now; the restore keeps
    /// running and its notification arrives through [`Self::next_event`].
    pub async fn start(&mut self) -> AuthPhase {
        self.phase = AuthPhase::Loading;

        let Some(auth) = &self.auth else {
            self.profile = Some(self.store.get_or_else(StoreKey::User, Profile::default));
            self.phase = AuthPhase::Offline;
            log::info!("No backend configured, running offline");
            return self.phase;
        };

        let mut events = auth.subscribe();
        let restoring = auth.clone();
        self.restore = Some(tokio::spawn(async move {
            restoring.restore().await;
        }));

        let first = tokio::time::timeout(self.loading_timeout, first_event(&mut events)).await;
        self.events = Some(events);

        match first {
            Ok(Some(event)) => self.apply_event(event).await,
            Ok(None) => {
                log::warn!("Auth notifications closed before the initial state");
                self.clear_session();
            }
            Err(_) => {
                log::warn!(
                    "No auth state after {:?}, continuing signed out",
                    self.loading_timeout
                );
                self.clear_session();
            }
        }
        self.phase
    }

    /// Waits for the next auth notification and applies it. `None` once the
    /// subscription is gone.
    pub async fn next_event(&mut self) -> Option<AuthEventKind> {
        let events = self.events.as_mut()?;
        if events.changed().await.is_err() {
            return None;
        }
        let event = events.borrow_and_update().clone()?;
        let kind = event.kind;
        self.apply_event(event).await;
        Some(kind)
    }

    /// Drops the auth subscription and stops a restore still in flight
    pub fn shutdown(&mut self) {
        if let Some(restore) = self.restore.take() {
            restore.abort();
        }
        if self.events.take().is_some() {
            log::debug!("Auth subscription dropped");
        }
    }

    async fn apply_event(&mut self, event: AuthEvent) {
        match event.session {
            Some(session) => self.establish(session).await,
            None => self.clear_session(),
        }
    }

    async fn establish(&mut self, session: Session) {
        if let Some(auth) = &self.auth {
            auth.persist_session(Some(&session));
        }
        if let Some(gateway) = &mut self.gateway {
            gateway.set_session(Some(&session));
        }
        self.session = Some(session);
        self.phase = AuthPhase::Authenticated;
        self.load_profile().await;
    }

    async fn load_profile(&mut self) {
        let Some(gateway) = &self.gateway else {
            return;
        };
        let result = self
            .policy
            .run("profile", || api::profiles::get(gateway))
            .await;

        match result {
            Ok(profile) => self.profile = Some(profile),
            Err(e) => log::error!("Failed to load profile: {}", e),
        }
    }

    /// Forgets the in-memory session. The persisted one is left to the auth
    /// gateway, which drops it on sign-out or a rejected refresh.
    fn clear_session(&mut self) {
        if let Some(gateway) = &mut self.gateway {
            gateway.set_session(None);
        }
        self.session = None;
        self.profile = None;
        self.phase = AuthPhase::Unauthenticated;
    }

    /// Marks the latest notification as handled so `next_event` does not
    /// replay a change this context already applied
    fn mark_seen(&mut self) {
        if let Some(events) = &mut self.events {
            events.borrow_and_update();
        }
    }

    fn auth(&self) -> Result<&AuthGateway, AppError> {
        self.auth.as_ref().ok_or(AppError::NotConfigured)
    }

    /// Registers an account. Returns whether the user is signed in right
    /// away (otherwise the backend waits for email confirmation).
    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<bool, AppError> {
        if email.trim().is_empty() || password.is_empty() || username.trim().is_empty() {
            return Err(AppError::Validation(
                "Email, password and username are required".to_string(),
            ));
        }

        let session = self
            .auth()?
            .sign_up(email.trim(), password, username.trim())
            .await?;
        self.mark_seen();
        match session {
            Some(session) => {
                self.establish(session).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<(), AppError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let session = self.auth()?.sign_in(email.trim(), password).await?;
        self.mark_seen();
        self.establish(session).await;
        Ok(())
    }

    /// Offline this only forgets the stored profile
    pub async fn sign_out(&mut self) -> Result<(), AppError> {
        match &self.auth {
            None => {
                self.store.remove(StoreKey::User);
                self.profile = Some(Profile::default());
                log::info!("Local profile cleared");
            }
            Some(auth) => {
                auth.sign_out().await?;
                self.mark_seen();
                self.clear_session();
            }
        }
        Ok(())
    }

    /// Re-reads the signed-in user from the backend, picking up changes made
    /// elsewhere (email confirmation, metadata). `None` when signed out.
    pub async fn refresh_user(&mut self) -> Result<Option<&AuthUser>, AppError> {
        let user = self.auth()?.current_user().await?;
        match (user, self.session.as_mut()) {
            (Some(user), Some(session)) => {
                session.user = user;
                Ok(Some(&session.user))
            }
            _ => Ok(None),
        }
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AppError> {
        if email.trim().is_empty() {
            return Err(AppError::Validation("Email is required".to_string()));
        }
        self.auth()?.reset_password(email.trim()).await
    }

    pub async fn update_password(&self, new_password: &str) -> Result<AuthUser, AppError> {
        if new_password.is_empty() {
            return Err(AppError::Validation("Password is required".to_string()));
        }
        self.auth()?.update_password(new_password).await
    }

    /// Applies a partial profile.
    ///
    /// Signed in, the backend's stored row replaces the in-memory profile.
    /// Offline, the change is merged into the local profile as is.
    pub async fn update_profile(&mut self, changes: &ProfileUpdate) -> Result<&Profile, AppError> {
        if self.auth.is_none() {
            let current = self
                .profile
                .clone()
                .unwrap_or_else(|| self.store.get_or_else(StoreKey::User, Profile::default));
            let merged = changes.merge(&current);
            self.store.set(StoreKey::User, &merged);
            return Ok(&*self.profile.insert(merged));
        }

        let gateway = self.gateway.as_ref().ok_or(AppError::NotConfigured)?;
        let stored = api::profiles::update(gateway, changes).await?;
        Ok(&*self.profile.insert(stored))
    }

    /// Uploads a new avatar for the signed-in user
    pub async fn update_avatar(&mut self, upload: &ImageUpload) -> Result<&Profile, AppError> {
        let gateway = self.gateway.as_ref().ok_or(AppError::NotConfigured)?;
        let url = api::profiles::upload_avatar(gateway, upload).await?;

        let mut profile = self.profile.clone().unwrap_or_default();
        profile.avatar_url = Some(url);
        Ok(&*self.profile.insert(profile))
    }
}

async fn first_event(events: &mut watch::Receiver<Option<AuthEvent>>) -> Option<AuthEvent> {
    loop {
        let current = events.borrow_and_update().clone();
        if current.is_some() {
            return current;
        }
        if events.changed().await.is_err() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Units;
    use crate::test_support::{Reply, StubServer};

    fn online_config() -> AppConfig {
        AppConfig {
            supabase_url: Some("http://127.0.0.1:9".into()),
            supabase_anon_key: Some("anon".into()),
            ..AppConfig::default()
        }
    }

    fn session() -> Session {
        Session {
            access_token: "jwt".into(),
            refresh_token: "refresh".into(),
            token_type: "bearer".into(),
            expires_at: chrono::Utc::now().timestamp() + 3600,
            user: AuthUser {
                id: "user-1".into(),
                email: Some("potter@example.com".into()),
                user_metadata: serde_json::json!({"username": "hannah"}),
            },
        }
    }

    #[tokio::test]
    async fn test_offline_start_uses_default_profile() {
        let mut identity = IdentityContext::offline(LocalStore::in_memory().unwrap());
        assert_eq!(identity.phase(), AuthPhase::Uninitialized);

        assert_eq!(identity.start().await, AuthPhase::Offline);
        assert_eq!(identity.profile(), Some(&Profile::default()));
        assert_eq!(identity.sync_mode(), SyncMode::Offline);
        assert_eq!(identity.username(), "Potter");
    }

    #[tokio::test]
    async fn test_offline_start_reads_stored_profile() {
        let store = LocalStore::in_memory().unwrap();
        let stored = Profile {
            username: "Mere".into(),
            ..Profile::default()
        };
        store.set(StoreKey::User, &stored);

        let mut identity = IdentityContext::offline(store);
        identity.start().await;
        assert_eq!(identity.username(), "Mere");
    }

    #[tokio::test]
    async fn test_offline_profile_update_merges_and_persists() {
        let store = LocalStore::in_memory().unwrap();
        let mut identity = IdentityContext::offline(store.clone());
        identity.start().await;

        let changes = ProfileUpdate {
            bio: Some("Wood-fire enthusiast".into()),
            units: Some(Units::Imperial),
            ..ProfileUpdate::default()
        };
        let updated = identity.update_profile(&changes).await.unwrap().clone();
        assert_eq!(updated.username, "Potter");
        assert_eq!(updated.bio, "Wood-fire enthusiast");

        let stored: Profile = store.get(StoreKey::User, Profile::default());
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_offline_sign_out_clears_profile_key() {
        let store = LocalStore::in_memory().unwrap();
        store.set(
            StoreKey::User,
            &Profile {
                username: "Mere".into(),
                ..Profile::default()
            },
        );
        let mut identity = IdentityContext::offline(store.clone());
        identity.start().await;

        identity.sign_out().await.unwrap();
        assert!(!store.contains(StoreKey::User));
        assert_eq!(identity.phase(), AuthPhase::Offline);
    }

    #[tokio::test]
    async fn test_auth_operations_need_backend() {
        let mut identity = IdentityContext::offline(LocalStore::in_memory().unwrap());
        identity.start().await;

        let err = identity.sign_in("a@b.nz", "secret").await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured));
        assert!(matches!(
            identity.reset_password("a@b.nz").await,
            Err(AppError::NotConfigured)
        ));
        assert!(matches!(
            identity.sign_in("", "secret").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_online_start_without_session_is_unauthenticated() {
        let mut identity =
            IdentityContext::new(&online_config(), LocalStore::in_memory().unwrap()).unwrap();
        assert!(!identity.is_offline());

        assert_eq!(identity.start().await, AuthPhase::Unauthenticated);
        assert_eq!(identity.sync_mode(), SyncMode::SignedOut);
        assert!(identity.session().is_none());
        assert!(matches!(
            identity.gateway().unwrap().user_id(),
            Err(AppError::AuthRequired)
        ));
    }

    #[tokio::test]
    async fn test_online_start_restores_stored_session() {
        let store = LocalStore::in_memory().unwrap();
        store.set(StoreKey::AuthSession, &session());
        let mut config = online_config();
        config.retry_attempts = 1;

        let mut identity = IdentityContext::new(&config, store).unwrap();
        assert_eq!(identity.start().await, AuthPhase::Authenticated);
        assert_eq!(identity.sync_mode(), SyncMode::Online);
        assert_eq!(identity.gateway().unwrap().user_id().unwrap(), "user-1");
        // profile row unreachable; the metadata name is used instead
        assert_eq!(identity.username(), "hannah");

        identity.shutdown();
        assert_eq!(identity.next_event().await, None);
    }

    fn config_for(server: &StubServer, loading_timeout_ms: u64) -> AppConfig {
        AppConfig {
            supabase_url: Some(server.url().to_string()),
            supabase_anon_key: Some("anon".into()),
            loading_timeout_ms,
            retry_attempts: 1,
            ..AppConfig::default()
        }
    }

    fn expired_session() -> Session {
        Session {
            expires_at: chrono::Utc::now().timestamp() - 120,
            ..session()
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_keeps_stored_session() {
        let store = LocalStore::in_memory().unwrap();
        let expired = expired_session();
        store.set(StoreKey::AuthSession, &expired);

        let mut identity = IdentityContext::new(&online_config(), store.clone()).unwrap();
        assert_eq!(identity.start().await, AuthPhase::Unauthenticated);
        let kept: Option<Session> = store.get(StoreKey::AuthSession, None);
        assert_eq!(kept, Some(expired));
        identity.shutdown();
    }

    #[tokio::test]
    async fn test_loading_timeout_keeps_stored_session() {
        let server = StubServer::silent();
        let store = LocalStore::in_memory().unwrap();
        store.set(StoreKey::AuthSession, &expired_session());

        let mut identity = IdentityContext::new(&config_for(&server, 300), store.clone()).unwrap();
        assert_eq!(identity.start().await, AuthPhase::Unauthenticated);
        assert!(identity.session().is_none());
        assert!(store.contains(StoreKey::AuthSession));
        identity.shutdown();
    }

    #[tokio::test]
    async fn test_slow_restore_arrives_after_timeout() {
        let server = StubServer::start(vec![
            Reply::json(
                "POST",
                "/auth/v1/token",
                serde_json::json!({
                    "access_token": "fresh",
                    "token_type": "bearer",
                    "expires_in": 3600,
                    "refresh_token": "refresh-2",
                    "user": {"id": "user-1", "email": "potter@example.com"}
                }),
            )
            .after(Duration::from_millis(500)),
            Reply::json(
                "GET",
                "/rest/v1/profiles",
                serde_json::json!({"id": "user-1", "username": "Hannah K"}),
            ),
        ]);
        let store = LocalStore::in_memory().unwrap();
        store.set(StoreKey::AuthSession, &expired_session());

        let mut identity = IdentityContext::new(&config_for(&server, 100), store.clone()).unwrap();
        assert_eq!(identity.start().await, AuthPhase::Unauthenticated);
        assert!(store.contains(StoreKey::AuthSession));

        assert_eq!(identity.next_event().await, Some(AuthEventKind::InitialSession));
        assert_eq!(identity.phase(), AuthPhase::Authenticated);
        assert_eq!(identity.username(), "Hannah K");
        let stored: Option<Session> = store.get(StoreKey::AuthSession, None);
        assert_eq!(stored.unwrap().access_token, "fresh");
        identity.shutdown();
    }

    #[tokio::test]
    async fn test_rejected_session_is_forgotten() {
        let server = StubServer::start(vec![Reply::new(
            "POST",
            "/auth/v1/token",
            401,
            r#"{"msg":"Invalid Refresh Token: Already Used"}"#,
        )]);
        let store = LocalStore::in_memory().unwrap();
        store.set(StoreKey::AuthSession, &expired_session());

        let mut identity = IdentityContext::new(&config_for(&server, 3_000), store.clone()).unwrap();
        assert_eq!(identity.start().await, AuthPhase::Unauthenticated);
        assert!(!store.contains(StoreKey::AuthSession));
        identity.shutdown();
    }
}
