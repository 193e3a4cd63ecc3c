use crate::models::{AuthEvent, AuthEventKind, AuthUser, Session, TokenResponse};
use std::time::Duration;
use tokio::sync::watch;

/// Error type for authentication operations
#[derive(Debug)]
pub enum AuthError {
    NetworkError(String),
    /// The request was aborted or timed out before a response arrived
    Aborted(String),
    JsonError(String),
    ServerError { status: u16, message: String },
    /// The operation needs a signed-in session
    NotAuthenticated,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AuthError::Aborted(msg) => write!(f, "Request aborted: {}", msg),
            AuthError::JsonError(msg) => write!(f, "JSON error: {}", msg),
            AuthError::ServerError { status, message } => {
                write!(f, "Server error ({}): {}", status, message)
            }
            AuthError::NotAuthenticated => write!(f, "Not authenticated"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AuthError::Aborted(e.to_string())
        } else {
            AuthError::NetworkError(e.to_string())
        }
    }
}

impl AuthError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, AuthError::Aborted(_))
    }

    /// The server turned the credentials down (as opposed to never answering)
    pub fn is_rejected(&self) -> bool {
        matches!(self, AuthError::ServerError { status: 400 | 401, .. })
    }
}

/// Authentication service for the hosted backend
///
/// The latest auth state lives in a watch channel: subscribers always see the
/// most recent event, including one sent before they subscribed.
pub struct AuthService {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
    events: watch::Sender<Option<AuthEvent>>,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent("CoastalKiln/0.1.0")
            .build()
            .map_err(|e| AuthError::NetworkError(format!("Client build failed: {}", e)))?;

        let (events, _) = watch::channel(None);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            http,
            events,
        })
    }

    /// Subscribe to auth-state changes. `None` means nothing has been emitted yet.
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthEvent>> {
        self.events.subscribe()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.events
            .borrow()
            .as_ref()
            .and_then(|event| event.session.clone())
    }

    fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        log::debug!(
            "Auth state changed: {:?} (session: {})",
            kind,
            if session.is_some() { "present" } else { "none" }
        );
        self.events.send_replace(Some(AuthEvent { kind, session }));
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.anon_key)
            .header("Accept", "application/json")
    }

    /// Restores a previously persisted session and emits the initial
    /// notification. Expired sessions are refreshed; if that fails, the
    /// initial notification carries no session and the error is returned.
    pub async fn restore_session(&self, stored: Option<Session>) -> Result<Option<Session>, AuthError> {
        let Some(session) = stored else {
            self.emit(AuthEventKind::InitialSession, None);
            return Ok(None);
        };

        if !session.is_expired(now()) {
            self.emit(AuthEventKind::InitialSession, Some(session.clone()));
            return Ok(Some(session));
        }

        log::info!("Stored session expired, refreshing");
        match self.refresh_token(&session.refresh_token).await {
            Ok(refreshed) => {
                self.emit(AuthEventKind::InitialSession, Some(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(e) => {
                self.emit(AuthEventKind::InitialSession, None);
                Err(e)
            }
        }
    }

    /// Register a new account. Returns the session when the backend signs the
    /// user in right away, `None` when it waits for email confirmation.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Option<Session>, AuthError> {
        let response = self
            .request(reqwest::Method::POST, "signup")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": { "username": username },
            }))
            .send()
            .await?;

        let body: serde_json::Value = parse_json(check(response).await?).await?;

        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)
                .map_err(|e| AuthError::JsonError(format!("Failed to parse session: {}", e)))?;
            let session = token.into_session(now());
            self.emit(AuthEventKind::SignedIn, Some(session.clone()));
            Ok(Some(session))
        } else {
            log::info!("Sign-up for {} awaits email confirmation", email);
            Ok(None)
        }
    }

    /// Sign in with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .request(reqwest::Method::POST, "token?grant_type=password")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let token: TokenResponse = parse_json(check(response).await?).await?;
        let session = token.into_session(now());
        log::info!("Signed in as {}", session.user.id);
        self.emit(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let response = self
            .request(reqwest::Method::POST, "token?grant_type=refresh_token")
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let token: TokenResponse = parse_json(check(response).await?).await?;
        Ok(token.into_session(now()))
    }

    /// Exchange the current refresh token for a new access token
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let current = self.current_session().ok_or(AuthError::NotAuthenticated)?;
        let session = self.refresh_token(&current.refresh_token).await?;
        self.emit(AuthEventKind::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    /// Sign out. On failure the session stays as it was.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(session) = self.current_session() {
            let response = self
                .request(reqwest::Method::POST, "logout")
                .bearer_auth(&session.access_token)
                .send()
                .await?;
            check(response).await?;
        }

        self.emit(AuthEventKind::SignedOut, None);
        Ok(())
    }

    /// Fetch the user behind the current session, `None` when signed out
    pub async fn get_user(&self) -> Result<Option<AuthUser>, AuthError> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };

        let response = self
            .request(reqwest::Method::GET, "user")
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        let user: AuthUser = parse_json(check(response).await?).await?;
        Ok(Some(user))
    }

    /// Send a password-reset email
    pub async fn reset_password(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AuthError> {
        let mut request = self.request(reqwest::Method::POST, "recover");
        if let Some(redirect) = redirect_to {
            request = request.query(&[("redirect_to", redirect)]);
        }

        let response = request
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;
        check(response).await?;
        log::info!("Password reset requested for {}", email);
        Ok(())
    }

    /// Change the password of the signed-in user
    pub async fn update_password(&self, new_password: &str) -> Result<AuthUser, AuthError> {
        let mut session = self.current_session().ok_or(AuthError::NotAuthenticated)?;

        let response = self
            .request(reqwest::Method::PUT, "user")
            .bearer_auth(&session.access_token)
            .json(&serde_json::json!({ "password": new_password }))
            .send()
            .await?;

        let user: AuthUser = parse_json(check(response).await?).await?;
        session.user = user.clone();
        self.emit(AuthEventKind::UserUpdated, Some(session));
        Ok(user)
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AuthError::ServerError {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, AuthError> {
    response
        .json::<T>()
        .await
        .map_err(|e| AuthError::JsonError(format!("Failed to parse response: {}", e)))
}

/// Pulls a readable message out of the auth endpoints' error bodies, which
/// use `error_description`, `msg` or `message` depending on the failure
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Port 9 (discard) is never served; these tests must not reach the network.
    fn offline_service() -> AuthService {
        AuthService::new("http://127.0.0.1:9/", "anon").unwrap()
    }

    fn session(expires_at: i64) -> Session {
        Session {
            access_token: "jwt".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: "bearer".to_string(),
            expires_at,
            user: AuthUser {
                id: "user-1".to_string(),
                email: Some("potter@example.com".to_string()),
                user_metadata: serde_json::Value::Null,
            },
        }
    }

    #[tokio::test]
    async fn test_restore_without_session_emits_initial_event() {
        let service = offline_service();
        let rx = service.subscribe();
        assert!(rx.borrow().is_none());

        let restored = service.restore_session(None).await.unwrap();
        assert!(restored.is_none());

        let event = rx.borrow().clone().unwrap();
        assert_eq!(event.kind, AuthEventKind::InitialSession);
        assert!(event.session.is_none());
    }

    #[tokio::test]
    async fn test_restore_valid_session() {
        let service = offline_service();
        let valid = session(now() + 3_600);

        let restored = service.restore_session(Some(valid.clone())).await.unwrap();
        assert_eq!(restored, Some(valid.clone()));
        assert_eq!(service.current_session(), Some(valid));
    }

    #[tokio::test]
    async fn test_get_user_when_signed_out() {
        let service = offline_service();
        assert!(service.get_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_password_requires_session() {
        let service = offline_service();
        let err = service.update_password("new-secret").await.unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_sign_out_without_session_emits_signed_out() {
        let service = offline_service();
        service.sign_out().await.unwrap();
        let event = service.subscribe().borrow().clone().unwrap();
        assert_eq!(event.kind, AuthEventKind::SignedOut);
    }

    #[test]
    fn test_rejection_is_told_apart_from_transport_failures() {
        let rejected = AuthError::ServerError {
            status: 400,
            message: "Invalid Refresh Token".to_string(),
        };
        assert!(rejected.is_rejected());
        assert!(!AuthError::NetworkError("refused".to_string()).is_rejected());
        assert!(!AuthError::Aborted("timeout".to_string()).is_rejected());
        assert!(!AuthError::ServerError {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_rejected());
    }

    #[tokio::test]
    async fn test_failed_refresh_still_notifies() {
        let service = offline_service();
        let err = service
            .restore_session(Some(session(now() - 10)))
            .await
            .unwrap_err();
        assert!(!err.is_rejected());

        let event = service.subscribe().borrow().clone().unwrap();
        assert_eq!(event.kind, AuthEventKind::InitialSession);
        assert!(event.session.is_none());
    }

    #[test]
    fn test_error_message_variants() {
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message(r#"{"code":422,"msg":"Password too short"}"#), "Password too short");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
