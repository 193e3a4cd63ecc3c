use serde::{Deserialize, Serialize};

/// The authenticated identity as returned by the auth endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser {
    /// Username chosen at sign-up, if the backend kept it in the user metadata
    pub fn username(&self) -> Option<&str> {
        self.user_metadata.get("username").and_then(|v| v.as_str())
    }
}

/// Response of the token endpoints (password grant and refresh)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl TokenResponse {
    /// Converts to a session; `now` is a unix timestamp in seconds
    pub fn into_session(self, now: i64) -> Session {
        Session {
            expires_at: self.expires_at.unwrap_or(now + self.expires_in),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            user: self.user,
        }
    }
}

/// A signed-in session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Unix timestamp (seconds) at which the access token expires
    pub expires_at: i64,
    pub user: AuthUser,
}

impl Session {
    /// Tokens within 60 seconds of expiry count as expired
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at - 60 <= now
    }
}

/// Kind of an auth-state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    /// Fired once after session restore, with or without a session
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Notification carrying the session state after a change
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_json() -> &'static str {
        r#"{
            "access_token": "jwt-abc",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-xyz",
            "user": {
                "id": "3f1c",
                "email": "potter@example.com",
                "user_metadata": { "username": "Hannah" }
            }
        }"#
    }

    #[test]
    fn test_token_response_into_session() {
        let token: TokenResponse = serde_json::from_str(token_json()).unwrap();
        let session = token.into_session(1_000);
        assert_eq!(session.expires_at, 4_600);
        assert_eq!(session.user.id, "3f1c");
        assert_eq!(session.user.username(), Some("Hannah"));
    }

    #[test]
    fn test_explicit_expires_at_wins() {
        let mut token: TokenResponse = serde_json::from_str(token_json()).unwrap();
        token.expires_at = Some(9_999);
        assert_eq!(token.into_session(1_000).expires_at, 9_999);
    }

    #[test]
    fn test_session_expiry_margin() {
        let token: TokenResponse = serde_json::from_str(token_json()).unwrap();
        let session = token.into_session(0);
        assert!(!session.is_expired(3_000));
        assert!(session.is_expired(3_540));
        assert!(session.is_expired(10_000));
    }

    #[test]
    fn test_user_without_metadata() {
        let user: AuthUser = serde_json::from_str(r#"{"id":"u1"}"#).unwrap();
        assert_eq!(user.email, None);
        assert_eq!(user.username(), None);
    }
}
