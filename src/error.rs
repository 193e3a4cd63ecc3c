use std::fmt;

/// Central error types for Coastal Kiln
#[derive(Debug)]
pub enum AppError {
    /// Local database error (rusqlite)
    Database(rusqlite::Error),
    /// Filesystem error
    Filesystem(std::io::Error),
    /// JSON (de)serialization error
    Json(serde_json::Error),
    /// Invalid or unreadable configuration
    Config(String),
    /// No remote backend configured; the app runs offline
    NotConfigured,
    /// A user-scoped operation was attempted without a signed-in identity
    AuthRequired,
    /// Request aborted before completion; the retry policy retries these
    Aborted(String),
    /// Transport failure other than an abort
    Network(String),
    /// The backend answered with an error status
    Remote { status: u16, message: String },
    /// Auth endpoint failure (bad credentials, weak password, ...)
    Auth(String),
    /// Image validation or object storage failure
    Media(kiln_media::MediaError),
    /// Validation error (e.g. missing required field)
    Validation(String),
    /// Resource not found
    NotFound(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Filesystem(e) => write!(f, "Filesystem error: {}", e),
            AppError::Json(e) => write!(f, "JSON error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::NotConfigured => write!(f, "Backend not configured"),
            AppError::AuthRequired => write!(f, "Authentication required"),
            AppError::Aborted(msg) => write!(f, "Request aborted: {}", msg),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Remote { status, message } => {
                write!(f, "Backend error ({}): {}", status, message)
            }
            AppError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            AppError::Media(e) => write!(f, "Media error: {}", e),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

// Conversions from other error types
impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Filesystem(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Json(e)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Aborted(e.to_string())
        } else {
            AppError::Network(e.to_string())
        }
    }
}

impl From<kiln_auth::AuthError> for AppError {
    fn from(e: kiln_auth::AuthError) -> Self {
        use kiln_auth::AuthError;
        match e {
            AuthError::Aborted(msg) => AppError::Aborted(msg),
            AuthError::NetworkError(msg) => AppError::Network(msg),
            AuthError::NotAuthenticated => AppError::AuthRequired,
            AuthError::JsonError(msg) => AppError::Auth(msg),
            AuthError::ServerError { message, .. } => AppError::Auth(message),
        }
    }
}

impl From<kiln_media::MediaError> for AppError {
    fn from(e: kiln_media::MediaError) -> Self {
        match e {
            kiln_media::MediaError::Aborted(msg) => AppError::Aborted(msg),
            other => AppError::Media(other),
        }
    }
}

impl AppError {
    /// Errors of the "aborted request" class, the only ones worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Aborted(_))
    }

    /// User-facing alert text
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Json(_) => {
                "A storage error occurred. Please try again.".to_string()
            }
            AppError::Filesystem(_) => "Error reading file. Please try again.".to_string(),
            AppError::Config(msg) => format!("Configuration problem: {}", msg),
            AppError::NotConfigured => {
                "Not connected to a backend. Running in offline mode.".to_string()
            }
            AppError::AuthRequired => "Please sign in first.".to_string(),
            AppError::Aborted(_) | AppError::Network(_) => {
                "Connection problem. Please try again.".to_string()
            }
            AppError::Remote { message, .. } => format!("Request failed: {}", message),
            AppError::Auth(msg) => msg.clone(),
            AppError::Media(e) => e.user_message(),
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(msg) => format!("{} was not found.", msg),
        }
    }
}
