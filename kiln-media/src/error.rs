/// Result type for media operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while validating or storing images
#[derive(Debug)]
pub enum MediaError {
    /// The file is not an image (by MIME type)
    NotAnImage(String),
    /// The file exceeds the upload limit
    TooLarge { size: usize, limit: usize },
    IoError(std::io::Error),
    /// The request was aborted or timed out before a response arrived
    Aborted(String),
    NetworkError(String),
    /// The storage service answered with a non-success status
    StorageError { status: u16, message: String },
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaError::NotAnImage(content_type) => {
                write!(f, "Not an image file (content type {})", content_type)
            }
            MediaError::TooLarge { size, limit } => {
                write!(f, "Image too large: {} bytes (limit {} bytes)", size, limit)
            }
            MediaError::IoError(e) => write!(f, "IO error: {}", e),
            MediaError::Aborted(msg) => write!(f, "Request aborted: {}", msg),
            MediaError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            MediaError::StorageError { status, message } => {
                write!(f, "Storage error ({}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for MediaError {}

impl From<std::io::Error> for MediaError {
    fn from(err: std::io::Error) -> Self {
        MediaError::IoError(err)
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MediaError::Aborted(err.to_string())
        } else {
            MediaError::NetworkError(err.to_string())
        }
    }
}

impl MediaError {
    /// Text suitable for an alert shown to the user
    pub fn user_message(&self) -> String {
        match self {
            MediaError::NotAnImage(_) => "Please select an image file".to_string(),
            MediaError::TooLarge { .. } => {
                "Image too large. Please select an image under 5MB".to_string()
            }
            MediaError::IoError(_) => "Error reading file. Please try again.".to_string(),
            MediaError::Aborted(_) | MediaError::NetworkError(_) | MediaError::StorageError { .. } => {
                "Failed to upload photo. Please try again.".to_string()
            }
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, MediaError::Aborted(_))
    }
}
