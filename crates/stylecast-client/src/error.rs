use std::sync::Arc;
use stylecast_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Stylization service returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// A shared submission failed. Every caller waiting on the same
    /// fingerprint receives the same underlying error.
    #[error("Submission failed: {0}")]
    Submission(Arc<ClientError>),
}

impl ClientError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(_) => true,
            ClientError::Status { code, .. } => *code >= 500 || *code == 408 || *code == 429,
            ClientError::Decode(_) => false,
            ClientError::Submission(inner) => inner.is_transient(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        AppError::Remote(err.to_string())
    }
}
