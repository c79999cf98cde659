//! Error types module
//!
//! All pipeline-level failures are unified under [`AppError`]. Remote job
//! failures are not errors here: a failed or timed-out job is a terminal
//! [`crate::models::RemoteJob`] state that the orchestrator degrades around.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Describes how an error should be presented to the user and logged.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "IMAGE_DECODE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether retrying the same action may succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message (may differ from internal error message)
    fn user_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Remote service error: {0}")]
    Remote(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Decoding(_) | image::ImageError::Unsupported(_) => {
                AppError::ImageDecode(err.to_string())
            }
            other => AppError::ImageProcessing(other.to_string()),
        }
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        AppError::ImageDecode(_) => (
            "IMAGE_DECODE_ERROR",
            false,
            Some("Select a different photo"),
            LogLevel::Warn,
        ),
        AppError::ImageProcessing(_) => (
            "IMAGE_PROCESSING_ERROR",
            false,
            Some("Try again with a different photo"),
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            "INVALID_INPUT",
            false,
            Some("Check the entered values and try again"),
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge { .. } => (
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Select a smaller photo"),
            LogLevel::Debug,
        ),
        AppError::Remote(_) => (
            "REMOTE_SERVICE_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Warn,
        ),
        AppError::Font(_) => (
            "FONT_ERROR",
            false,
            Some("Check the configured font files"),
            LogLevel::Error,
        ),
        AppError::InvalidTransition(_) => (
            "INVALID_TRANSITION",
            false,
            Some("Finish the current step first"),
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }

    fn user_message(&self) -> String {
        match self {
            AppError::ImageDecode(_) => "The selected file could not be read as an image".to_string(),
            AppError::ImageProcessing(_) => "Failed to process the image".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::PayloadTooLarge { size, limit } => format!(
                "The selected file is too large ({} bytes, limit {} bytes)",
                size, limit
            ),
            AppError::Remote(_) => "The stylization service is unavailable".to_string(),
            AppError::Font(_) => "Text could not be rendered".to_string(),
            AppError::InvalidTransition(ref msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_image_decode() {
        let err = AppError::ImageDecode("bad header".to_string());
        assert_eq!(err.error_code(), "IMAGE_DECODE_ERROR");
        assert!(!err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Warn);
        assert!(err.suggested_action().is_some());
    }

    #[test]
    fn test_error_metadata_remote_is_recoverable() {
        let err = AppError::Remote("connection refused".to_string());
        assert!(err.is_recoverable());
        assert_eq!(err.user_message(), "The stylization service is unavailable");
    }

    #[test]
    fn test_payload_too_large_message() {
        let err = AppError::PayloadTooLarge {
            size: 300,
            limit: 100,
        };
        assert!(err.user_message().contains("300"));
        assert!(err.user_message().contains("100"));
    }

    #[test]
    fn test_from_anyhow_keeps_source() {
        let err: AppError = anyhow::anyhow!("boom").into();
        match err {
            AppError::InternalWithSource { message, .. } => assert_eq!(message, "boom"),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_from_image_error_decoding() {
        let err = image::load_from_memory(b"not an image").unwrap_err();
        let app: AppError = err.into();
        assert_eq!(app.error_code(), "IMAGE_DECODE_ERROR");
    }
}
