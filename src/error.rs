//! Error types for the chat webhook service

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for webhook operations
pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {

    // =============================
    // Request-boundary Errors
    // =============================

    #[error("Missing message or sessionId")]
    Validation(String),

    #[error("Invalid authentication token")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // Downstream Errors
    // =============================

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Map the error taxonomy onto HTTP status codes.
    ///
    /// Validation and auth failures are the caller's to fix; everything
    /// else surfaces as a 500 carrying the upstream message text.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::Auth(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Extra context carried in the error body's optional `details` field.
    pub fn details(&self) -> Option<String> {
        match self {
            ChatError::Validation(d) | ChatError::Auth(d) if !d.is_empty() => Some(d.clone()),
            ChatError::Retrieval(d) | ChatError::Generation(d) | ChatError::Storage(d) => {
                Some(d.clone())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ChatError::Validation("empty message".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ChatError::Auth("token mismatch".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ChatError::Generation("model unavailable".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ChatError::Storage("insert failed".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_message_is_stable() {
        // The 400 body contract depends on this exact text.
        let err = ChatError::Validation(String::new());
        assert_eq!(err.to_string(), "Missing message or sessionId");
    }
}
