//! Error types for the conversation session.

use thiserror::Error;

use crate::types::ChatId;

/// Result type alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Failures reported by the content service.
///
/// Transport detail (connection errors, timeouts, undecodable bodies, server
/// errors) collapses into `Unavailable`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Unavailable(format!("request timed out: {}", err))
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

/// Chat system errors
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("A submission is already in flight for chat {chat_id}")]
    Busy { chat_id: ChatId },

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Invalid state for {operation}: current={current}, expected={expected}")]
    InvalidState {
        current: String,
        expected: String,
        operation: String,
    },

    #[error("Chat not found: {0}")]
    ChatNotFound(ChatId),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Coarse classification used by callers to pick a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input must be corrected by the user
    Invalid,
    /// Credential missing or rejected, user must sign in again
    Unauthorized,
    /// Referenced chat no longer exists
    NotFound,
    /// Transient failure, the same submission may be retried
    Unavailable,
    /// Another submission holds the chat
    Busy,
    /// Operation not allowed in the current session state
    State,
    /// Local configuration or storage failure
    Internal,
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Busy { .. } => ErrorKind::Busy,
            Self::Invalid(_) => ErrorKind::Invalid,
            Self::InvalidState { .. } => ErrorKind::State,
            Self::ChatNotFound(_) => ErrorKind::NotFound,
            Self::NotAuthenticated => ErrorKind::Unauthorized,
            Self::Gateway(GatewayError::Unauthorized(_)) => ErrorKind::Unauthorized,
            Self::Gateway(GatewayError::NotFound(_)) => ErrorKind::NotFound,
            Self::Gateway(GatewayError::Invalid(_)) => ErrorKind::Invalid,
            Self::Gateway(GatewayError::Unavailable(_)) => ErrorKind::Unavailable,
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Whether re-submitting the same input may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    pub(crate) fn invalid_state(current: &str, expected: &str, operation: &str) -> Self {
        Self::InvalidState {
            current: current.to_string(),
            expected: expected.to_string(),
            operation: operation.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_errors_map_to_kinds() {
        let err: ChatError = GatewayError::Unauthorized("expired".into()).into();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err: ChatError = GatewayError::NotFound("chat 3".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: ChatError = GatewayError::Invalid("empty url".into()).into();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        let err: ChatError = GatewayError::Unavailable("timeout".into()).into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(!ChatError::Invalid("empty".into()).is_retryable());
        assert!(!ChatError::Busy { chat_id: "1".into() }.is_retryable());
        assert!(!ChatError::NotAuthenticated.is_retryable());
    }

    #[test]
    fn test_gateway_error_display_is_transparent() {
        let err: ChatError = GatewayError::NotFound("Chat not found".into()).into();
        assert_eq!(err.to_string(), "Not found: Chat not found");
    }
}
