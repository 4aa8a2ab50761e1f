//! LLM error types

use thiserror::Error;

/// LLM error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::InvalidRequest, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Unknown, message)
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: &str) -> Self {
        match status {
            400 => Self::invalid_request(format!("Invalid request: {message}")),
            401 | 403 => Self::auth(format!("Authentication failed: {message}")),
            429 => Self::rate_limit(format!("Rate limit exceeded: {message}")),
            500..=599 => Self::server_error(format!("Server error: {message}")),
            _ => Self::unknown(format!("HTTP {status}: {message}")),
        }
    }
}

/// Error classification
///
/// Kept for logging; the chat delivery protocol retries every kind alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Network issues, timeouts
    Network,
    /// Rate limited (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Authentication failed (401, 403)
    Auth,
    /// Bad request (400)
    InvalidRequest,
    /// Anything else, including undecodable bodies
    Unknown,
}
