//! Base trait for chat completion clients

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokitsuzuri_core::{Message, Settings};

/// Error type for completion calls
#[derive(Error, Debug)]
pub enum CompletionError {
    /// HTTP 401
    #[error("Unauthorized")]
    Unauthorized,

    /// HTTP 429
    #[error("Rate limited")]
    RateLimited,

    /// HTTP 5xx
    #[error("Server error: {0}")]
    ServerError(String),

    /// Network failure or an unusable response body
    #[error("Transport error: {0}")]
    Transport(String),

    /// Any other non-success status
    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

pub type CompletionResult<T> = Result<T, CompletionError>;

impl CompletionError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => CompletionError::Unauthorized,
            429 => CompletionError::RateLimited,
            500..=599 => CompletionError::ServerError(format!("HTTP {}: {}", status, body)),
            _ => CompletionError::Rejected { status, body },
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CompletionError::Transport(format!("request timed out: {}", e))
        } else {
            CompletionError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for CompletionError {
    fn from(e: serde_json::Error) -> Self {
        CompletionError::Transport(format!("malformed response: {}", e))
    }
}

impl From<CompletionError> for tokitsuzuri_core::Error {
    fn from(e: CompletionError) -> Self {
        match e {
            CompletionError::Unauthorized => tokitsuzuri_core::Error::CredentialInvalid,
            CompletionError::RateLimited => tokitsuzuri_core::Error::RateLimited,
            CompletionError::ServerError(msg) => tokitsuzuri_core::Error::RemoteServerError(msg),
            CompletionError::Transport(msg) => tokitsuzuri_core::Error::Transport(msg),
            rejected @ CompletionError::Rejected { .. } => {
                tokitsuzuri_core::Error::Transport(rejected.to_string())
            }
        }
    }
}

/// Stateless chat completion client
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `system_prompt` followed by `history` and return the reply text
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        max_tokens: u32,
        temperature: f32,
    ) -> CompletionResult<String>;
}

/// Builds a completion client for the current credential and model
pub trait ClientFactory: Send + Sync {
    fn create(&self, settings: &Settings) -> Arc<dyn CompletionClient>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            CompletionError::from_status(401, String::new()),
            CompletionError::Unauthorized
        ));
        assert!(matches!(
            CompletionError::from_status(429, String::new()),
            CompletionError::RateLimited
        ));
        assert!(matches!(
            CompletionError::from_status(503, "down".into()),
            CompletionError::ServerError(_)
        ));
        assert!(matches!(
            CompletionError::from_status(400, "bad".into()),
            CompletionError::Rejected { status: 400, .. }
        ));
    }

    #[test]
    fn test_conversion_to_core_error() {
        use tokitsuzuri_core::Error;

        assert!(matches!(
            Error::from(CompletionError::Unauthorized),
            Error::CredentialInvalid
        ));
        assert!(matches!(
            Error::from(CompletionError::RateLimited),
            Error::RateLimited
        ));
        assert!(matches!(
            Error::from(CompletionError::ServerError("x".into())),
            Error::RemoteServerError(_)
        ));
        match Error::from(CompletionError::Rejected {
            status: 404,
            body: "no such model".into(),
        }) {
            Error::Transport(msg) => assert!(msg.contains("404")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
