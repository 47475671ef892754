//! Provider error types.

use forexsync_common::ValidationError;
use thiserror::Error;

/// Errors that can occur while pulling rates from a provider.
#[derive(Debug, Error)]
pub enum FxError {
    /// Provider answered with a non-success HTTP status.
    #[error("{provider} connection error. Status code: {status}")]
    Transport { provider: String, status: u16 },

    /// Request could not be sent or the body could not be read.
    #[error("{provider} request failed: {message}")]
    Http { provider: String, message: String },

    /// Provider reported its request quota as exhausted.
    #[error("{provider} quota exceeded. Error code {code}. {info}")]
    QuotaExceeded {
        provider: String,
        code: i64,
        info: String,
    },

    /// Provider reported an application error or returned an unusable body.
    #[error("{provider} parser error. {message}")]
    Parser { provider: String, message: String },

    /// Request failed validation before reaching the provider.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No provider registered under this name.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Provider could not be configured.
    #[error("Provider configuration error: {0}")]
    Configuration(String),
}

impl FxError {
    /// Quota failures are always recoverable by waiting.
    pub fn is_quota(&self) -> bool {
        matches!(self, FxError::QuotaExceeded { .. })
    }

    /// Failures that happened at the transport level.
    pub fn is_transport(&self) -> bool {
        matches!(self, FxError::Transport { .. } | FxError::Http { .. })
    }

    pub(crate) fn parser(provider: &str, message: impl Into<String>) -> Self {
        FxError::Parser {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for provider operations.
pub type FxResult<T> = Result<T, FxError>;
