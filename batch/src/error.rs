//! Batch error types and failure classification.

use forexsync_fx::FxError;
use forexsync_store::StoreError;
use thiserror::Error;

/// Class of a per-unit failure, driving how a controller reacts to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Provider rate limit. Deferred, never counted as an error.
    Quota,
    /// Non-success HTTP status or a failed request.
    Transport,
    /// Provider application error or unusable response.
    Parser,
    /// Malformed input or configuration.
    Validation,
    /// Store or queue failure.
    Storage,
}

impl FailureKind {
    /// Prefix used in task notes and notifications.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Quota => "Quota exceeded",
            FailureKind::Transport => "Connection error",
            FailureKind::Parser => "Parser error",
            FailureKind::Validation => "Value error",
            FailureKind::Storage => "Fatal and UNEXPECTED error",
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Provider(#[from] FxError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BatchError::Provider(e) if e.is_quota() => FailureKind::Quota,
            BatchError::Provider(e) if e.is_transport() => FailureKind::Transport,
            BatchError::Provider(FxError::Parser { .. }) => FailureKind::Parser,
            BatchError::Provider(_) => FailureKind::Validation,
            BatchError::Store(StoreError::Validation(_)) => FailureKind::Validation,
            BatchError::Store(_) => FailureKind::Storage,
            BatchError::Config(_) => FailureKind::Validation,
        }
    }

    pub fn is_quota(&self) -> bool {
        self.kind() == FailureKind::Quota
    }

    /// Human-readable note for a failed unit of work.
    pub fn describe(&self) -> String {
        format!("{}. Unable to complete: {}", self.kind().label(), self)
    }
}

pub type BatchResult<T> = Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use forexsync_common::ValidationError;

    #[test]
    fn test_classification() {
        let quota = BatchError::from(FxError::QuotaExceeded {
            provider: "fixer".into(),
            code: 104,
            info: "Monthly usage limit reached".into(),
        });
        assert_eq!(quota.kind(), FailureKind::Quota);
        assert!(quota.is_quota());

        let transport = BatchError::from(FxError::Transport {
            provider: "fixer".into(),
            status: 503,
        });
        assert_eq!(transport.kind(), FailureKind::Transport);

        let parser = BatchError::from(FxError::Parser {
            provider: "fixer".into(),
            message: "Error code 101. invalid_access_key".into(),
        });
        assert_eq!(parser.kind(), FailureKind::Parser);
        assert_eq!(
            parser.describe(),
            "Parser error. Unable to complete: fixer parser error. Error code 101. invalid_access_key"
        );

        let validation = BatchError::from(StoreError::from(ValidationError::InvalidValue(
            "NaN".into(),
        )));
        assert_eq!(validation.kind(), FailureKind::Validation);

        let io = BatchError::from(StoreError::from(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )));
        assert_eq!(io.kind(), FailureKind::Storage);
    }
}
