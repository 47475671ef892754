//! Validation errors for the exchange-rate data model.

use chrono::NaiveDate;
use thiserror::Error;

use crate::Currency;

/// Errors raised when a rate pair, pair package or task field fails validation.
///
/// Validation failures are programmer or caller errors: they are returned
/// immediately and never coerced into a default.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Currency code is not part of the supported set.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Rate value is not a finite number.
    #[error("Invalid rate value: {0}")]
    InvalidValue(String),

    /// Exchange date could not be interpreted.
    #[error("Invalid exchange date: {0}")]
    InvalidDate(String),

    /// A pair that must carry a value does not.
    #[error("Pair {base}/{quote} is lacking a value")]
    MissingValue { base: Currency, quote: Currency },

    /// Package has no pairs to work on.
    #[error("Pair package for {0} has no pairs")]
    EmptyPackage(NaiveDate),

    /// Wrong number of pairs for the requested operation.
    #[error("Expected {expected} pair(s), got {actual}")]
    PairCount { expected: usize, actual: usize },
}

impl ValidationError {
    /// Name of the offending field, for diagnostics.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::UnsupportedCurrency(_) => "currency",
            ValidationError::InvalidValue(_) | ValidationError::MissingValue { .. } => "value",
            ValidationError::InvalidDate(_) => "exchangeDate",
            ValidationError::EmptyPackage(_) | ValidationError::PairCount { .. } => "pairs",
        }
    }
}

/// Result type alias for data model operations.
pub type Result<T> = std::result::Result<T, ValidationError>;
