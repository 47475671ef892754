//! Supported currencies.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, ValidationError};

/// Every currency the ingestion engine knows about, in generation order.
///
/// The order matters: default pair matrices are generated base-major,
/// quote-minor following this list.
pub const SUPPORTED_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CHF", "CAD", "AUD", "CNY", "BRL", "ARS", "CLP", "COP", "MXN",
    "PEN", "UYU",
];

/// ISO 4217 currency code restricted to [`SUPPORTED_CURRENCIES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Currency(&'static str);

impl Currency {
    pub const USD: Currency = Currency("USD");
    pub const EUR: Currency = Currency("EUR");
    pub const GBP: Currency = Currency("GBP");

    /// Create a currency from its code, failing if it is not supported.
    pub fn new(code: &str) -> Result<Self> {
        let normalized = code.trim().to_uppercase();
        SUPPORTED_CURRENCIES
            .iter()
            .find(|c| **c == normalized)
            .map(|c| Currency(*c))
            .ok_or_else(|| ValidationError::UnsupportedCurrency(code.to_string()))
    }

    /// Get the currency code.
    pub fn code(&self) -> &'static str {
        self.0
    }

    /// All supported currencies in generation order.
    pub fn all() -> impl Iterator<Item = Currency> {
        SUPPORTED_CURRENCIES.iter().map(|c| Currency(*c))
    }

    /// Parse a comma separated list such as `"USD, EUR,GBP"`.
    pub fn parse_list(list: &str) -> Result<Vec<Currency>> {
        list.split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(Currency::new)
            .collect()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        Currency::new(s)
    }
}

impl TryFrom<&str> for Currency {
    type Error = ValidationError;

    fn try_from(s: &str) -> Result<Self> {
        Currency::new(s)
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Currency::new(&code).map_err(de::Error::custom)
    }
}
