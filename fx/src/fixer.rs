//! fixer.io rate API.
//!
//! Rates are quoted against EUR. Latest rates come from `/latest`, past days
//! from `/YYYY-MM-DD`; the response carries a `rates` map keyed by currency code.

use chrono::NaiveDate;
use forexsync_common::Currency;
use serde_json::Value;

use crate::error::{FxError, FxResult};
use crate::provider::{decimal_from_json, join_codes, RateApi, RateTable};

pub const NAME: &str = "fixer";
pub const DEFAULT_ENDPOINT: &str = "http://data.fixer.io/api/";

/// fixer.io request/response shape.
#[derive(Debug, Clone)]
pub struct FixerApi {
    endpoint: String,
    access_key: String,
}

impl FixerApi {
    pub fn new(access_key: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, access_key)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
        }
    }
}

impl RateApi for FixerApi {
    fn name(&self) -> &'static str {
        NAME
    }

    fn base_currency(&self) -> Currency {
        Currency::EUR
    }

    fn request_url(
        &self,
        currencies: &[Currency],
        exchange_date: NaiveDate,
        today: NaiveDate,
    ) -> String {
        let mode = if exchange_date == today {
            "latest".to_string()
        } else {
            exchange_date.format("%Y-%m-%d").to_string()
        };

        format!(
            "{}{}?access_key={}&symbols={}",
            self.endpoint,
            mode,
            self.access_key,
            join_codes(currencies)
        )
    }

    fn extract_rates(&self, body: &Value) -> FxResult<RateTable> {
        let rates = body
            .get("rates")
            .and_then(Value::as_object)
            .ok_or_else(|| FxError::parser(NAME, "Response has no rates"))?;

        let mut table = RateTable::new();
        for (code, raw) in rates {
            // Codes outside the supported set are not needed for any pair.
            let Ok(currency) = Currency::new(code) else {
                continue;
            };
            let value = decimal_from_json(raw)
                .ok_or_else(|| FxError::parser(NAME, format!("Invalid rate for {}: {}", code, raw)))?;
            table.insert(currency, value);
        }
        Ok(table)
    }
}
