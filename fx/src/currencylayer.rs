//! currencylayer.com rate API.
//!
//! Rates are quoted against USD under `quotes`, keyed as `USD` + code
//! (`USDEUR`). Today's rates come from `/live`, past days from `/historical`.

use chrono::NaiveDate;
use forexsync_common::Currency;
use serde_json::Value;

use crate::error::{FxError, FxResult};
use crate::provider::{decimal_from_json, join_codes, RateApi, RateTable};

pub const NAME: &str = "currencylayer";
pub const DEFAULT_ENDPOINT: &str = "http://api.currencylayer.com/";

/// currencylayer.com request/response shape.
#[derive(Debug, Clone)]
pub struct CurrencyLayerApi {
    endpoint: String,
    access_key: String,
}

impl CurrencyLayerApi {
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

impl RateApi for CurrencyLayerApi {
    fn name(&self) -> &'static str {
        NAME
    }

    fn base_currency(&self) -> Currency {
        Currency::USD
    }

    fn request_url(
        &self,
        currencies: &[Currency],
        exchange_date: NaiveDate,
        today: NaiveDate,
    ) -> String {
        let mut url = format!(
            "{}{}?access_key={}&currencies={}",
            self.endpoint,
            if exchange_date == today { "live" } else { "historical" },
            self.access_key,
            join_codes(currencies)
        );
        if exchange_date != today {
            url.push_str(&format!("&date={}", exchange_date.format("%Y-%m-%d")));
        }
        url
    }

    fn extract_rates(&self, body: &Value) -> FxResult<RateTable> {
        let quotes = body
            .get("quotes")
            .and_then(Value::as_object)
            .ok_or_else(|| FxError::parser(NAME, "Response has no quotes"))?;

        let prefix = self.base_currency().code();
        let mut table = RateTable::new();
        for (key, raw) in quotes {
            let Some(code) = key.strip_prefix(prefix) else {
                continue;
            };
            let Ok(currency) = Currency::new(code) else {
                continue;
            };
            let value = decimal_from_json(raw)
                .ok_or_else(|| FxError::parser(NAME, format!("Invalid quote for {}: {}", key, raw)))?;
            table.insert(currency, value);
        }
        Ok(table)
    }
}
