//! Rate provider contract and the HTTP provider shared by every rate API.

use async_trait::async_trait;
use chrono::NaiveDate;
use forexsync_common::{time, Currency, PairPackage, ValidationError};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::{FxError, FxResult};

/// Rates quoted by a provider against its fixed base currency.
pub type RateTable = HashMap<Currency, Decimal>;

/// Trait for exchange-rate providers.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Fixed currency every provider rate is quoted against.
    fn base_currency(&self) -> Currency;

    /// Fill in the value of every pair in the package, or fail.
    async fn pull(&self, package: PairPackage) -> FxResult<PairPackage>;
}

/// Provider-specific request and response shape.
///
/// Everything else (validation, transport, error classification and rate
/// derivation) is shared by [`HttpRateProvider`].
pub trait RateApi: Send + Sync {
    fn name(&self) -> &'static str;

    fn base_currency(&self) -> Currency;

    /// Provider error code meaning the request quota is exhausted.
    fn quota_error_code(&self) -> i64 {
        104
    }

    /// URL for the given currencies on the given date.
    fn request_url(&self, currencies: &[Currency], exchange_date: NaiveDate, today: NaiveDate)
        -> String;

    /// Extract the rate table from a successful response body.
    fn extract_rates(&self, body: &Value) -> FxResult<RateTable>;
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

/// Check the success flag of a response body and classify provider errors.
pub fn check_envelope(api: &dyn RateApi, body: &Value) -> FxResult<()> {
    let envelope: Envelope = serde_json::from_value(body.clone())
        .map_err(|e| FxError::parser(api.name(), format!("Unexpected response: {}", e)))?;

    if envelope.success {
        return Ok(());
    }

    let error = envelope
        .error
        .ok_or_else(|| FxError::parser(api.name(), "Request failed without error details"))?;

    if error.code == api.quota_error_code() {
        return Err(FxError::QuotaExceeded {
            provider: api.name().to_string(),
            code: error.code,
            info: error.info,
        });
    }

    Err(FxError::parser(
        api.name(),
        format!("Error code {}. {}", error.code, error.info),
    ))
}

/// Read a JSON number as a decimal without going through `f64` when possible.
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
                .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok()))
        }
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

/// Cross rate of `quote` per unit of `base`, both quoted against a common base.
pub fn cross_rate(base_rate: Decimal, quote_rate: Decimal) -> Option<Decimal> {
    quote_rate.checked_div(base_rate)
}

/// Fill every pair of the package from a rate table quoted against `provider_base`.
///
/// Pairs whose base is the provider base take the quoted rate directly; every
/// other pair is derived as `rate[quote] / rate[base]`.
pub fn apply_rates(
    provider: &str,
    provider_base: Currency,
    rates: &RateTable,
    mut package: PairPackage,
) -> FxResult<PairPackage> {
    let lookup = |currency: Currency| -> FxResult<Decimal> {
        if currency == provider_base {
            return Ok(Decimal::ONE);
        }
        rates
            .get(&currency)
            .copied()
            .ok_or_else(|| FxError::parser(provider, format!("Missing rate for {}", currency)))
    };

    for pair in package.pairs_mut().iter_mut() {
        let quote_rate = lookup(pair.quote())?;
        let value = if pair.base() == provider_base {
            quote_rate
        } else {
            let base_rate = lookup(pair.base())?;
            cross_rate(base_rate, quote_rate).ok_or_else(|| {
                FxError::parser(provider, format!("Zero rate for {}", pair.base()))
            })?
        };
        pair.set_value(value)?;
    }

    Ok(package)
}

/// Provider speaking HTTP to a [`RateApi`].
pub struct HttpRateProvider<A: RateApi> {
    api: A,
    client: reqwest::Client,
}

impl<A: RateApi> HttpRateProvider<A> {
    /// Create a provider with the given request timeout.
    pub fn new(api: A, timeout: Duration) -> FxResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FxError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { api, client })
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    async fn fetch(&self, url: &str) -> FxResult<Value> {
        let http_error = |e: reqwest::Error| FxError::Http {
            provider: self.api.name().to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(http_error)?;

        if !response.status().is_success() {
            return Err(FxError::Transport {
                provider: self.api.name().to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await.map_err(http_error)?;
        serde_json::from_str(&body)
            .map_err(|e| FxError::parser(self.api.name(), format!("Malformed response: {}", e)))
    }
}

#[async_trait]
impl<A: RateApi> RateProvider for HttpRateProvider<A> {
    fn name(&self) -> &str {
        self.api.name()
    }

    fn base_currency(&self) -> Currency {
        self.api.base_currency()
    }

    #[instrument(skip(self, package), fields(provider = self.api.name(), exchange_date = %package.exchange_date()))]
    async fn pull(&self, package: PairPackage) -> FxResult<PairPackage> {
        if package.pairs().is_empty() {
            return Err(ValidationError::EmptyPackage(package.exchange_date()).into());
        }

        let currencies: Vec<Currency> = package.currencies().into_iter().collect();
        let url = self
            .api
            .request_url(&currencies, package.exchange_date(), time::today());

        debug!(currencies = currencies.len(), "Requesting rates");
        let body = self.fetch(&url).await?;

        check_envelope(&self.api, &body)?;
        let rates = self.api.extract_rates(&body)?;
        let package = apply_rates(self.api.name(), self.api.base_currency(), &rates, package)?;

        info!(pairs = package.pairs().len(), "Rates pulled");
        Ok(package)
    }
}

/// Join currency codes as `ARS,EUR,GBP`.
pub fn join_codes(currencies: &[Currency]) -> String {
    currencies
        .iter()
        .map(Currency::code)
        .collect::<Vec<_>>()
        .join(",")
}
