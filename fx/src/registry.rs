//! Static registry of rate providers, resolved by name at startup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::currencylayer::{self, CurrencyLayerApi};
use crate::error::{FxError, FxResult};
use crate::fixer::{self, FixerApi};
use crate::provider::{HttpRateProvider, RateProvider};

/// Settings every provider factory draws from.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Access key per provider name.
    pub access_keys: HashMap<String, String>,
    /// Endpoint overrides per provider name.
    pub endpoints: HashMap<String, String>,
    /// HTTP request timeout.
    pub request_timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            access_keys: HashMap::new(),
            endpoints: HashMap::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ProviderSettings {
    /// Load access keys (`<NAME>_ACCESS_KEY`) and endpoints (`<NAME>_ENDPOINT`)
    /// for every registered provider from the environment.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        for name in provider_names() {
            let prefix = name.to_uppercase();
            if let Ok(key) = std::env::var(format!("{}_ACCESS_KEY", prefix)) {
                settings.access_keys.insert(name.to_string(), key);
            }
            if let Ok(endpoint) = std::env::var(format!("{}_ENDPOINT", prefix)) {
                settings.endpoints.insert(name.to_string(), endpoint);
            }
        }

        if let Ok(timeout) = std::env::var("FOREX_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                settings.request_timeout = Duration::from_secs(secs);
            }
        }

        settings
    }

    pub fn with_access_key(mut self, provider: &str, key: impl Into<String>) -> Self {
        self.access_keys.insert(provider.to_string(), key.into());
        self
    }

    fn access_key(&self, provider: &str) -> FxResult<&str> {
        match self.access_keys.get(provider) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(FxError::Configuration(format!(
                "Missing access key for {}",
                provider
            ))),
        }
    }

    fn endpoint<'a>(&'a self, provider: &str, default: &'a str) -> &'a str {
        self.endpoints
            .get(provider)
            .map(String::as_str)
            .unwrap_or(default)
    }
}

/// Builds a provider from settings.
pub type ProviderFactory = fn(&ProviderSettings) -> FxResult<Arc<dyn RateProvider>>;

/// Every known provider, by name.
pub const PROVIDERS: &[(&str, ProviderFactory)] = &[
    (fixer::NAME, build_fixer),
    (currencylayer::NAME, build_currencylayer),
];

fn build_fixer(settings: &ProviderSettings) -> FxResult<Arc<dyn RateProvider>> {
    let api = FixerApi::with_endpoint(
        settings.endpoint(fixer::NAME, fixer::DEFAULT_ENDPOINT),
        settings.access_key(fixer::NAME)?,
    );
    Ok(Arc::new(HttpRateProvider::new(api, settings.request_timeout)?))
}

fn build_currencylayer(settings: &ProviderSettings) -> FxResult<Arc<dyn RateProvider>> {
    let api = CurrencyLayerApi::with_endpoint(
        settings.endpoint(currencylayer::NAME, currencylayer::DEFAULT_ENDPOINT),
        settings.access_key(currencylayer::NAME)?,
    );
    Ok(Arc::new(HttpRateProvider::new(api, settings.request_timeout)?))
}

/// Names accepted as a provider source.
pub fn provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|(name, _)| *name).collect()
}

/// Find the factory registered under `name`.
pub fn resolve(name: &str) -> FxResult<ProviderFactory> {
    PROVIDERS
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, factory)| *factory)
        .ok_or_else(|| FxError::UnknownProvider(name.to_string()))
}

/// Resolve and build the provider registered under `name`.
pub fn build_provider(name: &str, settings: &ProviderSettings) -> FxResult<Arc<dyn RateProvider>> {
    let factory = resolve(name)?;
    factory(settings)
}
