//! Batch configuration.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use forexsync_common::constants::{
    LOCK_DEAD_TIME, QUEUE_IDLE_SLEEP, QUOTA_COOLDOWN, RANGE_NAP, STALE_LOCK_CHECK_INTERVAL,
};
use forexsync_common::Currency;
use forexsync_fx::{registry, ProviderSettings};

use crate::error::{BatchError, BatchResult};

/// On-demand controller configuration.
#[derive(Debug, Clone)]
pub struct OnDemandConfig {
    /// Nap taken when the queue has nothing to claim.
    pub idle_sleep: Duration,
    /// Minimum time between two stale-lock sweeps.
    pub stale_lock_check_interval: Duration,
    /// Locks older than this are released.
    pub lock_dead_time: Duration,
}

impl Default for OnDemandConfig {
    fn default() -> Self {
        Self {
            idle_sleep: QUEUE_IDLE_SLEEP,
            stale_lock_check_interval: STALE_LOCK_CHECK_INTERVAL,
            lock_dead_time: LOCK_DEAD_TIME,
        }
    }
}

/// Range walker configuration.
#[derive(Debug, Clone)]
pub struct RangeConfig {
    /// Fixed start date. Enables historic mode.
    pub start_date: Option<NaiveDate>,
    /// Width of the backward window, in days.
    pub days_ago: u32,
    /// Currency subset. The full matrix when absent.
    pub currencies: Option<Vec<Currency>>,
    /// Sleep between two continuous passes.
    pub nap: Duration,
    /// Sleep after a quota failure.
    pub quota_sleep: Duration,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            days_ago: 0,
            currencies: None,
            nap: RANGE_NAP,
            quota_sleep: QUOTA_COOLDOWN,
        }
    }
}

impl RangeConfig {
    pub fn is_historic(&self) -> bool {
        self.start_date.is_some()
    }
}

/// Main batch configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Process identifier, used for checkpoints.
    pub instance: String,
    /// Propagate every per-unit failure instead of classifying it.
    pub strict: bool,
    /// Provider name.
    pub source: String,
    pub on_demand: OnDemandConfig,
    pub range: RangeConfig,
    pub providers: ProviderSettings,
    /// Root directory of the file-backed stores.
    pub data_dir: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            instance: "default".to_string(),
            strict: false,
            source: "fixer".to_string(),
            on_demand: OnDemandConfig::default(),
            range: RangeConfig::default(),
            providers: ProviderSettings::default(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .map(Duration::from_secs)
}

impl BatchConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(strict) = env_flag("FOREX_STRICT").or_else(|| env_flag("DEBUG_MODE")) {
            config.strict = strict;
        }

        if let Ok(source) = std::env::var("FOREX_SOURCE") {
            config.source = source;
        }

        if let Ok(dir) = std::env::var("FOREX_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(sleep) = env_secs("FOREX_IDLE_SLEEP_SECS") {
            config.on_demand.idle_sleep = sleep;
        }

        if let Some(nap) = env_secs("FOREX_RANGE_NAP_SECS") {
            config.range.nap = nap;
        }

        if let Some(sleep) = env_secs("FOREX_QUOTA_SLEEP_SECS") {
            config.range.quota_sleep = sleep;
        }

        config.providers = ProviderSettings::from_env();
        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> BatchResult<()> {
        if self.instance.trim().is_empty() {
            return Err(BatchError::Config("Instance cannot be empty".to_string()));
        }

        registry::resolve(&self.source)?;

        if self.data_dir.as_os_str().is_empty() {
            return Err(BatchError::Config("Data directory cannot be empty".to_string()));
        }

        if matches!(&self.range.currencies, Some(list) if list.len() < 2) {
            return Err(BatchError::Config(
                "Currency list needs at least two currencies".to_string(),
            ));
        }

        Ok(())
    }

    /// Directory holding one rate document per exchange date.
    pub fn rates_dir(&self) -> PathBuf {
        self.data_dir.join("rates")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join("tasks.json")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join("last_exec.json")
    }
}
