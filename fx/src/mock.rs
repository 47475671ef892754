//! Mock rate provider for testing.

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use forexsync_common::{Currency, PairPackage};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;

use crate::error::{FxError, FxResult};
use crate::provider::{apply_rates, RateProvider, RateTable};

/// Failure a mock provider can be told to produce.
#[derive(Debug, Clone)]
pub enum MockFailure {
    Quota,
    Parser(String),
    Transport(u16),
}

impl MockFailure {
    fn into_error(self, provider: &str) -> FxError {
        match self {
            MockFailure::Quota => FxError::QuotaExceeded {
                provider: provider.to_string(),
                code: 104,
                info: "Monthly usage limit reached".to_string(),
            },
            MockFailure::Parser(message) => FxError::Parser {
                provider: provider.to_string(),
                message,
            },
            MockFailure::Transport(status) => FxError::Transport {
                provider: provider.to_string(),
                status,
            },
        }
    }
}

/// In-process provider quoting a configurable rate table.
pub struct MockRateProvider {
    name: String,
    base: Currency,
    rates: Mutex<RateTable>,
    rates_by_date: DashMap<NaiveDate, RateTable>,
    scripted: Mutex<VecDeque<MockFailure>>,
    failing_dates: DashMap<NaiveDate, MockFailure>,
    pulls: Mutex<Vec<NaiveDate>>,
}

impl MockRateProvider {
    /// Create a mock quoting against EUR with a rate for every supported currency.
    pub fn new(name: impl Into<String>) -> Self {
        let rates = Currency::all()
            .enumerate()
            .map(|(i, c)| (c, Decimal::ONE + Decimal::new(i as i64, 1)))
            .collect();

        Self {
            name: name.into(),
            base: Currency::EUR,
            rates: Mutex::new(rates),
            rates_by_date: DashMap::new(),
            scripted: Mutex::new(VecDeque::new()),
            failing_dates: DashMap::new(),
            pulls: Mutex::new(Vec::new()),
        }
    }

    /// Set the default rate of a currency against the provider base.
    pub fn set_rate(&self, currency: Currency, rate: Decimal) {
        self.rates.lock().insert(currency, rate);
    }

    /// Use a dedicated rate table for one exchange date.
    pub fn set_rates_for(&self, date: NaiveDate, rates: RateTable) {
        self.rates_by_date.insert(date, rates);
    }

    /// Fail the next pull, whatever its date.
    pub fn fail_next(&self, failure: MockFailure) {
        self.scripted.lock().push_back(failure);
    }

    /// Fail every pull for this date.
    pub fn fail_on(&self, date: NaiveDate, failure: MockFailure) {
        self.failing_dates.insert(date, failure);
    }

    /// Exchange dates pulled so far, in call order.
    pub fn pulled_dates(&self) -> Vec<NaiveDate> {
        self.pulls.lock().clone()
    }

    pub fn pull_count(&self) -> usize {
        self.pulls.lock().len()
    }
}

#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_currency(&self) -> Currency {
        self.base
    }

    async fn pull(&self, package: PairPackage) -> FxResult<PairPackage> {
        let date = package.exchange_date();
        self.pulls.lock().push(date);

        if let Some(failure) = self.scripted.lock().pop_front() {
            return Err(failure.into_error(&self.name));
        }
        if let Some(failure) = self.failing_dates.get(&date) {
            return Err(failure.clone().into_error(&self.name));
        }

        let rates = match self.rates_by_date.get(&date) {
            Some(rates) => rates.clone(),
            None => self.rates.lock().clone(),
        };
        apply_rates(&self.name, self.base, &rates, package)
    }
}
