//! Range walker: fills exchange dates walking backwards from a start date.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use tracing::{error, info, instrument, warn};

use forexsync_common::{today, PairPackage};
use forexsync_fx::RateProvider;
use forexsync_store::{ExecutionCheckpoint, RateStore};

use crate::config::RangeConfig;
use crate::error::BatchResult;
use crate::ingest::{ingest, Completion};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::notifier::Notifier;

/// Process name recorded in execution checkpoints.
pub const PROCESS_NAME: &str = "forex-batch-updater";

/// Result of one walker step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The date was handled and the cursor moved one day back.
    Walked(NaiveDate),
    /// Quota hit on this date; slept without moving the cursor.
    Slept(NaiveDate),
    /// Continuous pass finished; cursor restarted from today after a nap.
    Restarted,
    /// Historic window exhausted.
    Finished,
}

/// Queue-less controller driven by a date cursor.
pub struct RangeWalker {
    store: Arc<RateStore>,
    provider: Arc<dyn RateProvider>,
    checkpoint: Arc<dyn ExecutionCheckpoint>,
    notifier: Arc<dyn Notifier>,
    config: RangeConfig,
    instance: String,
    strict: bool,
    metrics: Metrics,
    cursor: NaiveDate,
    end_date: NaiveDate,
    force_sleep: Option<Duration>,
}

fn window_end(cursor: NaiveDate, days_ago: u32) -> NaiveDate {
    cursor
        .checked_sub_days(Days::new(u64::from(days_ago)))
        .unwrap_or(NaiveDate::MIN)
}

impl RangeWalker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<RateStore>,
        provider: Arc<dyn RateProvider>,
        checkpoint: Arc<dyn ExecutionCheckpoint>,
        notifier: Arc<dyn Notifier>,
        config: RangeConfig,
        instance: impl Into<String>,
        strict: bool,
    ) -> Self {
        let cursor = config.start_date.unwrap_or_else(today);
        let end_date = window_end(cursor, config.days_ago);

        Self {
            store,
            provider,
            checkpoint,
            notifier,
            config,
            instance: instance.into(),
            strict,
            metrics: Metrics::new(),
            cursor,
            end_date,
            force_sleep: None,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn cursor(&self) -> NaiveDate {
        self.cursor
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Walk until the historic window is exhausted. Never returns in
    /// continuous mode unless strict mode propagates a failure.
    pub async fn run(&mut self) -> BatchResult<MetricsSnapshot> {
        let message = format!(
            "Starting {} ({}) with {} | Historic: {} | Strict: {}",
            PROCESS_NAME,
            self.instance,
            self.provider.name(),
            self.config.is_historic(),
            self.strict
        );
        info!(cursor = %self.cursor, end_date = %self.end_date, "{}", message);
        self.notifier.send_message(&message);

        loop {
            if self.step().await? == Step::Finished {
                info!("Work finished. Exiting.");
                return Ok(self.metrics.snapshot());
            }
        }
    }

    /// Handle the date under the cursor, or close the current pass.
    pub async fn step(&mut self) -> BatchResult<Step> {
        if self.cursor < self.end_date {
            if self.config.is_historic() {
                return Ok(Step::Finished);
            }
            self.restart().await?;
            return Ok(Step::Restarted);
        }

        let date = self.cursor;
        self.handle_date(date).await?;

        if let Some(duration) = self.force_sleep.take() {
            info!(
                hours = duration.as_secs() / 3600,
                "Force sleeping. Current date and counters will not be modified"
            );
            tokio::time::sleep(duration).await;
            return Ok(Step::Slept(date));
        }

        match date.pred_opt() {
            Some(previous) => self.cursor = previous,
            None => return Ok(Step::Finished),
        }
        Ok(Step::Walked(date))
    }

    async fn restart(&mut self) -> BatchResult<()> {
        if let Err(e) = self.checkpoint.save(PROCESS_NAME, &self.instance) {
            if self.strict {
                return Err(e.into());
            }
            warn!(error = %e, "Unable to save execution checkpoint");
        }

        let before = self.metrics.reset();
        info!(
            ok = before.processed_ok,
            errors = before.processed_error,
            "Resetting counters and current date"
        );

        self.cursor = today();
        self.end_date = window_end(self.cursor, self.config.days_ago);

        info!(hours = self.config.nap.as_secs() / 3600, "Work finished, taking a nap");
        tokio::time::sleep(self.config.nap).await;
        Ok(())
    }

    fn package_for(&self, date: NaiveDate) -> PairPackage {
        match &self.config.currencies {
            Some(currencies) => PairPackage::with_custom_pairs(date, currencies),
            None => PairPackage::with_default_pairs(date),
        }
    }

    #[instrument(skip(self))]
    async fn handle_date(&mut self, date: NaiveDate) -> BatchResult<()> {
        let package = self.package_for(date);
        let outcome = ingest(
            &self.store,
            self.provider.as_ref(),
            &package,
            package.clone(),
            true,
        )
        .await;

        match outcome {
            Ok(Completion::AlreadyStored) => {
                info!("All pairs are already in the DB. Skipped parsing");
                self.metrics.record_success();
            }
            Ok(Completion::Fetched) => {
                info!("Pull succeeded");
                self.metrics.record_success();
            }
            Err(e) if self.strict => return Err(e),
            Err(e) if e.is_quota() => {
                let message = format!("{} quota exceeded: {}", self.provider.name(), e);
                warn!("{}", message);
                self.notifier.send_message(&message);
                self.force_sleep = Some(self.config.quota_sleep);
            }
            Err(e) => {
                let message = format!(
                    "{}. {} unable to complete: {}",
                    e.kind().label(),
                    date,
                    e
                );
                error!(kind = ?e.kind(), "{}", message);
                self.notifier.send_message(&message);
                self.metrics.record_error();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forexsync_common::{Currency, RatePair};
    use forexsync_fx::mock::{MockFailure, MockRateProvider};
    use forexsync_store::{InMemoryCheckpoint, InMemoryRateRepository};
    use rust_decimal_macros::dec;

    use crate::error::BatchError;
    use crate::notifier::RecordingNotifier;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, day).unwrap()
    }

    struct Harness {
        walker: RangeWalker,
        store: Arc<RateStore>,
        provider: Arc<MockRateProvider>,
        checkpoint: Arc<InMemoryCheckpoint>,
    }

    fn harness(config: RangeConfig, strict: bool) -> Harness {
        let store = Arc::new(RateStore::new(Arc::new(InMemoryRateRepository::new())));
        let provider = Arc::new(MockRateProvider::new("fixer"));
        let checkpoint = Arc::new(InMemoryCheckpoint::with_server("test"));

        let walker = RangeWalker::new(
            store.clone(),
            provider.clone(),
            checkpoint.clone(),
            Arc::new(RecordingNotifier::default()),
            RangeConfig {
                nap: Duration::ZERO,
                quota_sleep: Duration::ZERO,
                ..config
            },
            "1",
            strict,
        );

        Harness { walker, store, provider, checkpoint }
    }

    fn historic(days_ago: u32) -> RangeConfig {
        RangeConfig {
            start_date: Some(date(10)),
            days_ago,
            ..RangeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_historic_walk_terminates() {
        let mut h = harness(historic(5), false);

        let snapshot = h.walker.run().await.unwrap();

        assert_eq!(
            h.provider.pulled_dates(),
            vec![date(10), date(9), date(8), date(7), date(6), date(5)]
        );
        assert_eq!(snapshot.processed_ok, 6);
        assert!(h.store.find_full(date(4)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stored_dates_are_skipped() {
        let mut h = harness(
            RangeConfig {
                currencies: Some(vec![Currency::USD, Currency::EUR]),
                ..historic(1)
            },
            false,
        );
        h.store
            .merge(&PairPackage::for_date(date(10)).with_pairs(vec![
                RatePair::new("USD", "EUR").unwrap().with_value(dec!(0.9)).unwrap(),
                RatePair::new("EUR", "USD").unwrap().with_value(dec!(1.1)).unwrap(),
            ]))
            .unwrap();

        assert_eq!(h.walker.step().await.unwrap(), Step::Walked(date(10)));
        assert_eq!(h.walker.step().await.unwrap(), Step::Walked(date(9)));
        assert_eq!(h.walker.step().await.unwrap(), Step::Finished);

        assert_eq!(h.provider.pulled_dates(), vec![date(9)]);
        assert_eq!(h.walker.metrics().processed_ok, 2);
        let stored = h.store.find_full(date(9)).unwrap().unwrap();
        assert_eq!(stored.pairs().len(), 2);
    }

    #[tokio::test]
    async fn test_quota_keeps_cursor() {
        let mut h = harness(historic(1), false);
        h.provider.fail_next(MockFailure::Quota);

        assert_eq!(h.walker.step().await.unwrap(), Step::Slept(date(10)));
        assert_eq!(h.walker.cursor(), date(10));
        assert_eq!(h.walker.metrics(), MetricsSnapshot::default());

        assert_eq!(h.walker.step().await.unwrap(), Step::Walked(date(10)));
        assert_eq!(h.provider.pulled_dates(), vec![date(10), date(10)]);
    }

    #[tokio::test]
    async fn test_failure_still_advances() {
        let mut h = harness(historic(1), false);
        h.provider
            .fail_on(date(10), MockFailure::Parser("Error code 202. invalid_currency_codes".into()));

        let step = tokio_test::assert_ok!(h.walker.step().await);
        assert_eq!(step, Step::Walked(date(10)));
        assert_eq!(h.walker.step().await.unwrap(), Step::Walked(date(9)));

        let metrics = h.walker.metrics();
        assert_eq!(metrics.processed_error, 1);
        assert_eq!(metrics.processed_ok, 1);
        assert!(h.store.find_full(date(10)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_strict_mode_propagates() {
        let mut h = harness(historic(1), true);
        h.provider.fail_next(MockFailure::Transport(500));

        let result = h.walker.step().await;

        assert!(matches!(result, Err(BatchError::Provider(_))));
        assert_eq!(h.walker.cursor(), date(10));
    }

    #[tokio::test]
    async fn test_continuous_pass_restarts_from_today() {
        let mut h = harness(
            RangeConfig {
                days_ago: 1,
                ..RangeConfig::default()
            },
            false,
        );
        let start = today();

        assert_eq!(h.walker.step().await.unwrap(), Step::Walked(start));
        assert_eq!(h.walker.step().await.unwrap(), Step::Walked(start.pred_opt().unwrap()));
        assert_eq!(h.walker.step().await.unwrap(), Step::Restarted);

        assert_eq!(h.walker.metrics(), MetricsSnapshot::default());
        assert_eq!(h.walker.cursor(), today());
        assert!(h.checkpoint.last(PROCESS_NAME, "1").unwrap().is_some());

        // Dates are stored now, so the next pass does not pull.
        assert_eq!(h.walker.step().await.unwrap(), Step::Walked(today()));
        assert_eq!(h.provider.pull_count(), 2);
    }
}
