//! On-demand controller: drains the ingestion task queue.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use forexsync_common::PairPackage;
use forexsync_fx::RateProvider;
use forexsync_store::{ExecutionCheckpoint, IngestionTask, RateStore, RecordStatus, TaskQueue};

use crate::config::OnDemandConfig;
use crate::error::BatchResult;
use crate::ingest::{ingest, Completion};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::notifier::Notifier;

/// Process name recorded in execution checkpoints.
pub const PROCESS_NAME: &str = "forex-batch-db";

const ALREADY_STORED_NOTE: &str = "All pairs are already in the DB. Skipped parsing";

/// Result of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// A task was claimed and written back with this status.
    Processed(RecordStatus),
    /// Nothing to claim; the controller napped.
    Idle,
}

/// Claims ingestion tasks one at a time and fills them from a provider.
pub struct OnDemandController {
    store: Arc<RateStore>,
    queue: Arc<dyn TaskQueue>,
    provider: Arc<dyn RateProvider>,
    checkpoint: Arc<dyn ExecutionCheckpoint>,
    notifier: Arc<dyn Notifier>,
    config: OnDemandConfig,
    instance: String,
    strict: bool,
    metrics: Metrics,
    woke_from_nap: bool,
    last_stale_check: Option<Instant>,
}

impl OnDemandController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<RateStore>,
        queue: Arc<dyn TaskQueue>,
        provider: Arc<dyn RateProvider>,
        checkpoint: Arc<dyn ExecutionCheckpoint>,
        notifier: Arc<dyn Notifier>,
        config: OnDemandConfig,
        instance: impl Into<String>,
        strict: bool,
    ) -> Self {
        Self {
            store,
            queue,
            provider,
            checkpoint,
            notifier,
            config,
            instance: instance.into(),
            strict,
            metrics: Metrics::new(),
            woke_from_nap: false,
            last_stale_check: None,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Loop forever. Returns only on a failure in strict mode.
    pub async fn run(&mut self) -> BatchResult<()> {
        let message = format!(
            "Starting {} ({}) with {} | Strict: {}",
            PROCESS_NAME,
            self.instance,
            self.provider.name(),
            self.strict
        );
        info!("{}", message);
        self.notifier.send_message(&message);

        loop {
            if let Err(e) = self.tick().await {
                if self.strict {
                    return Err(e);
                }
                let message = format!("Batch iteration failed: {}", e);
                error!(error = %e, "Batch iteration failed");
                self.notifier.send_message(&message);
                tokio::time::sleep(self.config.idle_sleep).await;
            }
        }
    }

    /// One loop iteration: sweep stale locks when due, then claim and process
    /// a task or nap.
    pub async fn tick(&mut self) -> BatchResult<Tick> {
        self.reclaim_stale_if_due()?;

        let task = match self.queue.claim_next()? {
            Some(task) => task,
            None => {
                info!(secs = self.config.idle_sleep.as_secs(), "Nothing to do, taking a nap");
                tokio::time::sleep(self.config.idle_sleep).await;
                if !self.woke_from_nap {
                    let before = self.metrics.reset();
                    debug!(
                        ok = before.processed_ok,
                        errors = before.processed_error,
                        "Counters reset"
                    );
                    self.woke_from_nap = true;
                }
                return Ok(Tick::Idle);
            }
        };

        if self.woke_from_nap {
            // The claimed task is locked, so it is not counted as waiting.
            let waiting = self.queue.count_waiting()? + 1;
            let message = format!("Resuming processing. Encountered {} waiting tasks.", waiting);
            info!("{}", message);
            self.notifier.send_message(&message);
            self.woke_from_nap = false;
        }

        let task = self.process(task).await?;
        self.queue.update(&task)?;
        self.checkpoint.save(PROCESS_NAME, &self.instance)?;

        Ok(Tick::Processed(task.record_status()))
    }

    fn reclaim_stale_if_due(&mut self) -> BatchResult<()> {
        let due = match self.last_stale_check {
            None => true,
            Some(at) => at.elapsed() > self.config.stale_lock_check_interval,
        };
        if due {
            info!("Releasing locks of stale tasks");
            self.queue.reclaim_stale(self.config.lock_dead_time)?;
            self.last_stale_check = Some(Instant::now());
        }
        Ok(())
    }

    /// Apply the task lifecycle to a claimed task.
    #[instrument(skip(self, task), fields(task_id = %task.id(), date = %task.pair_package().exchange_date_str()))]
    pub async fn process(&self, mut task: IngestionTask) -> BatchResult<IngestionTask> {
        task.clear_notes();

        // One pull completes the whole day for later requests.
        let fetch = PairPackage::with_default_pairs(task.pair_package().exchange_date());
        let outcome = ingest(
            &self.store,
            self.provider.as_ref(),
            task.pair_package(),
            fetch,
            !task.is_forced(),
        )
        .await;

        match outcome {
            Ok(Completion::AlreadyStored) => {
                info!("{}", ALREADY_STORED_NOTE);
                task.add_note(ALREADY_STORED_NOTE);
                task.complete();
                self.metrics.record_success();
            }
            Ok(Completion::Fetched) => {
                info!("Pull succeeded");
                task.complete();
                self.metrics.record_success();
            }
            Err(e) if self.strict => return Err(e),
            Err(e) if e.is_quota() => {
                let message = format!(
                    "{} quota exceeded. Task postponed",
                    self.provider.name()
                );
                warn!(error = %e, "{}", message);
                self.notifier.send_message(&message);
                task.defer(format!("Quota exceeded. {}. Task postponed", e));
            }
            Err(e) => {
                let note = e.describe();
                error!(kind = ?e.kind(), "{}", note);
                self.notifier.send_message(&note);
                task.fail(note);
                self.metrics.record_error();
            }
        }

        Ok(task)
    }
}
