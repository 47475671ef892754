//! Ingestion tasks and their lifecycle.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use forexsync_common::{now, postpone, PairPackage, Timestamp};

use crate::error::{StoreError, StoreResult};

/// Lifecycle status of an ingestion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    /// Waiting for a worker.
    Inserted,
    /// Claimed by a worker.
    Locked,
    /// Waiting, and must be pulled even if rates are already stored.
    ForceProcess,
    /// Failed and parked for manual revision.
    Error,
    /// Processed.
    DoneArchived,
}

impl RecordStatus {
    /// Statuses a worker may claim.
    pub fn is_pending(&self) -> bool {
        matches!(self, RecordStatus::Inserted | RecordStatus::ForceProcess)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Error | RecordStatus::DoneArchived)
    }
}

/// A queued request to ingest one pair package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionTask {
    id: Uuid,
    pair_package: PairPackage,
    record_status: RecordStatus,
    #[serde(default)]
    record_notes: Vec<String>,
    processing_date: Timestamp,
}

impl IngestionTask {
    /// New task, eligible immediately.
    pub fn new(pair_package: PairPackage) -> Self {
        Self {
            id: Uuid::now_v7(),
            pair_package,
            record_status: RecordStatus::Inserted,
            record_notes: Vec::new(),
            processing_date: now(),
        }
    }

    /// New task that bypasses the stored-rates shortcut.
    pub fn forced(pair_package: PairPackage) -> Self {
        Self {
            record_status: RecordStatus::ForceProcess,
            ..Self::new(pair_package)
        }
    }

    /// New task with an explicit pending status.
    pub fn with_status(pair_package: PairPackage, status: RecordStatus) -> StoreResult<Self> {
        if !status.is_pending() {
            return Err(StoreError::InvalidStatus(status));
        }
        Ok(Self {
            record_status: status,
            ..Self::new(pair_package)
        })
    }

    /// Delay eligibility until `processing_date`.
    pub fn scheduled_at(mut self, processing_date: Timestamp) -> Self {
        self.processing_date = processing_date;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pair_package(&self) -> &PairPackage {
        &self.pair_package
    }

    pub fn record_status(&self) -> RecordStatus {
        self.record_status
    }

    pub fn record_notes(&self) -> &[String] {
        &self.record_notes
    }

    pub fn processing_date(&self) -> Timestamp {
        self.processing_date
    }

    pub fn is_forced(&self) -> bool {
        self.record_status == RecordStatus::ForceProcess
    }

    pub fn clear_notes(&mut self) {
        self.record_notes.clear();
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.record_notes.push(note.into());
    }

    /// Archive as processed.
    pub fn complete(&mut self) {
        self.record_status = RecordStatus::DoneArchived;
    }

    /// Park for manual revision.
    pub fn fail(&mut self, note: impl Into<String>) {
        self.record_status = RecordStatus::Error;
        self.add_note(note);
    }

    /// Return to the queue one day later.
    pub fn defer(&mut self, note: impl Into<String>) {
        self.record_status = RecordStatus::Inserted;
        self.processing_date = postpone(self.processing_date);
        self.add_note(note);
    }

    /// Set the status as stored by the queue.
    pub(crate) fn set_status(&mut self, status: RecordStatus) {
        self.record_status = status;
    }
}
