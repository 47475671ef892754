//! Last-execution checkpoints per process and instance.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use forexsync_common::{now, Timestamp};

use crate::error::{StoreError, StoreResult};

/// Name of the host running this process.
pub fn server_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Liveness record written after every processed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub process: String,
    pub instance: String,
    pub server: String,
    pub last_execution: Timestamp,
}

/// Stores the last execution time of each process/instance.
pub trait ExecutionCheckpoint: Send + Sync {
    /// Record an execution now.
    fn save(&self, process: &str, instance: &str) -> StoreResult<Checkpoint>;

    /// Last recorded execution on this server.
    fn last(&self, process: &str, instance: &str) -> StoreResult<Option<Checkpoint>>;
}

fn checkpoint_key(process: &str, instance: &str, server: &str) -> String {
    format!("{}/{}@{}", process, instance, server)
}

/// Checkpoints kept in memory.
pub struct InMemoryCheckpoint {
    server: String,
    entries: DashMap<String, Checkpoint>,
}

impl InMemoryCheckpoint {
    pub fn new() -> Self {
        Self::with_server(server_name())
    }

    pub fn with_server(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            entries: DashMap::new(),
        }
    }
}

impl Default for InMemoryCheckpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionCheckpoint for InMemoryCheckpoint {
    fn save(&self, process: &str, instance: &str) -> StoreResult<Checkpoint> {
        let checkpoint = Checkpoint {
            process: process.to_string(),
            instance: instance.to_string(),
            server: self.server.clone(),
            last_execution: now(),
        };
        self.entries.insert(
            checkpoint_key(process, instance, &self.server),
            checkpoint.clone(),
        );
        Ok(checkpoint)
    }

    fn last(&self, process: &str, instance: &str) -> StoreResult<Option<Checkpoint>> {
        Ok(self
            .entries
            .get(&checkpoint_key(process, instance, &self.server))
            .map(|entry| entry.clone()))
    }
}

/// Checkpoints kept in a single JSON file.
pub struct FileCheckpoint {
    server: String,
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileCheckpoint {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            server: server_name(),
            path,
            guard: Mutex::new(()),
        })
    }

    fn read_all(&self) -> StoreResult<BTreeMap<String, Checkpoint>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw)
            .map_err(|e| StoreError::corrupt(self.path.display().to_string(), e))
    }
}

impl ExecutionCheckpoint for FileCheckpoint {
    fn save(&self, process: &str, instance: &str) -> StoreResult<Checkpoint> {
        let _guard = self.guard.lock();

        let checkpoint = Checkpoint {
            process: process.to_string(),
            instance: instance.to_string(),
            server: self.server.clone(),
            last_execution: now(),
        };

        let mut all = self.read_all()?;
        all.insert(
            checkpoint_key(process, instance, &self.server),
            checkpoint.clone(),
        );
        let raw = serde_json::to_string_pretty(&all)
            .map_err(|e| StoreError::corrupt(self.path.display().to_string(), e))?;
        fs::write(&self.path, raw)?;

        debug!(process, instance, "Execution checkpoint saved");
        Ok(checkpoint)
    }

    fn last(&self, process: &str, instance: &str) -> StoreResult<Option<Checkpoint>> {
        let _guard = self.guard.lock();
        Ok(self
            .read_all()?
            .remove(&checkpoint_key(process, instance, &self.server)))
    }
}
