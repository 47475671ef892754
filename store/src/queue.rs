//! Ingestion task queue.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use forexsync_common::{now, Timestamp};

use crate::error::{StoreError, StoreResult};
use crate::task::{IngestionTask, RecordStatus};

/// Shared queue of ingestion tasks.
///
/// Claiming is atomic: a task is handed to at most one worker until it is
/// written back with [`TaskQueue::update`] or reclaimed as stale.
pub trait TaskQueue: Send + Sync {
    /// Lock and return the earliest eligible pending task.
    fn claim_next(&self) -> StoreResult<Option<IngestionTask>>;

    /// Release locks held longer than `dead_time`. Returns how many were released.
    fn reclaim_stale(&self, dead_time: Duration) -> StoreResult<usize>;

    /// Pending tasks not currently locked.
    fn count_waiting(&self) -> StoreResult<usize>;

    /// Persist a claimed task and release its lock.
    fn update(&self, task: &IngestionTask) -> StoreResult<()>;

    fn insert_one(&self, task: IngestionTask) -> StoreResult<()>;

    fn insert_many(&self, tasks: Vec<IngestionTask>) -> StoreResult<()>;

    /// Tasks currently locked by a worker.
    fn count_locked(&self) -> StoreResult<usize>;

    /// Tasks parked in `ERROR` for manual revision.
    fn count_pending_revision(&self) -> StoreResult<usize>;
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueEntry {
    task: IngestionTask,
    locked_at: Option<Timestamp>,
}

impl QueueEntry {
    fn claimable(&self, at: Timestamp) -> bool {
        self.locked_at.is_none()
            && self.task.record_status().is_pending()
            && self.task.processing_date() <= at
    }
}

/// Queue held in process memory.
#[derive(Default)]
pub struct InMemoryTaskQueue {
    entries: Mutex<Vec<QueueEntry>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a task. Locked tasks report [`RecordStatus::Locked`].
    pub fn get(&self, id: Uuid) -> Option<IngestionTask> {
        self.entries
            .lock()
            .iter()
            .find(|entry| entry.task.id() == id)
            .map(Self::visible)
    }

    /// Every task, in insertion order.
    pub fn snapshot(&self) -> Vec<IngestionTask> {
        self.entries.lock().iter().map(Self::visible).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn visible(entry: &QueueEntry) -> IngestionTask {
        let mut task = entry.task.clone();
        if entry.locked_at.is_some() {
            task.set_status(RecordStatus::Locked);
        }
        task
    }
}

impl TaskQueue for InMemoryTaskQueue {
    fn claim_next(&self) -> StoreResult<Option<IngestionTask>> {
        let at = now();
        let mut entries = self.entries.lock();

        let next = entries
            .iter_mut()
            .filter(|entry| entry.claimable(at))
            .min_by_key(|entry| entry.task.processing_date());

        Ok(next.map(|entry| {
            entry.locked_at = Some(at);
            debug!(task_id = %entry.task.id(), "Task claimed");
            entry.task.clone()
        }))
    }

    fn reclaim_stale(&self, dead_time: Duration) -> StoreResult<usize> {
        let cutoff = match chrono::Duration::from_std(dead_time)
            .ok()
            .and_then(|dead_time| now().checked_sub_signed(dead_time))
        {
            Some(cutoff) => cutoff,
            None => return Ok(0),
        };

        let mut released = 0;
        for entry in self.entries.lock().iter_mut() {
            if matches!(entry.locked_at, Some(locked_at) if locked_at <= cutoff) {
                warn!(task_id = %entry.task.id(), "Releasing stale task lock");
                entry.locked_at = None;
                released += 1;
            }
        }

        if released > 0 {
            info!(released, "Stale task locks released");
        }
        Ok(released)
    }

    fn count_waiting(&self) -> StoreResult<usize> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|entry| entry.locked_at.is_none() && entry.task.record_status().is_pending())
            .count())
    }

    fn update(&self, task: &IngestionTask) -> StoreResult<()> {
        let mut entries = self.entries.lock();
        let entry = entries
            .iter_mut()
            .find(|entry| entry.task.id() == task.id())
            .ok_or(StoreError::TaskNotFound(task.id()))?;

        entry.task = task.clone();
        entry.locked_at = None;
        Ok(())
    }

    fn insert_one(&self, task: IngestionTask) -> StoreResult<()> {
        self.insert_many(vec![task])
    }

    fn insert_many(&self, tasks: Vec<IngestionTask>) -> StoreResult<()> {
        for task in &tasks {
            if !task.record_status().is_pending() {
                return Err(StoreError::InvalidStatus(task.record_status()));
            }
        }

        let mut entries = self.entries.lock();
        entries.extend(tasks.into_iter().map(|task| QueueEntry {
            task,
            locked_at: None,
        }));
        Ok(())
    }

    fn count_locked(&self) -> StoreResult<usize> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|entry| entry.locked_at.is_some())
            .count())
    }

    fn count_pending_revision(&self) -> StoreResult<usize> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|entry| {
                entry.locked_at.is_none() && entry.task.record_status() == RecordStatus::Error
            })
            .count())
    }
}

/// Queue persisted to a JSON file after every mutation.
///
/// Claims are exclusive within one process only; several processes must not
/// share the same file.
pub struct JsonFileTaskQueue {
    path: PathBuf,
    inner: InMemoryTaskQueue,
}

impl JsonFileTaskQueue {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries: Vec<QueueEntry> = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)
                .map_err(|e| StoreError::corrupt(path.display().to_string(), e))?
        } else {
            Vec::new()
        };
        info!(path = %path.display(), tasks = entries.len(), "Task queue loaded");

        Ok(Self {
            path,
            inner: InMemoryTaskQueue {
                entries: Mutex::new(entries),
            },
        })
    }

    pub fn get(&self, id: Uuid) -> Option<IngestionTask> {
        self.inner.get(id)
    }

    fn persist(&self) -> StoreResult<()> {
        let entries = self.inner.entries.lock().clone();
        let raw = serde_json::to_string_pretty(&entries)
            .map_err(|e| StoreError::corrupt(self.path.display().to_string(), e))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TaskQueue for JsonFileTaskQueue {
    fn claim_next(&self) -> StoreResult<Option<IngestionTask>> {
        let claimed = self.inner.claim_next()?;
        if claimed.is_some() {
            self.persist()?;
        }
        Ok(claimed)
    }

    fn reclaim_stale(&self, dead_time: Duration) -> StoreResult<usize> {
        let released = self.inner.reclaim_stale(dead_time)?;
        if released > 0 {
            self.persist()?;
        }
        Ok(released)
    }

    fn count_waiting(&self) -> StoreResult<usize> {
        self.inner.count_waiting()
    }

    fn update(&self, task: &IngestionTask) -> StoreResult<()> {
        self.inner.update(task)?;
        self.persist()
    }

    fn insert_one(&self, task: IngestionTask) -> StoreResult<()> {
        self.inner.insert_one(task)?;
        self.persist()
    }

    fn insert_many(&self, tasks: Vec<IngestionTask>) -> StoreResult<()> {
        self.inner.insert_many(tasks)?;
        self.persist()
    }

    fn count_locked(&self) -> StoreResult<usize> {
        self.inner.count_locked()
    }

    fn count_pending_revision(&self) -> StoreResult<usize> {
        self.inner.count_pending_revision()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forexsync_common::{today, PairPackage};

    fn task() -> IngestionTask {
        IngestionTask::new(PairPackage::with_default_pairs(today()))
    }

    #[test]
    fn test_claim_is_exclusive() {
        let queue = InMemoryTaskQueue::new();
        let task = task();
        let id = task.id();
        queue.insert_one(task).unwrap();

        let claimed = queue.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id(), id);
        assert!(queue.claim_next().unwrap().is_none());
        assert_eq!(queue.get(id).unwrap().record_status(), RecordStatus::Locked);
        assert_eq!(queue.count_locked().unwrap(), 1);
        assert_eq!(queue.count_waiting().unwrap(), 0);
    }

    #[test]
    fn test_claim_earliest_first() {
        let queue = InMemoryTaskQueue::new();
        let later = task();
        let earlier = task().scheduled_at(now() - chrono::Duration::hours(2));
        let earlier_id = earlier.id();
        queue.insert_many(vec![later, earlier]).unwrap();

        assert_eq!(queue.claim_next().unwrap().unwrap().id(), earlier_id);
    }

    #[test]
    fn test_future_tasks_not_claimed() {
        let queue = InMemoryTaskQueue::new();
        queue
            .insert_one(task().scheduled_at(now() + chrono::Duration::days(1)))
            .unwrap();

        assert!(queue.claim_next().unwrap().is_none());
        assert_eq!(queue.count_waiting().unwrap(), 1);
    }

    #[test]
    fn test_update_releases_lock() {
        let queue = InMemoryTaskQueue::new();
        queue.insert_one(task()).unwrap();

        let mut claimed = queue.claim_next().unwrap().unwrap();
        claimed.fail("Parser error. Unable to complete: bad body");
        queue.update(&claimed).unwrap();

        let stored = queue.get(claimed.id()).unwrap();
        assert_eq!(stored.record_status(), RecordStatus::Error);
        assert_eq!(queue.count_locked().unwrap(), 0);
        assert_eq!(queue.count_pending_revision().unwrap(), 1);
        assert!(queue.claim_next().unwrap().is_none());
    }

    #[test]
    fn test_update_unknown_task() {
        let queue = InMemoryTaskQueue::new();
        assert!(matches!(
            queue.update(&task()),
            Err(StoreError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_reclaim_stale() {
        let queue = InMemoryTaskQueue::new();
        queue.insert_one(task()).unwrap();
        queue.claim_next().unwrap().unwrap();

        assert_eq!(queue.reclaim_stale(Duration::from_secs(3600)).unwrap(), 0);
        assert_eq!(queue.reclaim_stale(Duration::ZERO).unwrap(), 1);
        assert_eq!(queue.count_locked().unwrap(), 0);
        assert!(queue.claim_next().unwrap().is_some());
    }

    #[test]
    fn test_insert_rejects_terminal_status() {
        let queue = InMemoryTaskQueue::new();
        let mut done = task();
        done.complete();

        assert!(matches!(
            queue.insert_many(vec![task(), done]),
            Err(StoreError::InvalidStatus(RecordStatus::DoneArchived))
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_file_queue_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("forexsync-queue-{}", Uuid::new_v4()));
        let path = dir.join("tasks.json");

        let queue = JsonFileTaskQueue::open(&path).unwrap();
        let first = task().scheduled_at(now() - chrono::Duration::minutes(5));
        let first_id = first.id();
        let pending = task();
        let pending_id = pending.id();
        queue.insert_many(vec![pending, first]).unwrap();
        let claimed = queue.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id(), first_id);
        drop(queue);

        let reopened = JsonFileTaskQueue::open(&path).unwrap();
        assert_eq!(reopened.count_locked().unwrap(), 1);
        assert_eq!(reopened.count_waiting().unwrap(), 1);
        assert_eq!(
            reopened.get(claimed.id()).unwrap().record_status(),
            RecordStatus::Locked
        );
        assert_eq!(
            reopened.get(pending_id).unwrap().record_status(),
            RecordStatus::Inserted
        );
        assert_eq!(reopened.reclaim_stale(Duration::ZERO).unwrap(), 1);

        fs::remove_dir_all(dir).unwrap();
    }
}
