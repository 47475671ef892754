//! ForexSync Store
//!
//! Rate documents reconciled per exchange date, plus the ingestion task
//! queue and execution checkpoints used by the batch workers.

pub mod error;
pub mod repository;
pub mod rates;
pub mod task;
pub mod queue;
pub mod checkpoint;
pub mod handler;

pub use error::{StoreError, StoreResult};
pub use repository::{InMemoryRateRepository, JsonFileRateRepository, RateRepository};
pub use rates::{reconcile, RateStore};
pub use task::{IngestionTask, RecordStatus};
pub use queue::{InMemoryTaskQueue, JsonFileTaskQueue, TaskQueue};
pub use checkpoint::{server_name, Checkpoint, ExecutionCheckpoint, FileCheckpoint, InMemoryCheckpoint};
pub use handler::ForexHandler;
