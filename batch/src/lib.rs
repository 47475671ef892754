//! ForexSync Batch
//!
//! Ingestion controllers keeping the rate store filled: the on-demand
//! controller drains the task queue, the range walker sweeps dates backwards.

pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notifier;
pub mod on_demand;
pub mod range_walker;

pub use config::{BatchConfig, OnDemandConfig, RangeConfig};
pub use error::{BatchError, BatchResult, FailureKind};
pub use notifier::{Notifier, TracingNotifier};
pub use on_demand::OnDemandController;
pub use range_walker::RangeWalker;
