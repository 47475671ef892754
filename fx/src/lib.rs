//! ForexSync FX Providers
//!
//! Exchange-rate provider contract and the rate sources behind it.
//!
//! # Features
//!
//! - A single `pull` operation filling every pair of a pair package
//! - Quota and parser failure classification shared by every provider
//! - Cross-rate derivation against each provider's fixed base currency
//! - Static registry resolving providers by name
//!
//! # Example
//!
//! ```rust,ignore
//! use forexsync_common::PairPackage;
//! use forexsync_fx::{registry, ProviderSettings};
//!
//! let provider = registry::build_provider("fixer", &ProviderSettings::from_env())?;
//! let package = PairPackage::with_default_pairs(forexsync_common::today());
//! let filled = provider.pull(package).await?;
//! ```

pub mod provider;
pub mod fixer;
pub mod currencylayer;
pub mod registry;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use provider::{HttpRateProvider, RateApi, RateProvider, RateTable};
pub use registry::ProviderSettings;
pub use error::{FxError, FxResult};
