//! ForexSync Common Types
//!
//! This crate contains the exchange-rate data model shared across ForexSync:
//! currencies, rate pairs, pair packages and the date handling they rely on.

pub mod currency;
pub mod pair;
pub mod pair_package;
pub mod error;
pub mod time;

pub use currency::*;
pub use pair::*;
pub use pair_package::*;
pub use error::*;
pub use time::*;
