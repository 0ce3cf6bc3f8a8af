//! Elastic-net selection over a bank of trading indicators.
//!
//! - `models::cd` - coordinate descent engine, lambda path and cross validation
//! - `estimators` - training bias estimation for stochastic searches
//! - `indicators` - moving-average crossover indicator bank
//! - `core::io` - price files, train/test splitting and targets

pub mod core;
pub mod error;
pub mod estimators;
pub mod indicators;
pub mod models;

pub use error::{CdError, Result};
