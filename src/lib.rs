//! PharmaStock consumption forecasting engine
//!
//! Predicts pharmaceutical consumption for a product over a month, quarter or
//! year, explains every number it produces and turns the prediction into
//! safety stock and reorder advice. Collaborators (history, stock, catalog and
//! forecast storage) are reached through the traits in [`repositories`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod repositories;
pub mod services;

pub use errors::ServiceError;
pub use models::{ForecastAlgorithm, ForecastPeriod, ForecastResult};
pub use services::{BulkGenerationRequest, BulkRunControl, ForecastingService};
