//! Data layer for the weightloss dashboard.
//!
//! Stores the event tables, converts rows into typed events, buckets them by
//! logical day and granularity, and assembles the chart data.

pub mod aggregator;
pub mod cycling_import;
pub mod dashboard;
pub mod food_log;
pub mod ingest;
pub mod macros;
pub mod store;

pub use dashboard_core as core;
