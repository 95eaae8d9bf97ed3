//! Domain types and pure helpers for the weightloss dashboard.
//!
//! Holds the record types, the error taxonomy, the day-band classifier,
//! calendar bucketing, nutrient scaling and CLI settings. Nothing here
//! performs I/O except [`settings::LastUsedParams`].

pub mod error;
pub mod models;
pub mod nutrition;
pub mod periods;
pub mod settings;
pub mod time_utils;
