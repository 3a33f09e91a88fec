//! CI weather library.
//!
//! Turns already-fetched CI job runs and their logs into the snapshot and
//! flaky-data documents rendered by the dashboard.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
