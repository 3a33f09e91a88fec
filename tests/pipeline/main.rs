//! Pipeline test suite.
//!
//! Drives full processing runs against temporary directories holding raw job
//! lists, logs and a dashboard configuration.
//!
//! Run with: cargo test --test pipeline

mod test_helpers;

mod test_flaky;
mod test_process;
mod test_rename;
