//! Processing services.

pub mod classifier;
pub mod failure_index;
pub mod flaky;
pub mod log_parser;
pub mod logs;
pub mod pipeline;
pub mod rename;
pub mod snapshot;
pub mod storage;
pub mod weather;

pub use classifier::classify;
pub use failure_index::FailureIndex;
pub use flaky::detect_flaky_tests;
pub use log_parser::{parse_test_failures, ParsedLog, TestStats};
pub use logs::{LogSource, LogStore};
pub use pipeline::{check_config, run_flaky, run_process, RunOptions};
pub use rename::{detect_renames, merge_weather_history};
pub use snapshot::{assemble_snapshot, SnapshotInput};
pub use weather::build_weather_history;
