//! Domain models for ci-weather.

pub mod failure_index;
pub mod flaky;
pub mod raw_job;
pub mod rename;
pub mod snapshot;
pub mod status;
pub mod weather;

// Re-export commonly used types
pub use failure_index::{AffectedJob, FailedTestIndexEntry, FailureOccurrence};
pub use flaky::{DailyTrend, FlakyAffectedJob, FlakyOccurrence, FlakyReport, FlakySummary, FlakyTestRecord};
pub use raw_job::{Conclusion, RawJobBatch, RawJobRun, RunStatus, Step};
pub use rename::RenameCandidate;
pub use snapshot::{
    JobError, LatestRun, LogicalJob, Maintainer, ProjectView, Section, Snapshot, SnapshotStats,
    WeatherFailedTest,
};
pub use status::JobStatus;
pub use weather::{midnight, SubTestFailure, WeatherDay, WeatherStatus, WEATHER_DAYS};
