//! Normalized job status.

use serde::{Deserialize, Serialize};

use super::weather::WeatherStatus;

/// Normalized status of a job run or logical job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Passed,
    Failed,
    /// No meaningful result (cancelled, skipped, not yet finished).
    NotRun,
    /// Failed in a setup/infra step before tests ran. Displayed as not run.
    NotRunSetupFailed,
    /// Newest run still executing. Only used for a logical job's current status.
    Running,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::NotRun => "not_run",
            Self::NotRunSetupFailed => "not_run_setup_failed",
            Self::Running => "running",
        }
    }

    /// Weather slot status for a run classified with this status.
    pub fn weather_status(&self) -> WeatherStatus {
        match self {
            Self::Passed => WeatherStatus::Passed,
            Self::Failed => WeatherStatus::Failed,
            Self::NotRun | Self::NotRunSetupFailed | Self::Running => WeatherStatus::NotRun,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
