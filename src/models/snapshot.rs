//! Snapshot document consumed by the dashboard UI.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::failure_index::FailedTestIndexEntry;
use super::rename::RenameCandidate;
use super::status::JobStatus;
use super::weather::WeatherDay;

/// Resolved maintainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack: Option<String>,
}

/// A sub-test failing somewhere in the weather window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherFailedTest {
    pub name: String,
    #[serde(default)]
    pub file: Option<String>,
    /// Number of failing days.
    pub count: usize,
    /// Failing days, oldest first.
    pub dates: Vec<DateTime<Utc>>,
}

/// Detail of a job's latest failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub run_id: Option<u64>,
    #[serde(default)]
    pub job_id: Option<u64>,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// Newest raw run of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestRun {
    pub job_id: u64,
    #[serde(default)]
    pub run_id: Option<u64>,
    pub run_attempt: u32,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
}

/// The unit the dashboard displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalJob {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub section: String,
    pub status: JobStatus,
    /// Exactly ten days, oldest first.
    pub weather_history: Vec<WeatherDay>,
    #[serde(default)]
    pub failed_tests_in_weather: Vec<WeatherFailedTest>,
    #[serde(default)]
    pub error: Option<JobError>,
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub latest_run: Option<LatestRun>,
    /// Latest run failed during setup and is shown as not run.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub setup_retry: bool,
}

/// One dashboard section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub tests: Vec<LogicalJob>,
}

/// Sub-project view listing the jobs of its sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sections: Vec<String>,
    pub job_ids: Vec<String>,
}

/// Counts of jobs by current status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub not_run: usize,
    pub running: usize,
    pub setup_failed: usize,
    pub required_failed: usize,
}

/// Root of the snapshot document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub last_refresh: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Every job across sections, sorted by name.
    #[serde(default)]
    pub all_jobs: Vec<LogicalJob>,
    #[serde(default)]
    pub projects: Vec<ProjectView>,
    #[serde(default)]
    pub failed_tests_index: BTreeMap<String, FailedTestIndexEntry>,
    #[serde(default)]
    pub rename_candidates: Vec<RenameCandidate>,
    #[serde(default)]
    pub stats: SnapshotStats,
}

impl Snapshot {
    /// Flattened job list. Falls back to section contents for documents
    /// written without `allJobs`.
    pub fn jobs(&self) -> Box<dyn Iterator<Item = &LogicalJob> + '_> {
        if self.all_jobs.is_empty() {
            Box::new(self.sections.iter().flat_map(|s| s.tests.iter()))
        } else {
            Box::new(self.all_jobs.iter())
        }
    }

    pub fn find_job(&self, name: &str) -> Option<&LogicalJob> {
        self.jobs().find(|job| job.name == name)
    }
}
