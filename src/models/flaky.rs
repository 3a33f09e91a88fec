//! Flaky-data document produced from pull-request runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One failure seen on a PR job attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakyOccurrence {
    pub date: DateTime<Utc>,
    pub pr_number: u64,
    #[serde(default)]
    pub pr_title: Option<String>,
    pub job_name: String,
    pub job_id: u64,
    #[serde(default)]
    pub run_id: Option<u64>,
    pub run_attempt: u32,
    /// The same PR and job passed on another attempt.
    pub is_flaky: bool,
    /// The PR was merged despite this failure.
    pub pr_merged: bool,
}

/// Per-job breakdown inside a flaky record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakyAffectedJob {
    pub job_name: String,
    pub count: usize,
    pub flaky_count: usize,
    pub merged_count: usize,
}

/// Failures of one sub-test (or one job, when no log could be parsed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakyTestRecord {
    pub name: String,
    /// Keyed by job name because the job log yielded no sub-tests.
    pub job_level: bool,
    pub occurrences: Vec<FlakyOccurrence>,
    pub total_count: usize,
    pub flaky_count: usize,
    pub merged_count: usize,
    pub affected_jobs: Vec<FlakyAffectedJob>,
    pub unique_prs: usize,
    pub unique_dates: usize,
}

/// Failures and flaky failures on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTrend {
    pub date: DateTime<Utc>,
    pub failures: usize,
    pub flaky: usize,
}

/// Aggregate view of the flaky window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakySummary {
    pub prs_analyzed: usize,
    pub runs_analyzed: usize,
    pub total_failures: usize,
    /// Records with at least one flaky occurrence.
    pub confirmed_flaky_tests: usize,
    pub flaky_occurrences: usize,
    pub merged_despite_failure: usize,
    #[serde(default)]
    pub most_affected_job: Option<String>,
    pub trend: Vec<DailyTrend>,
}

/// Root of the flaky-data document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakyReport {
    pub generated_at: DateTime<Utc>,
    pub window_days: i64,
    pub tests: Vec<FlakyTestRecord>,
    pub summary: FlakySummary,
}
