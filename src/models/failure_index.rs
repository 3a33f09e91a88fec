//! Failed-test index records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One job attempt in which a sub-test failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureOccurrence {
    pub date: DateTime<Utc>,
    pub job_name: String,
    pub job_id: u64,
    #[serde(default)]
    pub run_id: Option<u64>,
}

/// Per-job breakdown of one failing test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedJob {
    pub job_name: String,
    pub count: usize,
    pub latest_date: DateTime<Utc>,
}

/// Index entry keyed by sub-test name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTestIndexEntry {
    /// Newest first, one per job attempt.
    #[serde(default)]
    pub occurrences: Vec<FailureOccurrence>,
    #[serde(default)]
    pub total_count: usize,
    /// Derived; recomputed every run.
    #[serde(default)]
    pub affected_jobs: Vec<AffectedJob>,
    #[serde(default)]
    pub unique_jobs_affected: usize,
}
