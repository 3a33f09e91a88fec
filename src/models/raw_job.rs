//! Raw GitHub Actions job records as produced by the fetch step.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Envelope of a raw job list file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJobBatch {
    #[serde(default)]
    pub jobs: Vec<RawJobRun>,
}

/// Job conclusion as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    Other,
}

impl Conclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
            Self::TimedOut => "timed_out",
            Self::Other => "other",
        }
    }

    /// Parse from the API string. Unknown values map to `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "failure" => Self::Failure,
            "cancelled" => Self::Cancelled,
            "skipped" => Self::Skipped,
            "timed_out" => Self::TimedOut,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for Conclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job execution status as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    InProgress,
    Queued,
    Waiting,
    Pending,
    Unknown,
}

impl RunStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "in_progress" => Self::InProgress,
            "queued" | "requested" => Self::Queued,
            "waiting" => Self::Waiting,
            "pending" => Self::Pending,
            _ => Self::Unknown,
        }
    }

    /// True while the job has not produced a result yet.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::InProgress | Self::Queued | Self::Waiting | Self::Pending
        )
    }
}

/// One step of a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
}

impl Step {
    pub fn new(name: &str, conclusion: Option<&str>) -> Self {
        Step {
            name: name.to_string(),
            conclusion: conclusion.map(str::to_string),
            number: None,
        }
    }

    pub fn conclusion(&self) -> Option<Conclusion> {
        self.conclusion.as_deref().map(Conclusion::parse)
    }
}

fn default_attempt() -> u32 {
    1
}

/// One execution attempt of a named CI job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJobRun {
    /// Unique per attempt.
    pub id: u64,
    /// Matches a logical job across runs.
    pub name: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Retry number within one workflow run (1 = first attempt).
    #[serde(default = "default_attempt")]
    pub run_attempt: u32,
    /// Groups attempts of the same triggering run.
    #[serde(default, alias = "run_id")]
    pub workflow_run_id: Option<u64>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,

    // Pull-request runs only
    #[serde(default)]
    pub pr_number: Option<u64>,
    #[serde(default)]
    pub pr_title: Option<String>,
    #[serde(default)]
    pub pr_merged: Option<bool>,
    #[serde(default)]
    pub pr_state: Option<String>,
}

impl RawJobRun {
    pub fn conclusion(&self) -> Option<Conclusion> {
        self.conclusion.as_deref().map(Conclusion::parse)
    }

    pub fn run_status(&self) -> RunStatus {
        self.status
            .as_deref()
            .map(RunStatus::parse)
            .unwrap_or(RunStatus::Unknown)
    }

    pub fn is_in_flight(&self) -> bool {
        self.run_status().is_in_flight()
    }

    /// True when the job finished with a pass/fail verdict.
    pub fn has_verdict(&self) -> bool {
        !self.is_in_flight()
            && matches!(
                self.conclusion(),
                Some(Conclusion::Success | Conclusion::Failure)
            )
    }

    /// Start of the attempt, falling back to creation time.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.started_at.or(self.created_at)
    }

    /// Calendar day (UTC) the run belongs to.
    pub fn run_date(&self) -> Option<NaiveDate> {
        self.start_time()
            .or(self.completed_at)
            .map(|ts| ts.date_naive())
    }

    /// Wall-clock duration in seconds, when both ends are known.
    pub fn duration_secs(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) if end >= start => Some((end - start).num_seconds()),
            _ => None,
        }
    }

    pub fn first_failed_step(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|step| step.conclusion() == Some(Conclusion::Failure))
    }

    pub fn pr_merged(&self) -> bool {
        self.pr_merged.unwrap_or(false)
    }
}
