//! Weather history: one slot per calendar day for a logical job.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of days in every weather history.
pub const WEATHER_DAYS: usize = 10;

/// Status of one weather day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherStatus {
    Passed,
    Failed,
    /// A run exists but produced no verdict (cancelled, skipped, setup failure).
    NotRun,
    /// No run found for the day.
    None,
}

impl WeatherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::NotRun => "not_run",
            Self::None => "none",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl std::fmt::Display for WeatherStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One parsed `not ok` line from a job log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTestFailure {
    /// Sequence number within the file.
    pub number: u32,
    pub name: String,
    /// TAP directive or trailing comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Originating test file, best effort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// One calendar-day slot in a job's weather history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherDay {
    /// Midnight UTC of the day.
    pub date: DateTime<Utc>,
    pub status: WeatherStatus,
    #[serde(default)]
    pub run_id: Option<u64>,
    #[serde(default)]
    pub job_id: Option<u64>,
    #[serde(default)]
    pub run_attempt: Option<u32>,
    /// Seconds.
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub failure_step: Option<String>,
    #[serde(default)]
    pub failure_details: Option<Vec<SubTestFailure>>,
    /// The run failed before reaching test execution.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub setup_failed: bool,
}

impl WeatherDay {
    /// A `none` slot for the given day.
    pub fn empty(day: NaiveDate) -> Self {
        WeatherDay {
            date: midnight(day),
            status: WeatherStatus::None,
            run_id: None,
            job_id: None,
            run_attempt: None,
            duration: None,
            failure_step: None,
            failure_details: None,
            setup_failed: false,
        }
    }

    /// Calendar day (UTC) of this slot.
    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }

    pub fn has_data(&self) -> bool {
        !self.status.is_none()
    }
}

/// Midnight UTC of a calendar day.
pub fn midnight(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}
