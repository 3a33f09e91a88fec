//! Rename candidates proposed by the rename detector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A disappeared job name heuristically matched to a newly appeared one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameCandidate {
    pub old_name: String,
    pub new_name: String,
    /// 0-100.
    pub similarity: u8,
    pub detected_date: DateTime<Utc>,
}

impl RenameCandidate {
    pub fn is_pair(&self, old: &str, new: &str) -> bool {
        self.old_name == old && self.new_name == new
    }
}
