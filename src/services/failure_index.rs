//! Cross-job index of failing sub-tests.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::{AffectedJob, FailedTestIndexEntry, FailureOccurrence, LogicalJob, WeatherStatus};

/// Sub-test name -> occurrences across all jobs.
#[derive(Debug, Clone, Default)]
pub struct FailureIndex {
    entries: BTreeMap<String, FailedTestIndexEntry>,
}

impl FailureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a previous snapshot's index. The source is cloned, never
    /// modified.
    pub fn seeded(previous: &BTreeMap<String, FailedTestIndexEntry>) -> Self {
        Self {
            entries: previous.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, test_name: &str) -> Option<&FailedTestIndexEntry> {
        self.entries.get(test_name)
    }

    /// Record one failure. Returns false when the job attempt is already
    /// indexed under this test name.
    pub fn index_failed_test(
        &mut self,
        test_name: &str,
        date: DateTime<Utc>,
        job_name: &str,
        job_id: u64,
        run_id: Option<u64>,
    ) -> bool {
        let entry = self.entries.entry(test_name.to_string()).or_default();

        if entry.occurrences.iter().any(|o| o.job_id == job_id) {
            return false;
        }

        entry.occurrences.push(FailureOccurrence {
            date,
            job_name: job_name.to_string(),
            job_id,
            run_id,
        });
        true
    }

    /// Index every failed weather day of a job.
    pub fn index_job(&mut self, job: &LogicalJob) -> usize {
        let mut added = 0;

        for day in job
            .weather_history
            .iter()
            .filter(|day| day.status == WeatherStatus::Failed)
        {
            let Some(job_id) = day.job_id else {
                continue;
            };
            for failure in day.failure_details.iter().flatten() {
                if self.index_failed_test(&failure.name, day.date, &job.name, job_id, day.run_id) {
                    added += 1;
                }
            }
        }

        added
    }

    /// Drop occurrences older than `window_days`, sort newest first and drop
    /// entries left empty.
    pub fn prune(&mut self, now: DateTime<Utc>, window_days: i64) {
        let cutoff = now - Duration::days(window_days);
        let before = self.entries.len();

        self.entries.retain(|_, entry| {
            entry.occurrences.retain(|o| o.date >= cutoff);
            entry
                .occurrences
                .sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.job_id.cmp(&a.job_id)));
            entry.total_count = entry.occurrences.len();
            !entry.occurrences.is_empty()
        });

        debug!(
            "Pruned failure index to {} days: {} -> {} tests",
            window_days,
            before,
            self.entries.len()
        );
    }

    /// Recompute the per-job breakdown of every entry.
    pub fn enrich(&mut self) {
        for entry in self.entries.values_mut() {
            let mut by_job: HashMap<&str, AffectedJob> = HashMap::new();

            for occurrence in &entry.occurrences {
                by_job
                    .entry(occurrence.job_name.as_str())
                    .and_modify(|job| {
                        job.count += 1;
                        job.latest_date = job.latest_date.max(occurrence.date);
                    })
                    .or_insert_with(|| AffectedJob {
                        job_name: occurrence.job_name.clone(),
                        count: 1,
                        latest_date: occurrence.date,
                    });
            }

            let mut affected: Vec<AffectedJob> = by_job.into_values().collect();
            affected.sort_by(|a, b| {
                b.count
                    .cmp(&a.count)
                    .then_with(|| a.job_name.cmp(&b.job_name))
            });

            entry.unique_jobs_affected = affected.len();
            entry.affected_jobs = affected;
        }
    }

    pub fn into_map(self) -> BTreeMap<String, FailedTestIndexEntry> {
        self.entries
    }
}
