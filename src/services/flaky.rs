//! Flaky and merged-despite-failure detection over pull-request runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Days, NaiveDate, Utc};
use tracing::{debug, info};

use super::classifier::classify;
use super::log_parser::parse_test_failures;
use super::logs::LogSource;
use crate::config::FatalStepMatcher;
use crate::models::{
    midnight, DailyTrend, FlakyAffectedJob, FlakyOccurrence, FlakyReport, FlakySummary,
    FlakyTestRecord, JobStatus, RawJobRun,
};

/// Build the flaky-data document from PR runs inside the window.
pub fn detect_flaky_tests<L>(
    pr_runs: &[RawJobRun],
    logs: &L,
    fatal_steps: &FatalStepMatcher,
    window_days: i64,
    now: DateTime<Utc>,
) -> FlakyReport
where
    L: LogSource + ?Sized,
{
    // Start of the first trend day, so every counted run lands in the trend
    let first_day = now.date_naive() - Days::new(window_days.max(1) as u64 - 1);
    let cutoff = midnight(first_day);

    // (pr number, job name) -> attempts
    let mut groups: BTreeMap<(u64, &str), Vec<&RawJobRun>> = BTreeMap::new();
    let mut skipped_no_pr = 0usize;

    for run in pr_runs {
        let Some(when) = run.start_time().or(run.completed_at) else {
            continue;
        };
        if when < cutoff {
            continue;
        }
        let Some(pr_number) = run.pr_number else {
            skipped_no_pr += 1;
            continue;
        };
        groups
            .entry((pr_number, run.name.as_str()))
            .or_default()
            .push(run);
    }

    if skipped_no_pr > 0 {
        debug!("Ignored {} runs without a PR number", skipped_no_pr);
    }

    let mut occurrences_by_key: BTreeMap<(bool, String), Vec<FlakyOccurrence>> = BTreeMap::new();
    let mut runs_analyzed = 0usize;

    for ((pr_number, job_name), attempts) in &groups {
        runs_analyzed += attempts.len();

        let classified: Vec<(&RawJobRun, JobStatus)> = attempts
            .iter()
            .map(|run| (*run, classify(run, fatal_steps)))
            .collect();
        let passed = classified
            .iter()
            .any(|(_, status)| *status == JobStatus::Passed);

        for (run, _) in classified
            .iter()
            .filter(|(_, status)| *status == JobStatus::Failed)
        {
            let occurrence = FlakyOccurrence {
                date: run.start_time().or(run.completed_at).unwrap_or(now),
                pr_number: *pr_number,
                pr_title: run.pr_title.clone(),
                job_name: job_name.to_string(),
                job_id: run.id,
                run_id: run.workflow_run_id,
                run_attempt: run.run_attempt,
                is_flaky: passed,
                pr_merged: run.pr_merged(),
            };

            let failures = logs
                .log_for(run.id)
                .and_then(parse_test_failures)
                .map(|parsed| parsed.failures)
                .unwrap_or_default();

            if failures.is_empty() {
                occurrences_by_key
                    .entry((true, job_name.to_string()))
                    .or_default()
                    .push(occurrence);
            } else {
                // one occurrence per sub-test name per attempt
                let names: BTreeSet<String> = failures.into_iter().map(|f| f.name).collect();
                for name in names {
                    occurrences_by_key
                        .entry((false, name))
                        .or_default()
                        .push(occurrence.clone());
                }
            }
        }
    }

    let mut tests: Vec<FlakyTestRecord> = occurrences_by_key
        .into_iter()
        .map(|((job_level, name), occurrences)| build_record(name, job_level, occurrences))
        .collect();
    tests.sort_by(|a, b| {
        b.total_count
            .cmp(&a.total_count)
            .then_with(|| a.name.cmp(&b.name))
    });

    let prs: BTreeSet<u64> = groups.keys().map(|(pr, _)| *pr).collect();
    let summary = summarize(&tests, prs.len(), runs_analyzed, window_days, now);

    info!(
        "Flaky analysis: {} PRs, {} runs, {} failures, {} confirmed flaky tests",
        summary.prs_analyzed,
        summary.runs_analyzed,
        summary.total_failures,
        summary.confirmed_flaky_tests
    );

    FlakyReport {
        generated_at: now,
        window_days,
        tests,
        summary,
    }
}

fn build_record(name: String, job_level: bool, mut occurrences: Vec<FlakyOccurrence>) -> FlakyTestRecord {
    occurrences.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.job_id.cmp(&a.job_id)));

    let mut by_job: BTreeMap<&str, FlakyAffectedJob> = BTreeMap::new();
    for occurrence in &occurrences {
        let job = by_job
            .entry(occurrence.job_name.as_str())
            .or_insert_with(|| FlakyAffectedJob {
                job_name: occurrence.job_name.clone(),
                count: 0,
                flaky_count: 0,
                merged_count: 0,
            });
        job.count += 1;
        job.flaky_count += usize::from(occurrence.is_flaky);
        job.merged_count += usize::from(occurrence.pr_merged);
    }

    let mut affected_jobs: Vec<FlakyAffectedJob> = by_job.into_values().collect();
    affected_jobs.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.job_name.cmp(&b.job_name)));

    let unique_prs = occurrences
        .iter()
        .map(|o| o.pr_number)
        .collect::<BTreeSet<_>>()
        .len();
    let unique_dates = occurrences
        .iter()
        .map(|o| o.date.date_naive())
        .collect::<BTreeSet<_>>()
        .len();

    FlakyTestRecord {
        name,
        job_level,
        total_count: occurrences.len(),
        flaky_count: occurrences.iter().filter(|o| o.is_flaky).count(),
        merged_count: occurrences.iter().filter(|o| o.pr_merged).count(),
        affected_jobs,
        unique_prs,
        unique_dates,
        occurrences,
    }
}

fn summarize(
    tests: &[FlakyTestRecord],
    prs_analyzed: usize,
    runs_analyzed: usize,
    window_days: i64,
    now: DateTime<Utc>,
) -> FlakySummary {
    let today = now.date_naive();
    let span = window_days.max(1) as u64;

    let mut per_day: BTreeMap<NaiveDate, DailyTrend> = (0..span)
        .map(|i| {
            let day = today - Days::new(span - 1 - i);
            (
                day,
                DailyTrend {
                    date: midnight(day),
                    failures: 0,
                    flaky: 0,
                },
            )
        })
        .collect();

    let mut per_job: HashMap<&str, usize> = HashMap::new();

    for occurrence in tests.iter().flat_map(|t| t.occurrences.iter()) {
        if let Some(trend) = per_day.get_mut(&occurrence.date.date_naive()) {
            trend.failures += 1;
            trend.flaky += usize::from(occurrence.is_flaky);
        }
        *per_job.entry(occurrence.job_name.as_str()).or_default() += 1;
    }

    let most_affected_job = per_job
        .into_iter()
        .max_by(|(a_name, a_count), (b_name, b_count)| {
            a_count.cmp(b_count).then_with(|| b_name.cmp(a_name))
        })
        .map(|(name, _)| name.to_string());

    FlakySummary {
        prs_analyzed,
        runs_analyzed,
        total_failures: tests.iter().map(|t| t.total_count).sum(),
        confirmed_flaky_tests: tests.iter().filter(|t| t.flaky_count > 0).count(),
        flaky_occurrences: tests.iter().map(|t| t.flaky_count).sum(),
        merged_despite_failure: tests.iter().map(|t| t.merged_count).sum(),
        most_affected_job,
        trend: per_day.into_values().collect(),
    }
}
