//! Weather history builder.
//!
//! Turns the raw runs of one logical job into exactly [`WEATHER_DAYS`] daily
//! slots. Live runs always win for a calendar day; the previous snapshot only
//! fills days whose runs are no longer in the fetched data.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, NaiveDate, Utc};

use super::classifier::classify;
use super::log_parser::{failure_files, parse_test_failures};
use super::logs::LogSource;
use crate::config::FatalStepMatcher;
use crate::models::{
    midnight, JobError, JobStatus, RawJobRun, SubTestFailure, WeatherDay, WeatherFailedTest,
    WeatherStatus, WEATHER_DAYS,
};

/// `failureStep` text when neither files nor a failed step are known.
pub const GENERIC_FAILURE_STEP: &str = "Test execution";

/// Newest day of the window.
///
/// Today, unless no run of this job produced a verdict today; then yesterday,
/// so the newest slot does not show "none" before the nightly run finished.
pub fn weather_anchor(runs: &[&RawJobRun], today: NaiveDate) -> NaiveDate {
    let completed_today = runs
        .iter()
        .any(|run| run.has_verdict() && run.run_date() == Some(today));

    if completed_today {
        today
    } else {
        today - Days::new(1)
    }
}

/// Build the weather history of one logical job.
pub fn build_weather_history<L>(
    runs: &[&RawJobRun],
    cached: Option<&[WeatherDay]>,
    logs: &L,
    fatal_steps: &FatalStepMatcher,
    now: DateTime<Utc>,
) -> Vec<WeatherDay>
where
    L: LogSource + ?Sized,
{
    let anchor = weather_anchor(runs, now.date_naive());

    let cache_by_day: HashMap<NaiveDate, &WeatherDay> = cached
        .unwrap_or_default()
        .iter()
        .map(|day| (day.day(), day))
        .collect();

    let mut runs_by_day: HashMap<NaiveDate, Vec<&RawJobRun>> = HashMap::new();
    for &run in runs {
        if let Some(day) = run.run_date() {
            runs_by_day.entry(day).or_default().push(run);
        }
    }

    (0..WEATHER_DAYS)
        .map(|i| {
            let day = anchor - Days::new((WEATHER_DAYS - 1 - i) as u64);
            let day_runs = runs_by_day.get(&day).map(Vec::as_slice).unwrap_or_default();
            build_day(
                day,
                day_runs,
                cache_by_day.get(&day).copied(),
                logs,
                fatal_steps,
            )
        })
        .collect()
}

/// Pick the representative run of a day.
///
/// Completed runs beat in-flight ones, runs that reached a fatal step beat
/// runs that did not, then the latest start wins.
pub fn select_run<'a>(
    day_runs: &[&'a RawJobRun],
    fatal_steps: &FatalStepMatcher,
) -> Option<&'a RawJobRun> {
    day_runs.iter().copied().max_by_key(|run| {
        (
            !run.is_in_flight(),
            fatal_steps.reached_fatal_step(&run.steps),
            run.start_time(),
            run.run_attempt,
            run.id,
        )
    })
}

fn build_day<L>(
    day: NaiveDate,
    day_runs: &[&RawJobRun],
    cached: Option<&WeatherDay>,
    logs: &L,
    fatal_steps: &FatalStepMatcher,
) -> WeatherDay
where
    L: LogSource + ?Sized,
{
    let Some(run) = select_run(day_runs, fatal_steps) else {
        return match cached {
            Some(cached_day) => WeatherDay {
                date: midnight(day),
                ..cached_day.clone()
            },
            None => WeatherDay::empty(day),
        };
    };

    let status = classify(run, fatal_steps);
    let mut weather_day = WeatherDay {
        date: midnight(day),
        status: status.weather_status(),
        run_id: run.workflow_run_id,
        job_id: Some(run.id),
        run_attempt: Some(run.run_attempt),
        duration: run.duration_secs(),
        failure_step: None,
        failure_details: None,
        setup_failed: status == JobStatus::NotRunSetupFailed,
    };

    match status {
        JobStatus::Failed => {
            let details = logs
                .log_for(run.id)
                .and_then(parse_test_failures)
                .map(|parsed| parsed.failures)
                .filter(|failures| !failures.is_empty())
                .or_else(|| {
                    cached
                        .and_then(|c| c.failure_details.clone())
                        .filter(|failures| !failures.is_empty())
                });

            weather_day.failure_step = Some(failure_step_label(details.as_deref(), run));
            weather_day.failure_details = details;
        }
        JobStatus::NotRunSetupFailed => {
            weather_day.failure_step = run.first_failed_step().map(|s| s.name.clone());
        }
        JobStatus::Passed | JobStatus::NotRun | JobStatus::Running => {}
    }

    weather_day
}

/// Display text for the failing part of a run.
pub fn failure_step_label(details: Option<&[SubTestFailure]>, run: &RawJobRun) -> String {
    let files = details.map(failure_files).unwrap_or_default();
    if !files.is_empty() {
        return files.join(", ");
    }

    run.first_failed_step()
        .map(|step| step.name.clone())
        .unwrap_or_else(|| GENERIC_FAILURE_STEP.to_string())
}

/// Sub-tests failing anywhere in the window, most frequent first.
pub fn failed_tests_in_weather(history: &[WeatherDay]) -> Vec<WeatherFailedTest> {
    let mut by_name: BTreeMap<&str, WeatherFailedTest> = BTreeMap::new();

    for day in history
        .iter()
        .filter(|day| day.status == WeatherStatus::Failed)
    {
        for failure in day.failure_details.iter().flatten() {
            let entry = by_name
                .entry(failure.name.as_str())
                .or_insert_with(|| WeatherFailedTest {
                    name: failure.name.clone(),
                    file: failure.file.clone(),
                    count: 0,
                    dates: Vec::new(),
                });

            if !entry.dates.contains(&day.date) {
                entry.dates.push(day.date);
                entry.count += 1;
            }
            if entry.file.is_none() {
                entry.file = failure.file.clone();
            }
        }
    }

    let mut tests: Vec<WeatherFailedTest> = by_name.into_values().collect();
    tests.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    tests
}

/// Detail of the newest failed day.
pub fn latest_error(history: &[WeatherDay]) -> Option<JobError> {
    history
        .iter()
        .rev()
        .find(|day| day.status == WeatherStatus::Failed)
        .map(|day| JobError {
            date: day.date,
            run_id: day.run_id,
            job_id: day.job_id,
            step: day.failure_step.clone(),
            details: day.failure_details.as_ref().map(|failures| {
                failures
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }),
        })
}
