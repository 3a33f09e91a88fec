//! Snapshot assembly.
//!
//! One pass from raw runs to the dashboard document. The previous snapshot is
//! only read; a fresh [`Snapshot`] value is produced.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::classifier::classify;
use super::failure_index::FailureIndex;
use super::logs::LogSource;
use super::rename::{apply_renames, detect_renames};
use super::weather::{build_weather_history, failed_tests_in_weather, latest_error};
use crate::config::CompiledConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    JobStatus, LatestRun, LogicalJob, ProjectView, RawJobRun, Section, Snapshot, SnapshotStats,
};

/// Everything one assembly pass reads.
pub struct SnapshotInput<'a, L: ?Sized> {
    pub runs: &'a [RawJobRun],
    pub logs: &'a L,
    pub config: &'a CompiledConfig,
    pub previous: Option<&'a Snapshot>,
    pub now: DateTime<Utc>,
}

/// Stable URL-safe id for a job name.
pub fn job_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        slug.push_str("job");
    }
    slug
}

/// Newest attempt of a job.
fn latest_run<'a>(runs: &[&'a RawJobRun]) -> Option<&'a RawJobRun> {
    runs.iter()
        .copied()
        .max_by_key(|run| (run.start_time(), run.run_attempt, run.id))
}

/// Current status of a job and whether it is a setup retry.
fn current_status(latest: Option<&RawJobRun>, config: &CompiledConfig) -> (JobStatus, bool) {
    match latest {
        None => (JobStatus::NotRun, false),
        Some(run) if run.is_in_flight() => (JobStatus::Running, false),
        Some(run) => match classify(run, &config.fatal_steps) {
            JobStatus::NotRunSetupFailed => (JobStatus::NotRun, true),
            status => (status, false),
        },
    }
}

/// Build the new snapshot.
pub fn assemble_snapshot<L>(input: &SnapshotInput<'_, L>) -> AppResult<Snapshot>
where
    L: LogSource + ?Sized,
{
    let config = input.config;

    let mut runs_by_name: BTreeMap<&str, Vec<&RawJobRun>> = BTreeMap::new();
    for run in input.runs {
        if run.name.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Job {} has an empty name",
                run.id
            )));
        }
        runs_by_name.entry(run.name.as_str()).or_default().push(run);
    }

    let cached_jobs: HashMap<&str, &LogicalJob> = input
        .previous
        .map(|snapshot| snapshot.jobs().map(|job| (job.name.as_str(), job)).collect())
        .unwrap_or_default();

    let mut used_ids: HashSet<String> = HashSet::new();
    let mut jobs: Vec<LogicalJob> = Vec::with_capacity(runs_by_name.len());

    for (name, runs) in &runs_by_name {
        let cached = cached_jobs
            .get(name)
            .map(|job| job.weather_history.as_slice());

        let weather_history =
            build_weather_history(runs, cached, input.logs, &config.fatal_steps, input.now);

        let latest = latest_run(runs);
        let (status, setup_retry) = current_status(latest, config);

        let base_id = job_slug(name);
        let mut id = base_id.clone();
        let mut n = 2;
        while !used_ids.insert(id.clone()) {
            id = format!("{}-{}", base_id, n);
            n += 1;
        }

        jobs.push(LogicalJob {
            id,
            name: name.to_string(),
            display_name: config.display_name(name),
            section: config.section_for(name).id.clone(),
            status,
            weather_history,
            failed_tests_in_weather: Vec::new(),
            error: None,
            maintainers: config.maintainers_for(name),
            is_required: config.is_required(name),
            latest_run: latest.map(|run| LatestRun {
                job_id: run.id,
                run_id: run.workflow_run_id,
                run_attempt: run.run_attempt,
                started_at: run.start_time(),
                url: run.html_url.clone(),
            }),
            setup_retry,
        });
    }

    let rename_candidates = detect_renames(&jobs, input.previous, config, input.now);
    let merged_days = apply_renames(&mut jobs, input.previous, &rename_candidates, config);

    for job in &mut jobs {
        job.failed_tests_in_weather = failed_tests_in_weather(&job.weather_history);
        job.error = latest_error(&job.weather_history);
    }

    let mut index = match input.previous {
        Some(previous) => FailureIndex::seeded(&previous.failed_tests_index),
        None => FailureIndex::new(),
    };
    let indexed: usize = jobs.iter().map(|job| index.index_job(job)).sum();
    index.prune(input.now, config.thresholds().failure_index_days);
    index.enrich();
    debug!("Indexed {} new failure occurrences", indexed);

    jobs.sort_by(|a, b| a.name.cmp(&b.name));

    let sections = build_sections(&jobs, config);
    let projects = build_projects(&sections, config);
    let stats = compute_stats(&jobs);

    info!(
        "Assembled snapshot: {} jobs, {} sections, {} failing tests indexed, {} rename candidates ({} days merged)",
        jobs.len(),
        sections.len(),
        index.len(),
        rename_candidates.len(),
        merged_days
    );

    Ok(Snapshot {
        last_refresh: Some(input.now),
        sections,
        all_jobs: jobs,
        projects,
        failed_tests_index: index.into_map(),
        rename_candidates,
        stats,
    })
}

/// Configured sections in order; the fallback section only when used.
fn build_sections(jobs: &[LogicalJob], config: &CompiledConfig) -> Vec<Section> {
    let configured: HashSet<&str> = config.raw.sections.iter().map(|s| s.id.as_str()).collect();

    config
        .all_sections()
        .map(|section| Section {
            id: section.id.clone(),
            name: section.name.clone(),
            description: section.description.clone(),
            project: section.project.clone(),
            tests: jobs
                .iter()
                .filter(|job| job.section == section.id)
                .cloned()
                .collect(),
        })
        .filter(|section| configured.contains(section.id.as_str()) || !section.tests.is_empty())
        .collect()
}

fn build_projects(sections: &[Section], config: &CompiledConfig) -> Vec<ProjectView> {
    config
        .raw
        .projects
        .iter()
        .map(|project| {
            let owned: Vec<&Section> = sections
                .iter()
                .filter(|s| s.project.as_deref() == Some(project.id.as_str()))
                .collect();

            ProjectView {
                id: project.id.clone(),
                name: project.name.clone(),
                description: project.description.clone(),
                sections: owned.iter().map(|s| s.id.clone()).collect(),
                job_ids: owned
                    .iter()
                    .flat_map(|s| s.tests.iter().map(|job| job.id.clone()))
                    .collect(),
            }
        })
        .collect()
}

pub fn compute_stats(jobs: &[LogicalJob]) -> SnapshotStats {
    let mut stats = SnapshotStats {
        total: jobs.len(),
        ..Default::default()
    };

    for job in jobs {
        match job.status {
            JobStatus::Passed => stats.passed += 1,
            JobStatus::Failed => {
                stats.failed += 1;
                if job.is_required {
                    stats.required_failed += 1;
                }
            }
            JobStatus::NotRun | JobStatus::NotRunSetupFailed => stats.not_run += 1,
            JobStatus::Running => stats.running += 1,
        }
        if job.setup_retry {
            stats.setup_failed += 1;
        }
    }

    stats
}
