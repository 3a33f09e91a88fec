//! End-to-end processing runs: load inputs, run the core, persist outputs.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::classifier::classify;
use super::flaky::detect_flaky_tests;
use super::logs::LogStore;
use super::snapshot::{assemble_snapshot, SnapshotInput};
use super::storage;
use crate::config::{CompiledConfig, Config, FatalStepMatcher};
use crate::error::AppResult;
use crate::models::{FlakyReport, JobStatus, RawJobRun, Snapshot};

const SNAPSHOT_BACKUP_PREFIX: &str = "snapshot";

/// Knobs of one processing run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Continue without history when the previous snapshot is unreadable.
    pub ignore_cache: bool,
    /// Compute everything but write nothing.
    pub dry_run: bool,
    pub now: DateTime<Utc>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            ignore_cache: false,
            dry_run: false,
            now: Utc::now(),
        }
    }
}

/// Ids of the attempts whose logs are worth parsing.
fn failed_job_ids(runs: &[RawJobRun], fatal_steps: &FatalStepMatcher) -> Vec<u64> {
    runs.iter()
        .filter(|run| classify(run, fatal_steps) == JobStatus::Failed)
        .map(|run| run.id)
        .collect()
}

/// Nightly run: raw runs + logs + previous snapshot -> new snapshot.
pub async fn run_process(config: &Config, options: &RunOptions) -> AppResult<Snapshot> {
    let dashboard = storage::load_dashboard_config(&config.config_file).await?;
    let runs = storage::load_runs(&config.jobs_file).await?;
    let previous = storage::load_previous_snapshot(&config.snapshot_file, options.ignore_cache).await?;

    let logs = LogStore::load_dir(&config.logs_dir, failed_job_ids(&runs, &dashboard.fatal_steps)).await?;

    let snapshot = assemble_snapshot(&SnapshotInput {
        runs: &runs,
        logs: &logs,
        config: &dashboard,
        previous: previous.as_ref(),
        now: options.now,
    })?;

    if options.dry_run {
        info!("Dry run, not writing {}", config.snapshot_file.display());
        return Ok(snapshot);
    }

    if let Some(path) = storage::backup_file(
        &config.snapshot_file,
        &config.backup_dir,
        SNAPSHOT_BACKUP_PREFIX,
        options.now,
    )
    .await?
    {
        info!("Previous snapshot saved to {}", path.display());
    }

    storage::write_json_atomic(&config.snapshot_file, &snapshot).await?;

    if let Err(e) =
        storage::cleanup_old_backups(&config.backup_dir, SNAPSHOT_BACKUP_PREFIX, config.backup_keep).await
    {
        warn!("Failed to cleanup old backups: {}", e);
    }

    Ok(snapshot)
}

/// PR run: PR raw runs + logs -> flaky-data document.
pub async fn run_flaky(config: &Config, options: &RunOptions) -> AppResult<FlakyReport> {
    let dashboard = storage::load_dashboard_config(&config.config_file).await?;
    let runs = storage::load_runs(&config.pr_jobs_file).await?;

    let logs = LogStore::load_dir(&config.pr_logs_dir, failed_job_ids(&runs, &dashboard.fatal_steps)).await?;

    let report = detect_flaky_tests(
        &runs,
        &logs,
        &dashboard.fatal_steps,
        dashboard.thresholds().flaky_window_days,
        options.now,
    );

    if options.dry_run {
        info!("Dry run, not writing {}", config.flaky_file.display());
    } else {
        storage::write_json_atomic(&config.flaky_file, &report).await?;
    }

    Ok(report)
}

/// Load and compile the dashboard configuration without processing anything.
pub async fn check_config(config: &Config) -> AppResult<CompiledConfig> {
    let dashboard = storage::load_dashboard_config(&config.config_file).await?;

    info!(
        "Configuration OK: {} sections, {} projects, {} required patterns, {} aliases",
        dashboard.raw.sections.len(),
        dashboard.raw.projects.len(),
        dashboard.raw.required_tests.len(),
        dashboard.job_aliases().len()
    );

    Ok(dashboard)
}
