//! ci-weather - main entry point.
//!
//! Runs one batch pass over already-fetched CI data and writes the dashboard
//! documents.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use ci_weather_lib::config::{Config, ConfigError};
use ci_weather_lib::error::AppResult;
use ci_weather_lib::services::{check_config, run_flaky, run_process, RunOptions};

#[derive(Parser, Debug)]
#[command(
    name = "ci-weather",
    version,
    about = "Turn CI job runs and logs into dashboard weather snapshots"
)]
struct Cli {
    #[command(flatten)]
    paths: PathArgs,

    /// Only check that the configuration and path flags resolve, then exit
    /// with 0 or 1. Reads no input files.
    #[arg(long)]
    health_check: bool,

    #[command(subcommand)]
    cmd: Option<Command>,
}

/// Path overrides; each falls back to its `CIW_*` variable.
#[derive(Args, Debug, Default)]
struct PathArgs {
    /// Dashboard YAML configuration
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// Nightly raw job list
    #[arg(long, global = true)]
    jobs_file: Option<PathBuf>,

    /// Directory with nightly job logs (<job_id>.log)
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    /// PR raw job list
    #[arg(long, global = true)]
    pr_jobs_file: Option<PathBuf>,

    /// Directory with PR job logs
    #[arg(long, global = true)]
    pr_logs_dir: Option<PathBuf>,

    /// Snapshot document (read as cache, then replaced)
    #[arg(long, global = true)]
    snapshot_file: Option<PathBuf>,

    /// Flaky-data document
    #[arg(long, global = true)]
    flaky_file: Option<PathBuf>,

    /// Directory for snapshot backups
    #[arg(long, global = true)]
    backup_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the nightly snapshot
    Process {
        /// Continue without history if the previous snapshot is unreadable
        #[arg(long)]
        ignore_cache: bool,

        #[arg(long)]
        dry_run: bool,
    },
    /// Build the flaky-data document from PR runs
    Flaky {
        #[arg(long)]
        dry_run: bool,
    },
    /// Load and compile the dashboard configuration
    CheckConfig,
}

impl PathArgs {
    fn apply(self, config: &mut Config) {
        let overrides = [
            (self.config_file, &mut config.config_file),
            (self.jobs_file, &mut config.jobs_file),
            (self.logs_dir, &mut config.logs_dir),
            (self.pr_jobs_file, &mut config.pr_jobs_file),
            (self.pr_logs_dir, &mut config.pr_logs_dir),
            (self.snapshot_file, &mut config.snapshot_file),
            (self.flaky_file, &mut config.flaky_file),
            (self.backup_dir, &mut config.backup_dir),
        ];
        for (value, slot) in overrides {
            if let Some(path) = value {
                *slot = path;
            }
        }
    }
}

/// Apply flag overrides on top of the environment, then validate once.
fn load_config(mut config: Config, paths: PathArgs) -> Result<Config, ConfigError> {
    paths.apply(&mut config);
    config.validate()?;
    Ok(config)
}

async fn run(cmd: Command, config: &Config) -> AppResult<()> {
    match cmd {
        Command::Process {
            ignore_cache,
            dry_run,
        } => {
            let options = RunOptions {
                ignore_cache,
                dry_run,
                ..Default::default()
            };
            let snapshot = run_process(config, &options).await?;
            info!(
                "Snapshot: {} jobs ({} passed, {} failed, {} not run, {} running)",
                snapshot.stats.total,
                snapshot.stats.passed,
                snapshot.stats.failed,
                snapshot.stats.not_run,
                snapshot.stats.running
            );
        }
        Command::Flaky { dry_run } => {
            let options = RunOptions {
                dry_run,
                ..Default::default()
            };
            let report = run_flaky(config, &options).await?;
            info!(
                "Flaky report: {} tests, {} flaky occurrences, {} merged despite failure",
                report.tests.len(),
                report.summary.flaky_occurrences,
                report.summary.merged_despite_failure
            );
        }
        Command::CheckConfig => {
            let compiled = check_config(config).await?;
            for pattern in &compiled.rejected_patterns {
                error!("Skipped pattern: {}", pattern);
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.health_check {
        let healthy = Config::from_env()
            .and_then(|config| load_config(config, cli.paths))
            .is_ok();
        std::process::exit(if healthy { 0 } else { 1 });
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let Some(cmd) = cli.cmd else {
        error!("No command given, see --help");
        std::process::exit(1);
    };

    let config = match Config::from_env().and_then(|config| load_config(config, cli.paths)) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("Check the CIW_* environment variables and path flags");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cmd, &config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
