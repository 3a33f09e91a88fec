//! Runtime configuration loaded from environment variables.
//!
//! The dashboard layout (sections, patterns, thresholds) lives in a YAML file
//! described by [`dashboard::DashboardConfig`]; this module only resolves where
//! inputs and outputs live on disk.

pub mod dashboard;
pub mod matcher;

use std::env;
use std::path::PathBuf;

pub use dashboard::{CompiledConfig, DashboardConfig, Thresholds};
pub use matcher::{CategoryMatcher, FatalStepMatcher};

/// Default values used when an environment variable is not set.
pub mod defaults {
    pub const JOBS_FILE: &str = "data/raw-runs.json";
    pub const PR_JOBS_FILE: &str = "data/pr-runs.json";
    pub const LOGS_DIR: &str = "data/logs";
    pub const PR_LOGS_DIR: &str = "data/pr-logs";
    pub const CONFIG_FILE: &str = "config/dashboard.yaml";
    pub const SNAPSHOT_FILE: &str = "data/snapshot.json";
    pub const FLAKY_FILE: &str = "data/flaky.json";
    pub const BACKUP_DIR: &str = "data/backups";
    pub const BACKUP_KEEP: usize = 5; // Snapshot backups retained
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Nightly raw job list (`{"jobs": [...]}`)
    pub jobs_file: PathBuf,
    /// Pull-request raw job list
    pub pr_jobs_file: PathBuf,
    /// Directory holding `<job_id>.log` files for nightly runs
    pub logs_dir: PathBuf,
    /// Directory holding `<job_id>.log` files for PR runs
    pub pr_logs_dir: PathBuf,
    /// YAML dashboard configuration
    pub config_file: PathBuf,
    /// Snapshot document (read as cache, then replaced)
    pub snapshot_file: PathBuf,
    /// Flaky-data document
    pub flaky_file: PathBuf,
    /// Directory for gzip backups of replaced snapshots
    pub backup_dir: PathBuf,
    /// Number of snapshot backups to keep
    pub backup_keep: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            jobs_file: PathBuf::from(defaults::JOBS_FILE),
            pr_jobs_file: PathBuf::from(defaults::PR_JOBS_FILE),
            logs_dir: PathBuf::from(defaults::LOGS_DIR),
            pr_logs_dir: PathBuf::from(defaults::PR_LOGS_DIR),
            config_file: PathBuf::from(defaults::CONFIG_FILE),
            snapshot_file: PathBuf::from(defaults::SNAPSHOT_FILE),
            flaky_file: PathBuf::from(defaults::FLAKY_FILE),
            backup_dir: PathBuf::from(defaults::BACKUP_DIR),
            backup_keep: defaults::BACKUP_KEEP,
        }
    }
}

impl Config {
    /// Resolve configuration from the process environment.
    ///
    /// Not validated: callers apply CLI overrides first, then call
    /// [`Config::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(|key| env::var(key).ok())
    }

    /// Resolve values without validating them.
    ///
    /// Callers that layer overrides on top (CLI flags) validate afterwards.
    /// Every variable is optional:
    /// - `CIW_JOBS_FILE`: nightly raw job list (default: data/raw-runs.json)
    /// - `CIW_PR_JOBS_FILE`: PR raw job list (default: data/pr-runs.json)
    /// - `CIW_LOGS_DIR`: nightly job logs (default: data/logs)
    /// - `CIW_PR_LOGS_DIR`: PR job logs (default: data/pr-logs)
    /// - `CIW_CONFIG_FILE`: dashboard YAML (default: config/dashboard.yaml)
    /// - `CIW_SNAPSHOT_FILE`: snapshot document (default: data/snapshot.json)
    /// - `CIW_FLAKY_FILE`: flaky-data document (default: data/flaky.json)
    /// - `CIW_BACKUP_DIR`: snapshot backups (default: data/backups)
    /// - `CIW_BACKUP_KEEP`: backups to retain (default: 5)
    pub fn resolve<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |key: &str, default: &str| {
            PathBuf::from(lookup(key).unwrap_or_else(|| default.to_string()))
        };

        let backup_keep = lookup("CIW_BACKUP_KEEP")
            .unwrap_or_else(|| defaults::BACKUP_KEEP.to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("CIW_BACKUP_KEEP must be a valid number"))?;

        let config = Config {
            jobs_file: path("CIW_JOBS_FILE", defaults::JOBS_FILE),
            pr_jobs_file: path("CIW_PR_JOBS_FILE", defaults::PR_JOBS_FILE),
            logs_dir: path("CIW_LOGS_DIR", defaults::LOGS_DIR),
            pr_logs_dir: path("CIW_PR_LOGS_DIR", defaults::PR_LOGS_DIR),
            config_file: path("CIW_CONFIG_FILE", defaults::CONFIG_FILE),
            snapshot_file: path("CIW_SNAPSHOT_FILE", defaults::SNAPSHOT_FILE),
            flaky_file: path("CIW_FLAKY_FILE", defaults::FLAKY_FILE),
            backup_dir: path("CIW_BACKUP_DIR", defaults::BACKUP_DIR),
            backup_keep,
        };

        Ok(config)
    }

    /// Reject layouts where one output would clobber another input or output.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.snapshot_file == self.flaky_file {
            errors.push(format!(
                "CIW_SNAPSHOT_FILE and CIW_FLAKY_FILE both point at '{}'",
                self.snapshot_file.display()
            ));
        }

        if self.snapshot_file == self.jobs_file || self.flaky_file == self.pr_jobs_file {
            errors.push("An output document points at a raw job list".to_string());
        }

        if self.backup_keep == 0 {
            errors.push("CIW_BACKUP_KEEP must be at least 1".to_string());
        }

        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}
