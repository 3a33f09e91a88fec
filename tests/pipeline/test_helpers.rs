//! Shared helpers for pipeline tests.

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use ci_weather_lib::config::Config;
use ci_weather_lib::services::RunOptions;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Dashboard configuration used unless a test writes its own.
pub const DASHBOARD_YAML: &str = r#"
sections:
  - id: k8s
    name: Kubernetes
    project: runtime
    patterns: ["k8s"]
    maintainers: [alice]
  - id: static
    name: Static checks
    patterns: ["/^static-/"]
projects:
  - id: runtime
    name: Runtime
fatal_step_patterns:
  - "^Run tests"
  - "/(?!broken"
required_tests: ["run-k8s-tests"]
maintainers:
  alice:
    name: Alice
    slack: "@alice"
"#;

/// Fixed processing time: 2026-10-19 12:00 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub fn options() -> RunOptions {
    RunOptions {
        ignore_cache: false,
        dry_run: false,
        now: now(),
    }
}

/// A temporary data layout with a matching [`Config`].
pub struct Workspace {
    pub dir: TempDir,
    pub config: Config,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path();

        let config = Config {
            jobs_file: root.join("raw-runs.json"),
            pr_jobs_file: root.join("pr-runs.json"),
            logs_dir: root.join("logs"),
            pr_logs_dir: root.join("pr-logs"),
            config_file: root.join("dashboard.yaml"),
            snapshot_file: root.join("out").join("snapshot.json"),
            flaky_file: root.join("out").join("flaky.json"),
            backup_dir: root.join("backups"),
            backup_keep: 5,
        };

        std::fs::create_dir_all(&config.logs_dir).unwrap();
        std::fs::create_dir_all(&config.pr_logs_dir).unwrap();
        std::fs::write(&config.config_file, DASHBOARD_YAML).unwrap();

        Workspace { dir, config }
    }

    pub fn write_jobs(&self, jobs: Vec<Value>) {
        let body = json!({ "jobs": jobs });
        std::fs::write(&self.config.jobs_file, body.to_string()).unwrap();
    }

    pub fn write_pr_jobs(&self, jobs: Vec<Value>) {
        let body = json!({ "jobs": jobs });
        std::fs::write(&self.config.pr_jobs_file, body.to_string()).unwrap();
    }

    pub fn write_log(&self, job_id: u64, content: &str) {
        std::fs::write(self.config.logs_dir.join(format!("{}.log", job_id)), content).unwrap();
    }

    pub fn write_pr_log(&self, job_id: u64, content: &str) {
        std::fs::write(self.config.pr_logs_dir.join(format!("{}.log", job_id)), content).unwrap();
    }

    pub fn backups(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.config.backup_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// A completed nightly job attempt on October `day`.
pub fn job(id: u64, name: &str, conclusion: &str, day: u32, failed_step: Option<&str>) -> Value {
    let mut steps = vec![json!({"name": "Set up job", "conclusion": "success", "number": 1})];
    match failed_step {
        Some(step) => steps.push(json!({"name": step, "conclusion": "failure", "number": 2})),
        None => steps.push(json!({"name": "Run tests", "conclusion": "success", "number": 2})),
    }

    json!({
        "id": id,
        "name": name,
        "status": "completed",
        "conclusion": conclusion,
        "started_at": format!("2026-10-{:02}T02:00:00Z", day),
        "completed_at": format!("2026-10-{:02}T02:45:00Z", day),
        "run_attempt": 1,
        "run_id": 7000 + id,
        "html_url": format!("https://github.com/org/repo/actions/runs/{}/job/{}", 7000 + id, id),
        "steps": steps,
    })
}

/// A PR job attempt.
pub fn pr_job(id: u64, pr: u64, name: &str, attempt: u32, conclusion: &str, merged: bool) -> Value {
    let mut value = job(id, name, conclusion, 18, (conclusion == "failure").then_some("Run tests"));
    value["run_attempt"] = json!(attempt);
    value["pr_number"] = json!(pr);
    value["pr_title"] = json!(format!("Change #{}", pr));
    value["pr_merged"] = json!(merged);
    value
}
