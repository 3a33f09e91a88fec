//! Nightly processing runs.

use ci_weather_lib::error::AppError;
use ci_weather_lib::models::{JobStatus, Snapshot, WeatherStatus};
use ci_weather_lib::services::{check_config, run_process, RunOptions};
use serde_json::Value;

use super::test_helpers::*;

const QEMU_LOG: &str = "\
2026-10-19T02:10:00.0000000Z Running `k8s-pods.bats`
2026-10-19T02:10:01.0000000Z not ok 1 foo # SKIP
2026-10-19T02:10:02.0000000Z not ok 2 bar
2026-10-19T02:10:03.0000000Z ok 3 baz
";

fn nightly_workspace() -> Workspace {
    let ws = Workspace::new();
    ws.write_jobs(vec![
        job(1, "run-k8s-tests (qemu)", "failure", 19, Some("Run tests")),
        job(2, "run-k8s-tests (clh)", "failure", 19, Some("Build image")),
        job(3, "static-checks", "success", 19, None),
        job(4, "run-k8s-tests (qemu)", "success", 18, None),
        job(5, "docs-build", "cancelled", 19, None),
    ]);
    ws.write_log(1, QEMU_LOG);
    ws
}

fn read_snapshot_json(ws: &Workspace) -> Value {
    let content = std::fs::read_to_string(&ws.config.snapshot_file).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[tokio::test]
async fn test_process_writes_snapshot() {
    let ws = nightly_workspace();

    let snapshot = run_process(&ws.config, &options()).await.unwrap();

    assert_eq!(snapshot.all_jobs.len(), 4);
    assert_eq!(snapshot.stats.total, 4);
    assert_eq!(snapshot.stats.failed, 1);
    assert_eq!(snapshot.stats.passed, 1);
    assert_eq!(snapshot.stats.not_run, 2);
    assert_eq!(snapshot.stats.setup_failed, 1);
    assert_eq!(snapshot.stats.required_failed, 1);

    let json = read_snapshot_json(&ws);
    assert_eq!(json["lastRefresh"], "2026-10-19T12:00:00Z");
    assert!(json["allJobs"].is_array());
    assert!(json["failedTestsIndex"]["bar"].is_object());
    assert_eq!(json["projects"][0]["id"], "runtime");
}

#[tokio::test]
async fn test_failure_details_come_from_log() {
    let ws = nightly_workspace();
    let snapshot = run_process(&ws.config, &options()).await.unwrap();

    let qemu = snapshot.find_job("run-k8s-tests (qemu)").unwrap();
    assert_eq!(qemu.status, JobStatus::Failed);
    assert_eq!(qemu.section, "k8s");
    assert_eq!(qemu.maintainers[0].name.as_deref(), Some("Alice"));

    let today = qemu.weather_history.last().unwrap();
    assert_eq!(today.status, WeatherStatus::Failed);
    assert_eq!(today.failure_step.as_deref(), Some("k8s-pods.bats"));
    let details = today.failure_details.as_ref().unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].number, 2);
    assert_eq!(details[0].name, "bar");

    let yesterday = &qemu.weather_history[8];
    assert_eq!(yesterday.status, WeatherStatus::Passed);
    assert_eq!(yesterday.job_id, Some(4));
}

#[tokio::test]
async fn test_setup_failure_is_reported_as_not_run() {
    let ws = nightly_workspace();
    let snapshot = run_process(&ws.config, &options()).await.unwrap();

    let clh = snapshot.find_job("run-k8s-tests (clh)").unwrap();
    assert_eq!(clh.status, JobStatus::NotRun);
    assert!(clh.setup_retry);

    let today = clh.weather_history.last().unwrap();
    assert_eq!(today.status, WeatherStatus::NotRun);
    assert!(today.setup_failed);
    assert!(clh.error.is_none());

    let json = read_snapshot_json(&ws);
    let clh_json = json["allJobs"]
        .as_array()
        .unwrap()
        .iter()
        .find(|j| j["name"] == "run-k8s-tests (clh)")
        .unwrap();
    assert_eq!(clh_json["weatherHistory"][9]["setupFailed"], true);
    assert_eq!(clh_json["setupRetry"], true);
}

#[tokio::test]
async fn test_regex_section_and_fallback() {
    let ws = nightly_workspace();
    let snapshot = run_process(&ws.config, &options()).await.unwrap();

    assert_eq!(snapshot.find_job("static-checks").unwrap().section, "static");
    assert_eq!(snapshot.find_job("docs-build").unwrap().section, "other");
    let ids: Vec<&str> = snapshot.sections.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["k8s", "static", "other"]);
}

#[tokio::test]
async fn test_second_run_backs_up_and_is_stable() {
    let ws = nightly_workspace();

    let first = run_process(&ws.config, &options()).await.unwrap();
    assert!(ws.backups().is_empty());

    let second = run_process(&ws.config, &options()).await.unwrap();

    assert_eq!(ws.backups().len(), 1);
    assert_eq!(first.all_jobs, second.all_jobs);
    assert_eq!(second.failed_tests_index["bar"].total_count, 1);

    let on_disk: Snapshot =
        serde_json::from_str(&std::fs::read_to_string(&ws.config.snapshot_file).unwrap()).unwrap();
    assert_eq!(on_disk, second);
}

#[tokio::test]
async fn test_cached_history_survives_runs_leaving_the_feed() {
    let ws = nightly_workspace();
    run_process(&ws.config, &options()).await.unwrap();

    // The fetcher only returns the latest runs now
    ws.write_jobs(vec![job(1, "run-k8s-tests (qemu)", "failure", 19, Some("Run tests"))]);
    std::fs::remove_file(ws.config.logs_dir.join("1.log")).unwrap();

    let snapshot = run_process(&ws.config, &options()).await.unwrap();
    let qemu = snapshot.find_job("run-k8s-tests (qemu)").unwrap();

    assert_eq!(qemu.weather_history[8].status, WeatherStatus::Passed);
    // Details recovered from the cached day
    let today = qemu.weather_history.last().unwrap();
    assert_eq!(today.failure_details.as_ref().unwrap()[0].name, "bar");
}

#[tokio::test]
async fn test_corrupt_previous_snapshot() {
    let ws = nightly_workspace();
    std::fs::create_dir_all(ws.config.snapshot_file.parent().unwrap()).unwrap();
    std::fs::write(&ws.config.snapshot_file, "{ truncated").unwrap();

    let err = run_process(&ws.config, &options()).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(
        std::fs::read_to_string(&ws.config.snapshot_file).unwrap(),
        "{ truncated"
    );

    let forgiving = RunOptions {
        ignore_cache: true,
        ..options()
    };
    let snapshot = run_process(&ws.config, &forgiving).await.unwrap();
    assert_eq!(snapshot.all_jobs.len(), 4);
}

#[tokio::test]
async fn test_missing_jobs_file_is_fatal() {
    let ws = Workspace::new();

    let err = run_process(&ws.config, &options()).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert!(!ws.config.snapshot_file.exists());
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let ws = nightly_workspace();
    let dry = RunOptions {
        dry_run: true,
        ..options()
    };

    let snapshot = run_process(&ws.config, &dry).await.unwrap();

    assert_eq!(snapshot.all_jobs.len(), 4);
    assert!(!ws.config.snapshot_file.exists());
}

#[tokio::test]
async fn test_check_config_reports_rejected_patterns() {
    let ws = Workspace::new();

    let compiled = check_config(&ws.config).await.unwrap();

    assert_eq!(compiled.rejected_patterns, vec!["/(?!broken".to_string()]);
    assert!(compiled.fatal_steps.is_fatal("Run tests (k8s)"));
    assert!(!compiled.fatal_steps.is_fatal("Build image"));
}

#[tokio::test]
async fn test_invalid_config_is_fatal() {
    let ws = Workspace::new();
    std::fs::write(&ws.config.config_file, "sections:\n  - id: a\n    name: A\n    project: nope\n").unwrap();
    ws.write_jobs(vec![job(1, "x", "success", 19, None)]);

    let err = run_process(&ws.config, &options()).await.unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}
