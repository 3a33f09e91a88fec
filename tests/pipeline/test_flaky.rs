//! PR flaky-data runs.

use ci_weather_lib::services::{run_flaky, RunOptions};
use serde_json::Value;

use super::test_helpers::*;

#[tokio::test]
async fn test_flaky_report_is_written() {
    let ws = Workspace::new();
    ws.write_pr_jobs(vec![
        // PR 42: fails, then passes on retry, merged
        pr_job(1, 42, "run-k8s-tests (qemu)", 1, "failure", true),
        pr_job(2, 42, "run-k8s-tests (qemu)", 2, "success", true),
        // PR 43: fails on every attempt, not merged
        pr_job(3, 43, "run-k8s-tests (qemu)", 1, "failure", false),
        pr_job(4, 43, "run-k8s-tests (qemu)", 2, "failure", false),
        // PR 44: no log, job-level record
        pr_job(5, 44, "static-checks", 1, "failure", true),
    ]);
    ws.write_pr_log(1, "Running k8s-pods.bats\nnot ok 1 pods start\nok 2 exec\n");
    ws.write_pr_log(3, "not ok 1 pods start\n");
    ws.write_pr_log(4, "not ok 1 pods start\nnot ok 2 exec\n");

    let report = run_flaky(&ws.config, &options()).await.unwrap();

    assert_eq!(report.window_days, 14);
    assert_eq!(report.summary.prs_analyzed, 3);
    assert_eq!(report.summary.runs_analyzed, 5);

    let pods = &report.tests[0];
    assert_eq!(pods.name, "pods start");
    assert_eq!(pods.total_count, 3);
    assert_eq!(pods.flaky_count, 1);
    assert_eq!(pods.merged_count, 1);
    assert_eq!(pods.unique_prs, 2);

    let static_checks = report
        .tests
        .iter()
        .find(|t| t.name == "static-checks")
        .unwrap();
    assert!(static_checks.job_level);
    assert_eq!(static_checks.merged_count, 1);

    assert_eq!(report.summary.confirmed_flaky_tests, 1);
    assert_eq!(report.summary.total_failures, 5);
    assert_eq!(
        report.summary.most_affected_job.as_deref(),
        Some("run-k8s-tests (qemu)")
    );

    let json: Value =
        serde_json::from_str(&std::fs::read_to_string(&ws.config.flaky_file).unwrap()).unwrap();
    assert_eq!(json["windowDays"], 14);
    assert!(json["tests"][0]["occurrences"][0]["prNumber"].is_u64());
    assert_eq!(json["summary"]["trend"].as_array().unwrap().len(), 14);
}

#[tokio::test]
async fn test_flaky_dry_run() {
    let ws = Workspace::new();
    ws.write_pr_jobs(vec![pr_job(1, 7, "job", 1, "failure", false)]);

    let report = run_flaky(
        &ws.config,
        &RunOptions {
            dry_run: true,
            ..options()
        },
    )
    .await
    .unwrap();

    assert_eq!(report.tests.len(), 1);
    assert!(!report.tests[0].occurrences[0].is_flaky);
    assert!(!ws.config.flaky_file.exists());
}
