//! Renamed jobs keep their weather across runs.

use ci_weather_lib::models::WeatherStatus;
use ci_weather_lib::services::run_process;

use super::test_helpers::*;

const OLD_NAME: &str = "run-k8s-tests (old)";
const NEW_NAME: &str = "run-k8s-tests (old-v2)";

#[tokio::test]
async fn test_renamed_job_inherits_history() {
    let ws = Workspace::new();
    ws.write_jobs(
        (14..=18)
            .map(|day| job(day as u64, OLD_NAME, "success", day, None))
            .collect(),
    );
    run_process(&ws.config, &options()).await.unwrap();

    ws.write_jobs(vec![job(100, NEW_NAME, "failure", 19, Some("Run tests"))]);
    let snapshot = run_process(&ws.config, &options()).await.unwrap();

    assert_eq!(snapshot.rename_candidates.len(), 1);
    let candidate = &snapshot.rename_candidates[0];
    assert_eq!(candidate.old_name, OLD_NAME);
    assert_eq!(candidate.new_name, NEW_NAME);
    assert!(candidate.similarity >= 90);

    assert!(snapshot.find_job(OLD_NAME).is_none());
    let job = snapshot.find_job(NEW_NAME).unwrap();
    let statuses: Vec<WeatherStatus> = job.weather_history.iter().map(|d| d.status).collect();
    assert_eq!(
        statuses,
        vec![
            WeatherStatus::None,
            WeatherStatus::None,
            WeatherStatus::None,
            WeatherStatus::None,
            WeatherStatus::Passed,
            WeatherStatus::Passed,
            WeatherStatus::Passed,
            WeatherStatus::Passed,
            WeatherStatus::Passed,
            WeatherStatus::Failed,
        ]
    );
    assert_eq!(job.weather_history[4].job_id, Some(14));
}

#[tokio::test]
async fn test_candidate_is_carried_forward_then_history_kept() {
    let ws = Workspace::new();
    ws.write_jobs(vec![job(18, OLD_NAME, "success", 18, None)]);
    run_process(&ws.config, &options()).await.unwrap();

    ws.write_jobs(vec![job(19, NEW_NAME, "success", 19, None)]);
    run_process(&ws.config, &options()).await.unwrap();

    // Third run: the old name is gone from the cache too
    let snapshot = run_process(&ws.config, &options()).await.unwrap();

    assert_eq!(snapshot.rename_candidates.len(), 1);
    let job = snapshot.find_job(NEW_NAME).unwrap();
    assert_eq!(job.weather_history[8].status, WeatherStatus::Passed);
    assert_eq!(job.weather_history[8].job_id, Some(18));
}

#[tokio::test]
async fn test_excluded_pair_is_not_merged() {
    let ws = Workspace::new();
    let yaml = format!(
        "{}rename_exclusions:\n  - old: \"{}\"\n    new: \"{}\"\n",
        DASHBOARD_YAML, OLD_NAME, NEW_NAME
    );
    std::fs::write(&ws.config.config_file, yaml).unwrap();

    ws.write_jobs(vec![job(18, OLD_NAME, "success", 18, None)]);
    run_process(&ws.config, &options()).await.unwrap();

    ws.write_jobs(vec![job(19, NEW_NAME, "success", 19, None)]);
    let snapshot = run_process(&ws.config, &options()).await.unwrap();

    assert!(snapshot.rename_candidates.is_empty());
    let job = snapshot.find_job(NEW_NAME).unwrap();
    assert_eq!(job.weather_history[8].status, WeatherStatus::None);
}
