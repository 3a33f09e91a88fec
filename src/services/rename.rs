//! Job rename detection.
//!
//! CI job names drift (parameter reordering, workflow renames). Without an
//! alias the renamed job would start over with ten empty days, so vanished
//! names are matched against new ones and the old weather is carried over.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::CompiledConfig;
use crate::models::{LogicalJob, RenameCandidate, Snapshot, WeatherDay};

/// Number of trailing cached days checked for recent activity.
const RECENT_DAYS: usize = 5;

/// Position-aligned character match over the shorter name.
pub fn similarity(a: &str, b: &str) -> f64 {
    let shorter = a.chars().count().min(b.chars().count());
    if shorter == 0 {
        return 0.0;
    }

    let same = a
        .chars()
        .zip(b.chars())
        .filter(|(x, y)| x == y)
        .count();
    same as f64 / shorter as f64
}

/// Common prefix length over the shorter name.
pub fn prefix_ratio(a: &str, b: &str) -> f64 {
    let shorter = a.chars().count().min(b.chars().count());
    if shorter == 0 {
        return 0.0;
    }

    let common = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count();
    common as f64 / shorter as f64
}

fn cached_histories(previous: Option<&Snapshot>) -> HashMap<&str, &[WeatherDay]> {
    previous
        .map(|snapshot| {
            snapshot
                .jobs()
                .map(|job| (job.name.as_str(), job.weather_history.as_slice()))
                .collect()
        })
        .unwrap_or_default()
}

fn recently_active(history: &[WeatherDay]) -> bool {
    history
        .iter()
        .rev()
        .take(RECENT_DAYS)
        .any(WeatherDay::has_data)
}

/// Propose rename candidates between the previous snapshot and this run.
///
/// Newly detected pairs come first (best score first), followed by still
/// fresh candidates carried forward from the previous snapshot.
pub fn detect_renames(
    current_jobs: &[LogicalJob],
    previous: Option<&Snapshot>,
    config: &CompiledConfig,
    now: DateTime<Utc>,
) -> Vec<RenameCandidate> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let thresholds = config.thresholds();

    // name -> first day with data in this run
    let current: BTreeMap<&str, Option<DateTime<Utc>>> = current_jobs
        .iter()
        .map(|job| {
            let first_active = job
                .weather_history
                .iter()
                .find(|day| day.has_data())
                .map(|day| day.date);
            (job.name.as_str(), first_active)
        })
        .collect();

    let cached = cached_histories(Some(previous));

    let mut disappeared: Vec<&str> = cached
        .iter()
        .filter(|(name, history)| !current.contains_key(*name) && recently_active(history))
        .map(|(name, _)| *name)
        .collect();
    disappeared.sort_unstable();

    let aliased: HashSet<(&str, &str)> = config
        .job_aliases()
        .iter()
        .map(|pair| (pair.old.as_str(), pair.new.as_str()))
        .collect();

    let mut candidates: Vec<RenameCandidate> = Vec::new();

    for (new_name, first_active) in current.iter().filter(|(name, _)| !cached.contains_key(*name)) {
        for old_name in &disappeared {
            if config.is_rename_excluded(old_name, new_name)
                || aliased.contains(&(*old_name, *new_name))
            {
                continue;
            }

            let score = similarity(old_name, new_name);
            let prefix = prefix_ratio(old_name, new_name);
            if score > thresholds.similarity || prefix > thresholds.prefix_ratio {
                debug!(
                    "Rename candidate '{}' -> '{}' (similarity {:.2}, prefix {:.2}, first active {:?})",
                    old_name, new_name, score, prefix, first_active
                );
                candidates.push(RenameCandidate {
                    old_name: old_name.to_string(),
                    new_name: new_name.to_string(),
                    similarity: (score * 100.0).round().clamp(0.0, 100.0) as u8,
                    detected_date: now,
                });
            }
        }
    }

    candidates.sort_by(|a, b| {
        b.similarity
            .cmp(&a.similarity)
            .then_with(|| a.new_name.cmp(&b.new_name))
            .then_with(|| a.old_name.cmp(&b.old_name))
    });
    let detected = candidates.len();

    let ttl = Duration::days(thresholds.candidate_ttl_days);
    for old in &previous.rename_candidates {
        let fresh = now - old.detected_date < ttl;
        let known = candidates
            .iter()
            .any(|c| c.is_pair(&old.old_name, &old.new_name));

        // the old job running again means it was never renamed
        let old_is_live = current.contains_key(old.old_name.as_str());

        if fresh
            && !known
            && !old_is_live
            && !config.is_rename_excluded(&old.old_name, &old.new_name)
        {
            candidates.push(old.clone());
        } else if old_is_live {
            debug!(
                "Dropping rename candidate '{}' -> '{}': old job is running again",
                old.old_name, old.new_name
            );
        }
    }

    if !candidates.is_empty() {
        info!(
            "Rename detection: {} new candidates, {} carried forward",
            detected,
            candidates.len() - detected
        );
    }

    candidates
}

/// Copy old days into the new history where the new one has no data.
///
/// Days are matched by calendar date. Returns the number of days filled.
pub fn merge_weather_history(new: &mut [WeatherDay], old: &[WeatherDay]) -> usize {
    let old_by_day: HashMap<_, &WeatherDay> = old
        .iter()
        .filter(|day| day.has_data())
        .map(|day| (day.day(), day))
        .collect();

    let mut filled = 0;
    for slot in new.iter_mut().filter(|day| !day.has_data()) {
        if let Some(old_day) = old_by_day.get(&slot.day()) {
            *slot = (*old_day).clone();
            filled += 1;
        }
    }
    filled
}

/// Transplant cached weather onto renamed jobs.
///
/// Confirmed aliases always merge. Candidates merge when the old name is still
/// present in the previous snapshot and is not itself a job of this run.
/// Returns the number of days filled.
pub fn apply_renames(
    jobs: &mut [LogicalJob],
    previous: Option<&Snapshot>,
    candidates: &[RenameCandidate],
    config: &CompiledConfig,
) -> usize {
    let cached = cached_histories(previous);
    if cached.is_empty() {
        return 0;
    }

    let live: HashSet<String> = jobs.iter().map(|job| job.name.clone()).collect();

    let pairs = config
        .job_aliases()
        .iter()
        .map(|pair| (pair.old.as_str(), pair.new.as_str()))
        .chain(
            candidates
                .iter()
                .filter(|c| !live.contains(&c.old_name))
                .map(|c| (c.old_name.as_str(), c.new_name.as_str())),
        );

    let mut filled = 0;
    for (old_name, new_name) in pairs {
        let Some(old_history) = cached.get(old_name) else {
            continue;
        };
        if let Some(job) = jobs.iter_mut().find(|job| job.name == new_name) {
            let n = merge_weather_history(&mut job.weather_history, old_history);
            if n > 0 {
                debug!("Merged {} days from '{}' into '{}'", n, old_name, new_name);
            }
            filled += n;
        }
    }

    filled
}
