//! Input loading and output persistence.
//!
//! All filesystem access of a processing run lives here; the services it feeds
//! are synchronous.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{CompiledConfig, DashboardConfig};
use crate::error::{AppError, AppResult};
use crate::models::{RawJobBatch, RawJobRun, Snapshot};

async fn read_json<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::io_at(path, e))?;

    serde_json::from_str(&content).map_err(|e| {
        AppError::InvalidInput(format!("{}: JSON parsing error: {}", path.display(), e))
    })
}

/// Load a raw job list (`{"jobs": [...]}`).
pub async fn load_runs(path: &Path) -> AppResult<Vec<RawJobRun>> {
    let batch: RawJobBatch = read_json(path).await?;
    info!("Loaded {} job runs from {}", batch.jobs.len(), path.display());
    Ok(batch.jobs)
}

/// Load and compile the YAML dashboard configuration.
pub async fn load_dashboard_config(path: &Path) -> AppResult<CompiledConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::io_at(path, e))?;

    let config = DashboardConfig::from_yaml_str(&content)
        .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?
        .compile();

    if !config.rejected_patterns.is_empty() {
        warn!(
            "{} configuration patterns were skipped: {:?}",
            config.rejected_patterns.len(),
            config.rejected_patterns
        );
    }

    Ok(config)
}

/// Load the previous snapshot.
///
/// A missing file is a fresh start. An unreadable one is an error unless
/// `ignore_corrupt` is set, in which case it is discarded with a warning.
pub async fn load_previous_snapshot(path: &Path, ignore_corrupt: bool) -> AppResult<Option<Snapshot>> {
    match read_json::<Snapshot>(path).await {
        Ok(snapshot) => {
            debug!(
                "Loaded previous snapshot with {} jobs",
                snapshot.jobs().count()
            );
            Ok(Some(snapshot))
        }
        Err(AppError::NotFound(_)) => {
            info!("No previous snapshot at {}, starting fresh", path.display());
            Ok(None)
        }
        Err(e) if ignore_corrupt => {
            warn!("Ignoring unreadable previous snapshot: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Serialize `value` to `path` through a temporary file and a rename, so
/// readers never observe a half-written document.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| AppError::Serialization(format!("{}: {}", path.display(), e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::io_at(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|e| AppError::io_at(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AppError::io_at(path, e))?;

    info!("Wrote {} ({} bytes)", path.display(), json.len());
    Ok(())
}

/// Gzip-copy `source` into `backup_dir` as `<prefix>_<YYYYMMDD_HHMMSS>.json.gz`.
///
/// Returns `None` when there is nothing to back up.
pub async fn backup_file(
    source: &Path,
    backup_dir: &Path,
    prefix: &str,
    now: DateTime<Utc>,
) -> AppResult<Option<PathBuf>> {
    if !tokio::fs::try_exists(source)
        .await
        .map_err(|e| AppError::io_at(source, e))?
    {
        debug!("Nothing to back up at {}", source.display());
        return Ok(None);
    }

    tokio::fs::create_dir_all(backup_dir)
        .await
        .map_err(|e| AppError::io_at(backup_dir, e))?;

    let backup_path = backup_dir.join(format!("{}_{}.json.gz", prefix, now.format("%Y%m%d_%H%M%S")));

    let source_owned = source.to_path_buf();
    let target = backup_path.clone();
    tokio::task::spawn_blocking(move || gzip_file(&source_owned, &target))
        .await
        .map_err(|e| AppError::Io(format!("Backup task failed: {}", e)))??;

    info!("Created backup: {}", backup_path.display());
    Ok(Some(backup_path))
}

fn gzip_file(source: &Path, target: &Path) -> AppResult<()> {
    let input = File::open(source).map_err(|e| AppError::io_at(source, e))?;
    let output = File::create(target).map_err(|e| AppError::io_at(target, e))?;

    let mut reader = BufReader::new(input);
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    std::io::copy(&mut reader, &mut encoder).map_err(|e| AppError::io_at(target, e))?;
    encoder.finish().map_err(|e| AppError::io_at(target, e))?;

    Ok(())
}

/// Keep the newest `keep_count` backups with the given prefix.
///
/// Backup names embed their timestamp, so name order is age order.
/// Returns the number of files removed.
pub async fn cleanup_old_backups(backup_dir: &Path, prefix: &str, keep_count: usize) -> AppResult<usize> {
    let mut dir = match tokio::fs::read_dir(backup_dir).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(AppError::io_at(backup_dir, e)),
    };

    let marker = format!("{}_", prefix);
    let mut backups: Vec<PathBuf> = Vec::new();

    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| AppError::io_at(backup_dir, e))?
    {
        let path = entry.path();
        let is_backup = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(&marker) && n.ends_with(".json.gz"))
            .unwrap_or(false);
        if is_backup {
            backups.push(path);
        }
    }

    // Newest first
    backups.sort_by(|a, b| b.cmp(a));

    let mut removed = 0;
    for path in backups.into_iter().skip(keep_count) {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove old backup {}: {}", path.display(), e);
        } else {
            info!("Removed old backup: {}", path.display());
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_runs_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = load_runs(&dir.path().join("jobs.json")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_runs_rejects_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        tokio::fs::write(&path, "{\"jobs\": [").await.unwrap();

        let err = load_runs(&path).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_previous_snapshot_missing_or_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        assert!(load_previous_snapshot(&path, false).await.unwrap().is_none());

        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(load_previous_snapshot(&path, false).await.is_err());
        assert!(load_previous_snapshot(&path, true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_atomic_write_round_trips_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("snapshot.json");
        let snapshot = Snapshot {
            last_refresh: Some(Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap()),
            ..Default::default()
        };

        write_json_atomic(&path, &snapshot).await.unwrap();

        assert!(!dir.path().join("out").join("snapshot.json.tmp").exists());
        let loaded = load_previous_snapshot(&path, false).await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_backup_is_gzipped_copy() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("snapshot.json");
        tokio::fs::write(&source, "{\"sections\": []}").await.unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 2, 30, 0).unwrap();

        let backup = backup_file(&source, &dir.path().join("backups"), "snapshot", now)
            .await
            .unwrap()
            .unwrap();

        assert!(backup.ends_with("snapshot_20261019_023000.json.gz"));
        let mut decoded = String::new();
        GzDecoder::new(File::open(&backup).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "{\"sections\": []}");
    }

    #[tokio::test]
    async fn test_backup_skips_missing_source() {
        let dir = tempdir().unwrap();
        let result = backup_file(&dir.path().join("none.json"), dir.path(), "snapshot", Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_newest() {
        let dir = tempdir().unwrap();
        for day in 10..17 {
            let name = format!("snapshot_202610{}_000000.json.gz", day);
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        tokio::fs::write(dir.path().join("flaky_20261001_000000.json.gz"), b"x")
            .await
            .unwrap();

        let removed = cleanup_old_backups(dir.path(), "snapshot", 5).await.unwrap();

        assert_eq!(removed, 2);
        assert!(!dir.path().join("snapshot_20261010_000000.json.gz").exists());
        assert!(!dir.path().join("snapshot_20261011_000000.json.gz").exists());
        assert!(dir.path().join("snapshot_20261016_000000.json.gz").exists());
        assert!(dir.path().join("flaky_20261001_000000.json.gz").exists());
    }

    #[tokio::test]
    async fn test_cleanup_missing_dir_is_ok() {
        let dir = tempdir().unwrap();
        assert_eq!(
            cleanup_old_backups(&dir.path().join("absent"), "snapshot", 5).await.unwrap(),
            0
        );
    }
}
