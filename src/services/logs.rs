//! Job log access.
//!
//! Logs are fetched by an external step and dropped into a directory as
//! `<job_id>.log` (or `.txt`). They are read once, up front, so that the
//! processing pipeline itself stays synchronous.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{AppError, AppResult};

/// Read-only lookup of a job attempt's log text.
pub trait LogSource {
    fn log_for(&self, job_id: u64) -> Option<&str>;
}

/// In-memory log store keyed by job id.
#[derive(Debug, Clone, Default)]
pub struct LogStore {
    logs: HashMap<u64, String>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, job_id: u64, content: impl Into<String>) {
        self.logs.insert(job_id, content.into());
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// Load the logs of the given job ids from `dir`.
    ///
    /// Missing files are not an error: the job simply has no parse result.
    /// A missing directory is treated as empty.
    pub async fn load_dir<I>(dir: &Path, job_ids: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut store = LogStore::new();

        if !tokio::fs::try_exists(dir)
            .await
            .map_err(|e| AppError::io_at(dir, e))?
        {
            info!("Log directory {:?} does not exist, continuing without logs", dir);
            return Ok(store);
        }

        let mut missing = 0usize;
        for job_id in job_ids {
            match read_log(dir, job_id).await? {
                Some(content) => store.insert(job_id, content),
                None => {
                    debug!("No log found for job {}", job_id);
                    missing += 1;
                }
            }
        }

        info!(
            "Loaded {} job logs from {:?} ({} missing)",
            store.len(),
            dir,
            missing
        );

        Ok(store)
    }
}

impl LogSource for LogStore {
    fn log_for(&self, job_id: u64) -> Option<&str> {
        self.logs.get(&job_id).map(String::as_str)
    }
}

async fn read_log(dir: &Path, job_id: u64) -> AppResult<Option<String>> {
    for ext in ["log", "txt"] {
        let path = dir.join(format!("{}.{}", job_id, ext));
        match tokio::fs::read(&path).await {
            // Logs may contain arbitrary bytes from test output
            Ok(bytes) => return Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(AppError::io_at(&path, e)),
        }
    }
    Ok(None)
}
