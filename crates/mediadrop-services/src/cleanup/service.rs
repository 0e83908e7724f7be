use mediadrop_core::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::time::{interval_at, Instant};

/// Periodically deletes staging directories left behind by abandoned uploads.
///
/// The reaper does not consult the lock registry; the retention window is
/// expected to be far longer than the gap between two chunks of a live upload.
#[derive(Debug, Clone)]
pub struct StaleSessionReaper {
    staging_root: PathBuf,
    retention: Duration,
    interval: Duration,
}

impl StaleSessionReaper {
    pub fn new(staging_root: impl Into<PathBuf>, retention: Duration, interval: Duration) -> Self {
        Self {
            staging_root: staging_root.into(),
            retention,
            interval,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.staging_root(),
            config.staging_retention(),
            config.staging_reap_interval(),
        )
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Start the background reap loop
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.interval.max(Duration::from_millis(1));
            let mut reap_interval = interval_at(Instant::now() + period, period);

            loop {
                reap_interval.tick().await;

                match self.reap_once().await {
                    Ok(removed) => {
                        tracing::info!(removed, "Stale staging cleanup completed");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Stale staging cleanup failed");
                    }
                }
            }
        })
    }

    /// Delete every staging directory whose mtime is older than the retention
    /// window. Returns the number of directories removed.
    #[tracing::instrument(skip(self), fields(staging_root = %self.staging_root.display()))]
    pub async fn reap_once(&self) -> Result<usize, anyhow::Error> {
        let mut entries = match fs::read_dir(&self.staging_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!(path = %entry.path().display(), error = %e, "Skipping entry");
                    continue;
                }
            };
            if !metadata.is_dir() {
                continue;
            }
            let age = match metadata.modified().ok().and_then(|m| now.duration_since(m).ok()) {
                Some(age) => age,
                None => continue,
            };
            if age <= self.retention {
                continue;
            }

            let path = entry.path();
            match fs::remove_dir_all(&path).await {
                Ok(()) => {
                    tracing::debug!(
                        path = %path.display(),
                        age_secs = age.as_secs(),
                        "Removed stale staging directory"
                    );
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove stale staging directory");
                }
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn age_dir(path: &Path, age: Duration) {
        let file = std::fs::File::open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn test_reap_removes_only_stale_directories() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("tmp");
        let stale = staging.join("old.png_e1_t");
        let fresh = staging.join("new.png_e1_t");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::create_dir_all(&fresh).unwrap();
        std::fs::write(stale.join("0.part"), b"AAA").unwrap();
        std::fs::write(fresh.join("0.part"), b"BBB").unwrap();
        std::fs::write(staging.join("stray-file"), b"x").unwrap();
        age_dir(&stale, Duration::from_secs(600));

        let reaper =
            StaleSessionReaper::new(&staging, Duration::from_secs(120), Duration::from_secs(300));
        let removed = reaper.reap_once().await.unwrap();

        assert_eq!(removed, 1);
        assert!(!stale.exists());
        assert!(fresh.join("0.part").exists());
        assert!(staging.join("stray-file").exists());
    }

    #[tokio::test]
    async fn test_reap_missing_staging_root() {
        let dir = tempdir().unwrap();
        let reaper = StaleSessionReaper::new(
            dir.path().join("does-not-exist"),
            Duration::from_secs(120),
            Duration::from_secs(300),
        );
        assert_eq!(reaper.reap_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_started_reaper_runs_on_interval() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join("abandoned_e1_t");
        std::fs::create_dir_all(&stale).unwrap();
        age_dir(&stale, Duration::from_secs(600));

        let reaper = Arc::new(StaleSessionReaper::new(
            dir.path(),
            Duration::from_secs(120),
            Duration::from_millis(50),
        ));
        let handle = reaper.start();

        for _ in 0..100 {
            if !stale.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert!(!stale.exists());
    }
}
