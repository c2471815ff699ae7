use std::{
    io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tokio::{sync::watch, task::JoinHandle, time::interval};
use tracing::{debug, info, warn};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of one pass over the storage directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Background task that removes stored files older than a retention age.
///
/// The filesystem is the only state it shares with request handling: file
/// ages come from metadata and nothing is indexed in memory.
pub struct RetentionSweeper {
    storage_dir: PathBuf,
    max_age: Duration,
    sweep_interval: Duration,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl RetentionSweeper {
    pub fn new(storage_dir: impl Into<PathBuf>, max_age: Duration, sweep_interval: Duration) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            max_age,
            sweep_interval,
            shutdown: None,
            handle: None,
        }
    }

    pub fn start(&mut self) {
        if self.is_running() {
            warn!("Retention sweeper is already running");
            return;
        }

        let (tx, mut rx) = watch::channel(false);
        let storage_dir = self.storage_dir.clone();
        let max_age = self.max_age;
        let interval_duration = self.sweep_interval.max(MIN_SWEEP_INTERVAL);

        let handle = tokio::spawn(async move {
            info!(
                "Starting retention sweeper for {} (max age {:?}, interval {:?})",
                storage_dir.display(),
                max_age,
                interval_duration
            );

            let mut ticker = interval(interval_duration);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep_dir(&storage_dir, max_age, SystemTime::now()).await;
                    }
                    _ = rx.changed() => {
                        debug!("Retention sweeper received shutdown signal");
                        break;
                    }
                }
            }
        });

        self.shutdown = Some(tx);
        self.handle = Some(handle);
        info!("Retention sweeper started successfully");
    }

    /// Signals the background loop to exit after its current pass.
    pub fn stop(&mut self) {
        match (self.shutdown.take(), self.handle.take()) {
            (Some(tx), Some(_handle)) => {
                let _ = tx.send(true);
                info!("Retention sweeper stopped");
            }
            _ => debug!("Retention sweeper is not running"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Runs a single pass immediately.
    pub async fn sweep_once(&self) -> SweepReport {
        sweep_dir(&self.storage_dir, self.max_age, SystemTime::now()).await
    }

    /// Runs a single pass as if the current time were `now`.
    pub async fn sweep_at(&self, now: SystemTime) -> SweepReport {
        sweep_dir(&self.storage_dir, self.max_age, now).await
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}

impl Drop for RetentionSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Creation time of an artifact, falling back to modification time on
/// filesystems that do not record birth time.
pub fn artifact_timestamp(metadata: &std::fs::Metadata) -> io::Result<SystemTime> {
    metadata.created().or_else(|_| metadata.modified())
}

/// Deletes `path`, returning `Ok(false)` when something else removed it first.
async fn remove_expired(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Expired file was already removed");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

async fn sweep_dir(dir: &Path, max_age: Duration, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Storage directory {} does not exist, nothing to sweep", dir.display());
            return report;
        }
        Err(e) => {
            warn!("Failed to read storage directory {}: {}", dir.display(), e);
            return report;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read entry in {}: {}", dir.display(), e);
                report.failed += 1;
                break;
            }
        };
        let path = entry.path();

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read file metadata");
                report.failed += 1;
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        report.examined += 1;

        let created = match artifact_timestamp(&metadata) {
            Ok(created) => created,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "File has no usable timestamp");
                report.failed += 1;
                continue;
            }
        };

        // Files stamped in the future have age zero.
        let age = now.duration_since(created).unwrap_or_default();
        if age <= max_age {
            continue;
        }

        match remove_expired(&path).await {
            Ok(true) => {
                info!(path = %path.display(), age_secs = age.as_secs(), "Removed expired file");
                report.deleted += 1;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove expired file");
                report.failed += 1;
            }
        }
    }

    if report.deleted > 0 || report.failed > 0 {
        info!(
            "Sweep of {} finished: {} examined, {} deleted, {} failed",
            dir.display(),
            report.examined,
            report.deleted,
            report.failed
        );
    }
    report
}
