use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    error::DownloadError,
    fetcher::{FormatPreference, MediaFetcher},
    rate_limiter::RateLimiter,
    sanitize::sanitize_filename,
};

const ACCEPTED_SCHEMES: [&str; 2] = ["http://", "https://"];
const FALLBACK_BASE_NAME: &str = "video";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub storage_dir: PathBuf,
    pub max_duration_seconds: u64,
    pub format: FormatPreference,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("/data"),
            max_duration_seconds: 3600,
            format: FormatPreference::default(),
        }
    }
}

/// Metadata about a file that finished downloading.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DownloadResult {
    #[schema(example = "Test: Video!")]
    pub title: String,
    pub uploader: Option<String>,
    /// Base name of the stored file, without directories.
    #[schema(example = "Test_ Video_.mp4")]
    pub filename: String,
    pub file_size: u64,
    /// Probed duration in seconds, absent when the source did not report one.
    pub duration: Option<u64>,
    pub completed_at: DateTime<Utc>,
}

/// Runs a download request through its gates in order: URL shape, admission,
/// probe, duration ceiling, fetch. The first failing gate ends the request.
pub struct DownloadOrchestrator {
    fetcher: Arc<dyn MediaFetcher>,
    rate_limiter: Arc<RateLimiter>,
    config: OrchestratorConfig,
}

impl DownloadOrchestrator {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        rate_limiter: Arc<RateLimiter>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            fetcher,
            rate_limiter,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub async fn handle(&self, url: &str, client_id: &str) -> Result<DownloadResult, DownloadError> {
        let url = validate_url(url)?;

        if !self.rate_limiter.admit(client_id) {
            warn!("Rejected download from '{}': rate limit exceeded", client_id);
            return Err(DownloadError::RateLimited {
                limit: self.rate_limiter.max_requests_per_client(),
                window: self.rate_limiter.window(),
            });
        }

        let probe = self.fetcher.probe(url).await.map_err(|e| {
            warn!("Probe failed for {}: {}", url, e);
            if e.is_fetcher_fault() {
                DownloadError::FetcherUnavailable(e)
            } else {
                DownloadError::Unresolvable {
                    detail: e.to_string(),
                }
            }
        })?;
        info!(
            "Video found: {}, duration: {:?}s",
            probe.title, probe.duration_seconds
        );

        if let Some(duration) = probe.duration_seconds
            && duration > self.config.max_duration_seconds
        {
            warn!(
                "Video too long: {}s (limit {}s)",
                duration, self.config.max_duration_seconds
            );
            return Err(DownloadError::DurationExceeded {
                limit: self.config.max_duration_seconds,
                duration,
            });
        }

        let base_name = match sanitize_filename(&probe.title) {
            name if name.is_empty() => FALLBACK_BASE_NAME.to_string(),
            name => name,
        };

        tokio::fs::create_dir_all(&self.config.storage_dir).await?;
        let template = output_template(&self.config.storage_dir, &base_name);
        debug!("Download target template: {}", template.display());

        let fetched = self
            .fetcher
            .fetch(url, &template, &self.config.format)
            .await
            .map_err(|e| {
                warn!("Download failed for {}: {}", url, e);
                if e.is_fetcher_fault() {
                    DownloadError::FetcherUnavailable(e)
                } else {
                    DownloadError::DownloadFailed {
                        detail: e.to_string(),
                    }
                }
            })?;

        let metadata = tokio::fs::metadata(&fetched.resolved_path).await?;
        let filename = fetched
            .resolved_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| base_name.clone());

        info!("Download complete: {} ({} bytes)", filename, metadata.len());

        Ok(DownloadResult {
            title: probe.title,
            uploader: probe.uploader,
            filename,
            file_size: metadata.len(),
            duration: probe.duration_seconds,
            completed_at: Utc::now(),
        })
    }
}

/// Checks that `url` is present and uses an accepted scheme.
pub fn validate_url(url: &str) -> Result<&str, DownloadError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(DownloadError::NoUrl);
    }
    if !ACCEPTED_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        return Err(DownloadError::InvalidUrl);
    }
    Ok(url)
}

/// `<dir>/<base>.%(ext)s`, leaving the extension to the fetcher.
fn output_template(dir: &Path, base_name: &str) -> PathBuf {
    dir.join(format!("{}.%(ext)s", base_name))
}
