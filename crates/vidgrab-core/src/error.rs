use std::time::Duration;
use thiserror::Error;

use crate::fetcher::FetchError;

/// Which side of the boundary is responsible for a failed download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ClientInput,
    RateLimit,
    Server,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("No URL provided")]
    NoUrl,
    #[error("Invalid URL format")]
    InvalidUrl,
    #[error("Rate limit exceeded: {limit} requests per {window:?}")]
    RateLimited { limit: usize, window: Duration },
    #[error("Could not resolve media: {detail}")]
    Unresolvable { detail: String },
    #[error("Video exceeds maximum duration: {duration}s > {limit}s")]
    DurationExceeded { limit: u64, duration: u64 },
    #[error("Failed to download video: {detail}")]
    DownloadFailed { detail: String },
    /// The fetcher could not be run or its output could not be read.
    #[error("Media fetcher unavailable: {0}")]
    FetcherUnavailable(#[source] FetchError),
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::NoUrl
            | DownloadError::InvalidUrl
            | DownloadError::Unresolvable { .. }
            | DownloadError::DurationExceeded { .. } => ErrorKind::ClientInput,
            DownloadError::RateLimited { .. } => ErrorKind::RateLimit,
            DownloadError::DownloadFailed { .. }
            | DownloadError::FetcherUnavailable(_)
            | DownloadError::Storage(_) => ErrorKind::Server,
        }
    }

    /// Short machine-readable reason shown to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            DownloadError::NoUrl => "No URL provided",
            DownloadError::InvalidUrl => "Invalid URL format",
            DownloadError::RateLimited { .. } => "Rate limit exceeded",
            DownloadError::Unresolvable { .. } => "Could not retrieve video information",
            DownloadError::DurationExceeded { .. } => "Video exceeds maximum duration",
            DownloadError::DownloadFailed { .. } => "Failed to download video",
            DownloadError::FetcherUnavailable(_) => "Video service unavailable",
            DownloadError::Storage(_) => "Storage error",
        }
    }
}
