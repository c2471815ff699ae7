pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod rate_limiter;
pub mod sanitize;
pub mod storage;
pub mod sweeper;

pub use error::{DownloadError, ErrorKind};
pub use fetcher::{FetchError, FetchedMedia, FormatPreference, MediaFetcher, ProbeResult, YtDlp};
pub use orchestrator::{DownloadOrchestrator, DownloadResult, OrchestratorConfig};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use sanitize::sanitize_filename;
pub use storage::StorageStats;
pub use sweeper::{RetentionSweeper, SweepReport};
