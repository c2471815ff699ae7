use serde::Serialize;
use std::{env, path::PathBuf, str::FromStr, time::Duration};
use utoipa::ToSchema;
use vidgrab_core::{FormatPreference, OrchestratorConfig, RateLimitConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub cors_origins: Vec<String>,
    pub storage_dir: PathBuf,
    pub max_duration_seconds: u64,
    pub max_file_age: Duration,
    pub sweep_interval: Duration,
    pub rate_limit: RateLimitConfig,
    pub rate_limit_compaction_interval: Duration,
    pub ytdlp_path: PathBuf,
    pub fetch_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub enum LogFormat {
    Text,
    Json,
}

/// Serializable view of the running configuration.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConfigSnapshot {
    pub storage_dir: String,
    pub max_duration_seconds: u64,
    pub max_file_age_hours: u64,
    pub sweep_interval_seconds: u64,
    pub max_requests_per_client: usize,
    pub rate_limit_window_minutes: u64,
    pub ytdlp_path: String,
    pub fetch_timeout_seconds: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            log_level: "vidgrab_web_api=debug,vidgrab_core=debug,tower_http=debug".to_string(),
            log_format: LogFormat::Json,
            cors_origins: vec!["*".to_string()],
            storage_dir: PathBuf::from("/data"),
            max_duration_seconds: 3600,
            max_file_age: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            rate_limit: RateLimitConfig::default(),
            rate_limit_compaction_interval: Duration::from_secs(10 * 60),
            ytdlp_path: PathBuf::from("yt-dlp"),
            fetch_timeout: None,
        }
    }
}

/// Parses `name` if set, warning and returning `None` when the value is invalid.
/// `value` units of `unit_secs` each, capped at `u64::MAX` seconds.
fn scaled_duration(value: u64, unit_secs: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(unit_secs))
}

fn parse_var<T: FromStr>(name: &str, default: impl std::fmt::Display) -> Option<T> {
    let value = env::var(name).ok()?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            eprintln!(
                "Warning: Invalid {} value '{}', using default {}",
                name, value, default
            );
            None
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = env::var("VIDGRAB_HOST") {
            config.host = host;
        }

        if let Some(port) = parse_var::<u16>("VIDGRAB_PORT", config.port) {
            config.port = port;
        } else if let Some(port) = parse_var::<u16>("PORT", config.port) {
            config.port = port;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            config.log_level = log_level;
        } else if let Ok(log_level) = env::var("VIDGRAB_LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Ok(log_format) = env::var("VIDGRAB_LOG_FORMAT") {
            config.log_format = match log_format.to_lowercase().as_str() {
                "text" | "plain" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    eprintln!(
                        "Warning: Invalid VIDGRAB_LOG_FORMAT value '{}', using default JSON",
                        log_format
                    );
                    LogFormat::Json
                }
            };
        }

        if let Ok(cors_origins) = env::var("VIDGRAB_CORS_ORIGINS") {
            config.cors_origins = cors_origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Storage
        if let Ok(dir) = env::var("VIDGRAB_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        } else if let Ok(dir) = env::var("RAILWAY_VOLUME_MOUNT_PATH") {
            config.storage_dir = PathBuf::from(dir);
        }

        if let Some(seconds) =
            parse_var::<u64>("VIDGRAB_MAX_DURATION_SECONDS", config.max_duration_seconds)
        {
            config.max_duration_seconds = seconds;
        }

        if let Some(hours) = parse_var::<u64>(
            "VIDGRAB_MAX_FILE_AGE_HOURS",
            config.max_file_age.as_secs() / 3600,
        ) {
            config.max_file_age = scaled_duration(hours, 3600);
        }

        if let Some(seconds) = parse_var::<u64>(
            "VIDGRAB_SWEEP_INTERVAL_SECONDS",
            config.sweep_interval.as_secs(),
        ) && seconds > 0
        {
            config.sweep_interval = Duration::from_secs(seconds);
        }

        // Rate limiting
        if let Some(requests) = parse_var::<usize>(
            "VIDGRAB_RATE_LIMIT_REQUESTS",
            config.rate_limit.max_requests_per_client,
        ) {
            config.rate_limit.max_requests_per_client = requests;
        }

        if let Some(minutes) = parse_var::<u64>(
            "VIDGRAB_RATE_LIMIT_WINDOW_MINUTES",
            config.rate_limit.window.as_secs() / 60,
        ) {
            config.rate_limit.window = scaled_duration(minutes, 60);
        }

        if let Some(seconds) = parse_var::<u64>(
            "VIDGRAB_RATE_LIMIT_COMPACTION_SECONDS",
            config.rate_limit_compaction_interval.as_secs(),
        ) && seconds > 0
        {
            config.rate_limit_compaction_interval = Duration::from_secs(seconds);
        }

        // Fetcher
        if let Ok(path) = env::var("VIDGRAB_YTDLP_PATH") {
            config.ytdlp_path = PathBuf::from(path);
        }

        if let Some(seconds) = parse_var::<u64>("VIDGRAB_FETCH_TIMEOUT_SECONDS", "none") {
            config.fetch_timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
        }

        config
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn server_url(&self) -> String {
        if self.port == 80 {
            format!("http://{}", self.host)
        } else if self.port == 443 {
            format!("https://{}", self.host)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            storage_dir: self.storage_dir.clone(),
            max_duration_seconds: self.max_duration_seconds,
            format: FormatPreference::default(),
        }
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            storage_dir: self.storage_dir.display().to_string(),
            max_duration_seconds: self.max_duration_seconds,
            max_file_age_hours: self.max_file_age.as_secs() / 3600,
            sweep_interval_seconds: self.sweep_interval.as_secs(),
            max_requests_per_client: self.rate_limit.max_requests_per_client,
            rate_limit_window_minutes: self.rate_limit.window.as_secs() / 60,
            ytdlp_path: self.ytdlp_path.display().to_string(),
            fetch_timeout_seconds: self.fetch_timeout.map(|t| t.as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    const VARS: [&str; 12] = [
        "VIDGRAB_HOST",
        "VIDGRAB_PORT",
        "PORT",
        "VIDGRAB_LOG_FORMAT",
        "VIDGRAB_CORS_ORIGINS",
        "VIDGRAB_STORAGE_DIR",
        "VIDGRAB_MAX_DURATION_SECONDS",
        "VIDGRAB_MAX_FILE_AGE_HOURS",
        "VIDGRAB_RATE_LIMIT_REQUESTS",
        "VIDGRAB_RATE_LIMIT_WINDOW_MINUTES",
        "VIDGRAB_YTDLP_PATH",
        "VIDGRAB_FETCH_TIMEOUT_SECONDS",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert!(matches!(config.log_format, LogFormat::Json));
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.storage_dir, PathBuf::from("/data"));
        assert_eq!(config.max_duration_seconds, 3600);
        assert_eq!(config.max_file_age, Duration::from_secs(86_400));
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));
        assert_eq!(config.rate_limit.max_requests_per_client, 10);
        assert_eq!(config.rate_limit.window, Duration::from_secs(3600));
        assert_eq!(config.fetch_timeout, None);
    }

    #[test]
    fn test_bind_address() {
        let config = Config {
            host: "localhost".to_string(),
            port: 3000,
            ..Default::default()
        };
        assert_eq!(config.bind_address(), "localhost:3000");
    }

    #[test]
    fn test_server_url() {
        let config = Config {
            host: "example.com".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.server_url(), "http://example.com:8080");

        let config_80 = Config {
            host: "example.com".to_string(),
            port: 80,
            ..Default::default()
        };
        assert_eq!(config_80.server_url(), "http://example.com");

        let config_443 = Config {
            host: "example.com".to_string(),
            port: 443,
            ..Default::default()
        };
        assert_eq!(config_443.server_url(), "https://example.com");
    }

    #[test]
    fn test_scaled_duration_saturates() {
        assert_eq!(scaled_duration(2, 3600), Duration::from_secs(7200));
        assert_eq!(scaled_duration(u64::MAX, 3600), Duration::from_secs(u64::MAX));
        assert_eq!(scaled_duration(u64::MAX / 10, 60), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_snapshot() {
        let snapshot = Config::default().snapshot();
        assert_eq!(snapshot.storage_dir, "/data");
        assert_eq!(snapshot.max_file_age_hours, 24);
        assert_eq!(snapshot.rate_limit_window_minutes, 60);
        assert_eq!(snapshot.max_requests_per_client, 10);
    }

    #[test]
    fn test_config_from_env() {
        // Save original values
        let originals: Vec<_> = VARS.iter().map(|name| (*name, env::var(name).ok())).collect();

        unsafe {
            // Set test values
            env::set_var("VIDGRAB_HOST", "test.example.com");
            env::remove_var("VIDGRAB_PORT");
            env::set_var("PORT", "9000");
            env::set_var("VIDGRAB_LOG_FORMAT", "text");
            env::set_var("VIDGRAB_CORS_ORIGINS", "https://example.com, https://test.com");
            env::set_var("VIDGRAB_STORAGE_DIR", "/tmp/vidgrab");
            env::set_var("VIDGRAB_MAX_DURATION_SECONDS", "600");
            env::set_var("VIDGRAB_MAX_FILE_AGE_HOURS", "2");
            env::set_var("VIDGRAB_RATE_LIMIT_REQUESTS", "3");
            env::set_var("VIDGRAB_RATE_LIMIT_WINDOW_MINUTES", "5");
            env::set_var("VIDGRAB_YTDLP_PATH", "/usr/local/bin/yt-dlp");
            env::set_var("VIDGRAB_FETCH_TIMEOUT_SECONDS", "not-a-number");
        }

        let config = Config::from_env();

        assert_eq!(config.host, "test.example.com");
        assert_eq!(config.port, 9000);
        assert!(matches!(config.log_format, LogFormat::Text));
        assert_eq!(
            config.cors_origins,
            vec!["https://example.com", "https://test.com"]
        );
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/vidgrab"));
        assert_eq!(config.max_duration_seconds, 600);
        assert_eq!(config.max_file_age, Duration::from_secs(7200));
        assert_eq!(config.rate_limit.max_requests_per_client, 3);
        assert_eq!(config.rate_limit.window, Duration::from_secs(300));
        assert_eq!(config.ytdlp_path, PathBuf::from("/usr/local/bin/yt-dlp"));
        // invalid values fall back to the default
        assert_eq!(config.fetch_timeout, None);

        unsafe {
            // Restore original values
            for (name, value) in originals {
                match value {
                    Some(val) => env::set_var(name, val),
                    None => env::remove_var(name),
                }
            }
        }
    }
}
