//! The external media-fetching collaborator.
//!
//! [`MediaFetcher`] is the seam the orchestrator talks to. [`YtDlp`] drives a
//! `yt-dlp` executable as a child process; tests substitute their own fetcher.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

const MAX_DETAIL_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Fetcher exited with {status}: {detail}")]
    Failed { status: String, detail: String },
    #[error("Failed to parse fetcher output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Fetcher did not report an output file")]
    MissingOutput,
    #[error("Fetcher did not finish within {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Whether the failure lies with the fetcher itself rather than the
    /// requested media: it could not be started or produced unreadable output.
    pub fn is_fetcher_fault(&self) -> bool {
        matches!(
            self,
            FetchError::Spawn { .. } | FetchError::Parse(_) | FetchError::MissingOutput
        )
    }
}

/// Metadata obtained without downloading the media payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub title: String,
    pub uploader: Option<String>,
    pub duration_seconds: Option<u64>,
}

/// Outcome of a full fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedMedia {
    pub resolved_path: PathBuf,
}

/// Preferred container chain handed to the collaborator.
///
/// Expands to "best video + best audio in the preferred containers, else best
/// single file in the video container, else anything".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPreference {
    pub video_container: String,
    pub audio_container: String,
}

impl Default for FormatPreference {
    fn default() -> Self {
        Self {
            video_container: "mp4".to_string(),
            audio_container: "m4a".to_string(),
        }
    }
}

impl FormatPreference {
    pub fn selector(&self) -> String {
        format!(
            "bestvideo[ext={video}]+bestaudio[ext={audio}]/best[ext={video}]/best",
            video = self.video_container,
            audio = self.audio_container
        )
    }
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Resolves metadata for `url` without downloading it.
    async fn probe(&self, url: &str) -> Result<ProbeResult, FetchError>;

    /// Downloads `url` using `output_template` (a path whose extension is
    /// chosen by the fetcher) and reports where the file ended up.
    async fn fetch(
        &self,
        url: &str,
        output_template: &Path,
        format: &FormatPreference,
    ) -> Result<FetchedMedia, FetchError>;
}

/// [`MediaFetcher`] backed by the `yt-dlp` command line tool.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<Vec<u8>, FetchError> {
        let output = cmd.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output)
                .await
                .map_err(|_| FetchError::Timeout(limit))?,
            None => output.await,
        }
        .map_err(|source| FetchError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        if !output.status.success() {
            return Err(FetchError::Failed {
                status: output.status.to_string(),
                detail: summarize_stderr(&output.stderr),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl MediaFetcher for YtDlp {
    async fn probe(&self, url: &str) -> Result<ProbeResult, FetchError> {
        let mut cmd = self.command();
        cmd.arg("--skip-download").arg("--dump-single-json").arg("--").arg(url);

        debug!("Probing {} with {}", url, self.program.display());
        let stdout = self.run(cmd).await?;
        parse_probe(&stdout)
    }

    async fn fetch(
        &self,
        url: &str,
        output_template: &Path,
        format: &FormatPreference,
    ) -> Result<FetchedMedia, FetchError> {
        let mut cmd = self.command();
        cmd.arg("--format")
            .arg(format.selector())
            .arg("--output")
            .arg(output_template)
            .arg("--no-simulate")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("--")
            .arg(url);

        debug!(
            "Fetching {} into {} with {}",
            url,
            output_template.display(),
            self.program.display()
        );
        let stdout = self.run(cmd).await?;
        parse_fetched_path(&stdout).map(|resolved_path| FetchedMedia { resolved_path })
    }
}

#[derive(Debug, Deserialize)]
struct RawProbe {
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
}

fn parse_probe(stdout: &[u8]) -> Result<ProbeResult, FetchError> {
    let raw: RawProbe = serde_json::from_slice(stdout)?;
    Ok(ProbeResult {
        title: raw.title.unwrap_or_default(),
        uploader: raw.uploader,
        duration_seconds: raw
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.ceil() as u64),
    })
}

/// The last non-empty line printed is the final path after merging.
fn parse_fetched_path(stdout: &[u8]) -> Result<PathBuf, FetchError> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(PathBuf::from)
        .ok_or(FetchError::MissingOutput)
}

fn summarize_stderr(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let line = text
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .unwrap_or("no error output");
    line.chars().take(MAX_DETAIL_LEN).collect()
}
