//! Download manager
//!
//! Fetches a file over HTTP into a destination path. Redirects are followed
//! by hand so a 3xx without a Location header can be told apart from other
//! failures. Whatever goes wrong, no partial file is left behind.

mod checksum;
mod error;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Response, header::LOCATION, redirect::Policy};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

pub use checksum::{digests_match, sha256_file};
pub use error::DownloadError;

use crate::config::DownloadConfig;
use crate::retry::with_retry;

/// Progress callback: `(percent, bytes_so_far, total_bytes)`
pub type DownloadProgress = Arc<dyn Fn(u8, u64, u64) + Send + Sync>;

/// Per-download options
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// Hex SHA-256 the finished file must hash to (checked by `fetch_with_retry`)
    pub expected_sha256: Option<String>,
    /// Invoked while the body streams, only when the total size is known
    pub on_progress: Option<DownloadProgress>,
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("expected_sha256", &self.expected_sha256)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl FetchOptions {
    #[must_use]
    pub fn with_checksum(mut self, sha256: impl Into<String>) -> Self {
        self.expected_sha256 = Some(sha256.into());
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: DownloadProgress) -> Self {
        self.on_progress = Some(on_progress);
        self
    }
}

/// Result of a completed download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Bytes written
    pub size: u64,
}

/// Retrying, checksum-verifying file fetcher
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    /// Fetch `url` into `destination` once
    ///
    /// The whole attempt, redirects included, is bounded by the configured
    /// timeout.
    #[instrument(skip(self, options), fields(destination = %destination.display()))]
    pub async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> Result<FetchOutcome, DownloadError> {
        let deadline = Duration::from_secs(self.config.timeout_secs);

        match tokio::time::timeout(deadline, self.fetch_following(url, destination, options)).await
        {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                remove_partial(destination).await;
                Err(e)
            },
            Err(_) => {
                remove_partial(destination).await;
                Err(DownloadError::Timeout(self.config.timeout_secs))
            },
        }
    }

    /// Fetch with linear-backoff retries and optional checksum verification
    ///
    /// A checksum mismatch deletes the file and consumes an attempt.
    #[instrument(skip(self, options), fields(destination = %destination.display()))]
    pub async fn fetch_with_retry(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> Result<FetchOutcome, DownloadError> {
        let retry = self.config.retry_config();

        let result = with_retry(&retry, |attempt| async move {
            debug!(attempt, url = %url, "Downloading");
            let outcome = self.fetch(url, destination, options).await?;
            if let Some(expected) = &options.expected_sha256 {
                verify_checksum(destination, expected).await?;
            }
            Ok::<_, DownloadError>(outcome)
        })
        .await;

        match &result.result {
            Ok(outcome) => info!(
                size = outcome.size,
                attempts = result.attempts,
                "Download complete"
            ),
            Err(e) => warn!(error = %e, attempts = result.attempts, "Download failed"),
        }
        result.into_result()
    }

    async fn fetch_following(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> Result<FetchOutcome, DownloadError> {
        let mut current = reqwest::Url::parse(url)
            .map_err(|e| DownloadError::Transport(format!("invalid URL {url}: {e}")))?;

        for _ in 0..=self.config.max_redirects {
            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or(DownloadError::Redirect {
                        status: status.as_u16(),
                    })?;
                current = current
                    .join(location)
                    .map_err(|e| DownloadError::Transport(format!("bad redirect target: {e}")))?;
                debug!(status = status.as_u16(), location = %current, "Following redirect");
                continue;
            }

            if !status.is_success() {
                return Err(DownloadError::Http {
                    status: status.as_u16(),
                });
            }

            return write_body(response, destination, options).await;
        }

        Err(DownloadError::TooManyRedirects(self.config.max_redirects))
    }
}

#[allow(clippy::cast_possible_truncation)]
async fn write_body(
    response: Response,
    destination: &Path,
    options: &FetchOptions,
) -> Result<FetchOutcome, DownloadError> {
    let total = response.content_length().filter(|t| *t > 0);

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(destination).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;

        if let (Some(total), Some(on_progress)) = (total, &options.on_progress) {
            let percent = (u128::from(written.min(total)) * 100 / u128::from(total)) as u8;
            on_progress(percent, written, total);
        }
    }

    file.flush().await?;

    if let Some(total) = total.filter(|total| written < *total) {
        return Err(DownloadError::Transport(format!(
            "body ended after {written} of {total} bytes"
        )));
    }

    Ok(FetchOutcome { size: written })
}

async fn verify_checksum(path: &Path, expected: &str) -> Result<(), DownloadError> {
    let actual = match sha256_file(path).await {
        Ok(actual) => actual,
        Err(e) => {
            remove_partial(path).await;
            return Err(e.into());
        },
    };

    if digests_match(expected, &actual) {
        return Ok(());
    }

    warn!(expected = %expected, actual = %actual, "Checksum mismatch, discarding file");
    remove_partial(path).await;
    Err(DownloadError::ChecksumMismatch {
        expected: expected.to_string(),
        actual,
    })
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial download"),
    }
}
