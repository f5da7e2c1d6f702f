//! Network access for the catalog and installer.
//!
//! All remote I/O goes through the [`Transport`] trait so the lifecycle
//! engine can be driven by an in-memory implementation in tests.
//! [`HttpTransport`] is the production implementation.
//!
//! ## Features
//!
//! - Streaming downloads with progress callbacks
//! - Automatic retry with exponential backoff (3 attempts)
//! - Separate timeouts for the index fetch and artifact downloads

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::errors::{Result, ZvmError};

/// Progress event emitted during downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Download has started.
    Started {
        /// The URL being downloaded.
        url: String,
        /// Total size in bytes, if the server sent `Content-Length`.
        total: Option<u64>,
    },
    /// Download progress update.
    Progress {
        /// Bytes downloaded so far.
        downloaded: u64,
        /// Current download speed in bytes per second.
        speed: u64,
    },
    /// A failed attempt is about to be retried.
    Retrying {
        /// The attempt about to start, counting from 1.
        attempt: u32,
        /// Maximum number of attempts.
        max: u32,
    },
    /// Download completed successfully.
    Completed,
    /// Download failed with an error.
    Failed {
        /// Error description.
        error: String,
    },
}

impl ProgressEvent {
    /// Returns the completed percentage, if the total size is known.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
    pub fn percent(downloaded: u64, total: Option<u64>) -> Option<u8> {
        match total {
            Some(total) if total > 0 => {
                Some((downloaded as f64 / total as f64 * 100.0).min(100.0) as u8)
            }
            _ => None,
        }
    }
}

/// Callback type for receiving progress updates during downloads.
///
/// The callback is invoked on each progress event. It is wrapped in `Arc`
/// to allow sharing across async boundaries.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Remote access used by the catalog and installer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches a small text document, such as the release index.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the request fails or the status is not success.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Streams `url` into `dest`, truncating it first, and returns the
    /// number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `Network` if every attempt fails, or `FileSystem` if `dest`
    /// cannot be written.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<u64>;
}

/// Maximum number of download retry attempts.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Index fetch timeout in seconds.
const INDEX_TIMEOUT_SECS: u64 = 30;

/// Minimum interval between progress callback invocations in milliseconds.
const PROGRESS_CALLBACK_INTERVAL_MS: u128 = 100;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("zvm/", env!("CARGO_PKG_VERSION"));

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    index_client: reqwest::Client,
    download_client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport whose downloads time out after `download_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the HTTP client cannot be constructed.
    pub fn new(download_timeout: Duration) -> Result<Self> {
        Ok(Self {
            index_client: build_client(Duration::from_secs(INDEX_TIMEOUT_SECS))?,
            download_client: build_client(download_timeout)?,
        })
    }

    async fn download_once(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<u64> {
        let response = self
            .download_client
            .get(url)
            .send()
            .await
            .map_err(|e| ZvmError::network_with_source(format!("failed to connect to {url}"), e))?;

        if !response.status().is_success() {
            return Err(ZvmError::network(format!("HTTP error {}: {url}", response.status())));
        }

        let total = response.content_length();
        if let Some(callback) = progress {
            callback(ProgressEvent::Started {
                url: url.to_string(),
                total,
            });
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ZvmError::io(format!("failed to create file: {}", dest.display()), e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let start_time = Instant::now();
        let mut last_callback_time = Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                ZvmError::network_with_source(format!("failed to read chunk from {url}"), e)
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ZvmError::io(format!("failed to write to {}", dest.display()), e))?;
            downloaded += chunk.len() as u64;

            let now = Instant::now();
            if let Some(callback) = progress
                && now.duration_since(last_callback_time).as_millis() >= PROGRESS_CALLBACK_INTERVAL_MS
            {
                callback(ProgressEvent::Progress {
                    downloaded,
                    speed: bytes_per_second(downloaded, start_time),
                });
                last_callback_time = now;
            }
        }

        file.flush()
            .await
            .map_err(|e| ZvmError::io(format!("failed to flush {}", dest.display()), e))?;

        if let Some(callback) = progress {
            callback(ProgressEvent::Progress {
                downloaded,
                speed: bytes_per_second(downloaded, start_time),
            });
        }

        Ok(downloaded)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!(url, "fetching text");
        let response = self
            .index_client
            .get(url)
            .send()
            .await
            .map_err(|e| ZvmError::network_with_source(format!("failed to fetch {url}"), e))?;

        if !response.status().is_success() {
            return Err(ZvmError::network(format!("HTTP error {}: {url}", response.status())));
        }

        response
            .text()
            .await
            .map_err(|e| ZvmError::network_with_source(format!("failed to read body of {url}"), e))
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<u64> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = calculate_retry_delay(attempt);
                if let Some(callback) = &progress {
                    callback(ProgressEvent::Retrying {
                        attempt: attempt + 1,
                        max: MAX_RETRIES,
                    });
                }
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.download_once(url, dest, progress.as_ref()).await {
                Ok(bytes) => {
                    if let Some(callback) = &progress {
                        callback(ProgressEvent::Completed);
                    }
                    return Ok(bytes);
                }
                // Local write failures will not improve on retry.
                Err(e @ ZvmError::FileSystem { .. }) => {
                    last_error = Some(e);
                    break;
                }
                Err(e) => {
                    warn!(url, attempt = attempt + 1, error = %e, "download attempt failed");
                    last_error = Some(e);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| {
            ZvmError::network(format!("download failed after {MAX_RETRIES} attempts"))
        });
        if let Some(callback) = &progress {
            callback(ProgressEvent::Failed {
                error: error.to_string(),
            });
        }
        Err(error)
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ZvmError::network_with_source("failed to create HTTP client", e))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn bytes_per_second(downloaded: u64, start: Instant) -> u64 {
    let elapsed_secs = start.elapsed().as_secs_f64();
    if elapsed_secs > 0.0 {
        (downloaded as f64 / elapsed_secs) as u64
    } else {
        0
    }
}

/// Calculates the retry delay with exponential backoff and jitter.
///
/// The delay doubles with each attempt (1s, 2s, 4s) with +/- 25% jitter.
fn calculate_retry_delay(attempt: u32) -> u64 {
    let base_delay = BASE_RETRY_DELAY_MS * 2u64.pow(attempt);
    let jitter_range = base_delay / 4;
    let jitter = rand::rng().random_range(0..=jitter_range * 2);
    base_delay - jitter_range + jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_increases_exponentially() {
        let delay_0 = calculate_retry_delay(0);
        let delay_1 = calculate_retry_delay(1);
        let delay_2 = calculate_retry_delay(2);

        assert!((750..=1250).contains(&delay_0), "attempt 0 should be ~1000ms");
        assert!((1500..=2500).contains(&delay_1), "attempt 1 should be ~2000ms");
        assert!((3000..=5000).contains(&delay_2), "attempt 2 should be ~4000ms");
    }

    #[test]
    fn percent_requires_known_total() {
        assert_eq!(ProgressEvent::percent(50, Some(200)), Some(25));
        assert_eq!(ProgressEvent::percent(50, None), None);
        assert_eq!(ProgressEvent::percent(50, Some(0)), None);
    }

    #[test]
    fn percent_is_capped() {
        assert_eq!(ProgressEvent::percent(300, Some(200)), Some(100));
    }

    #[test]
    fn user_agent_names_the_tool() {
        assert!(USER_AGENT.starts_with("zvm/"));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
        let err = transport
            .fetch_text("http://127.0.0.1:9/index.json")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Network);
    }
}
