//! Artifact downloads with retry, resume and cancellation.
//!
//! Bytes are always written into a private staging directory, never into
//! the final install location. A failed fetch removes its staging directory
//! before returning, so callers never see orphaned partial files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cask_schema::{PackageName, Version};
use futures::StreamExt;
use reqwest::{Client, StatusCode, header};
use tempfile::TempDir;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::Reporter;
use crate::config::FetchConfig;
use crate::io::retry::{ErrorKind, RetryDecision, RetryPolicy, classify_http_status};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("not found (HTTP 404): {url}")]
    NotFound { url: String },

    #[error("forbidden (HTTP 403): {url}")]
    Forbidden { url: String },

    #[error("HTTP {status}: {url}")]
    Status { status: u16, url: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("download cancelled")]
    Cancelled,

    #[error("too many redirects (limit {limit}): {url}")]
    RedirectLoop { limit: usize, url: String },

    #[error("connection failed: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("transfer interrupted after {received} bytes")]
    Interrupted { received: u64 },

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Retry classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Connection(_) | Self::Interrupted { .. } => ErrorKind::Connection,
            Self::Status { status, .. } => classify_http_status(*status),
            _ => ErrorKind::Other,
        }
    }

    fn from_status(status: StatusCode, url: &Url) -> Self {
        let url = url.to_string();
        match status {
            StatusCode::NOT_FOUND => Self::NotFound { url },
            StatusCode::FORBIDDEN => Self::Forbidden { url },
            other => Self::Status {
                status: other.as_u16(),
                url,
            },
        }
    }
}

/// A fetched artifact sitting in its own staging directory.
///
/// Dropping the value deletes the directory and everything in it.
#[derive(Debug)]
pub struct StagedArtifact {
    dir: TempDir,
    path: PathBuf,
    size: u64,
}

impl StagedArtifact {
    /// Stage in-memory bytes under `staging_root` as `file_name`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the staging directory or file cannot be written.
    pub fn from_bytes(
        staging_root: &Path,
        file_name: &str,
        bytes: &[u8],
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(staging_root)?;
        let dir = tempfile::Builder::new()
            .prefix("cask-")
            .tempdir_in(staging_root)?;
        let path = dir.path().join(staging_file_name(Some(file_name)));
        std::fs::write(&path, bytes)?;
        Ok(Self {
            dir,
            path,
            size: bytes.len() as u64,
        })
    }

    /// Path of the staged file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes staged.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Directory owning the staged file.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the staged bytes now rather than on drop.
    pub fn discard(self) {
        discard_staging(self.dir);
    }
}

/// Parameters for one download.
pub struct FetchRequest<'a> {
    pub url: &'a Url,
    pub name: &'a PackageName,
    pub version: &'a Version,
    pub reporter: &'a dyn Reporter,
    pub cancel: &'a CancellationToken,
}

/// HTTP downloader shared by concurrent installs.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
    staging_root: PathBuf,
    max_redirects: usize,
}

impl Fetcher {
    /// Build a fetcher with a bounded redirect policy and per-attempt timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be constructed.
    pub fn new(
        config: &FetchConfig,
        staging_root: impl Into<PathBuf>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            policy: config.retry_policy(),
            staging_root: staging_root.into(),
            max_redirects: config.max_redirects,
        })
    }

    /// Backoff policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Directory under which staging directories are created.
    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Download `req.url` into a fresh staging directory.
    ///
    /// Transient failures (timeouts, connection errors, interrupted bodies,
    /// 5xx) are retried with exponential backoff; a partially written file is
    /// resumed with a `Range` request. Cancellation is honoured at every await
    /// point, including the backoff sleep.
    ///
    /// # Errors
    ///
    /// Returns the last [`FetchError`] once retries are exhausted, any
    /// non-retryable error immediately, or [`FetchError::Cancelled`].
    pub async fn fetch(&self, req: FetchRequest<'_>) -> Result<StagedArtifact, FetchError> {
        match req.url.scheme() {
            "http" | "https" => {}
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        }
        if req.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        tokio::fs::create_dir_all(&self.staging_root).await?;
        let dir = tempfile::Builder::new()
            .prefix("cask-")
            .tempdir_in(&self.staging_root)?;
        let dest = dir
            .path()
            .join(staging_file_name(crate::filename_from_url(req.url)));

        let mut attempt = 1u32;
        loop {
            let outcome = tokio::select! {
                biased;
                () = req.cancel.cancelled() => Err(FetchError::Cancelled),
                result = self.attempt(&req, &dest) => result,
            };

            let err = match outcome {
                Ok(size) => {
                    tracing::debug!(url = %req.url, size, attempt, "download complete");
                    return Ok(StagedArtifact {
                        dir,
                        path: dest,
                        size,
                    });
                }
                Err(e) => e,
            };

            let decision = if matches!(err, FetchError::Cancelled) {
                RetryDecision::NoRetry
            } else {
                self.policy.decide(attempt, err.kind())
            };

            match decision {
                RetryDecision::NoRetry => {
                    tracing::debug!(url = %req.url, attempt, error = %err, "download failed");
                    discard_staging(dir);
                    return Err(err);
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        url = %req.url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "download attempt failed, retrying"
                    );
                    req.reporter
                        .retrying(req.name, attempt, delay, &err.to_string());

                    tokio::select! {
                        biased;
                        () = req.cancel.cancelled() => {
                            discard_staging(dir);
                            return Err(FetchError::Cancelled);
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// One HTTP attempt, resuming from whatever an earlier attempt left in `dest`.
    async fn attempt(&self, req: &FetchRequest<'_>, dest: &Path) -> Result<u64, FetchError> {
        let existing = tokio::fs::metadata(dest).await.map_or(0, |m| m.len());

        let mut request = self.client.get(req.url.clone());
        if existing > 0 {
            request = request.header(header::RANGE, format!("bytes={existing}-"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.classify(e, req.url))?;
        let status = response.status();

        if status == StatusCode::RANGE_NOT_SATISFIABLE && existing > 0 {
            // partial bytes no longer line up with the remote file
            tokio::fs::remove_file(dest).await?;
            return Err(FetchError::Interrupted { received: existing });
        }
        if !status.is_success() {
            return Err(FetchError::from_status(status, req.url));
        }

        let resumed = existing > 0 && status == StatusCode::PARTIAL_CONTENT;
        let mut file = if resumed {
            tracing::debug!(url = %req.url, offset = existing, "resuming download");
            OpenOptions::new().append(true).open(dest).await?
        } else {
            File::create(dest).await?
        };

        let mut received = if resumed { existing } else { 0 };
        let total = response.content_length().map(|len| len + received);
        req.reporter
            .downloading(req.name, req.version, received, total);

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    file.flush().await?;
                    return Err(if e.is_timeout() {
                        FetchError::Timeout {
                            url: req.url.to_string(),
                        }
                    } else {
                        FetchError::Interrupted { received }
                    });
                }
            };
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            req.reporter
                .downloading(req.name, req.version, received, total);
        }
        file.flush().await?;

        if total.is_some_and(|t| received < t) {
            return Err(FetchError::Interrupted { received });
        }
        Ok(received)
    }

    fn classify(&self, e: reqwest::Error, url: &Url) -> FetchError {
        if e.is_redirect() {
            FetchError::RedirectLoop {
                limit: self.max_redirects,
                url: url.to_string(),
            }
        } else if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = e.status() {
            FetchError::from_status(status, url)
        } else if e.is_builder() {
            FetchError::Client(e)
        } else {
            FetchError::Connection(e)
        }
    }
}

fn staging_file_name(candidate: Option<&str>) -> &str {
    match candidate {
        Some(name) if !name.is_empty() && name != "." && name != ".." && !name.contains('/') => {
            name
        }
        _ => "download",
    }
}

fn discard_staging(dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(e) = dir.close() {
        tracing::warn!("failed to remove staging dir {}: {e}", path.display());
    }
}
