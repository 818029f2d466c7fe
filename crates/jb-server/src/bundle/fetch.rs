//! Origin downloads.
//!
//! Every file of a bundle is requested at once and all results are awaited
//! before deciding, so one error response lists every failing URL.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::future::join_all;

use super::{DownloadedFile, ValidatedFileSet};
use jb_common::config::FetchConfig;

/// Why a single file could not be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Origin answered with a non-success status.
    Status(u16),
    /// No complete answer within the per-file timeout.
    Timeout,
    /// Connection, TLS or body read error.
    Transport(String),
    /// Body exceeded the configured size limit.
    TooLarge { limit: u64 },
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Timeout => f.write_str("timed out"),
            Self::Transport(msg) => write!(f, "request failed: {}", msg),
            Self::TooLarge { limit } => write!(f, "larger than {} bytes", limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub url: String,
    pub reason: FetchFailure,
}

/// One or more files of a bundle failed to download.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Failed to download {} file(s): {}", .failures.len(), describe(.failures))]
pub struct FetchError {
    /// Every failure, in request order.
    pub failures: Vec<FailedFile>,
}

fn describe(failures: &[FailedFile]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.url, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Somewhere file bytes can be downloaded from.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchFailure>;
}

/// `FileSource` backed by a shared reqwest client.
pub struct HttpFileSource {
    client: reqwest::Client,
    max_file_bytes: u64,
}

impl HttpFileSource {
    pub fn new(config: &FetchConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            max_file_bytes: config.max_file_bytes,
        })
    }
}

fn transport_failure(err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Transport(err.without_url().to_string())
    }
}

#[async_trait]
impl FileSource for HttpFileSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchFailure> {
        let mut resp = self.client.get(url).send().await.map_err(transport_failure)?;

        if !resp.status().is_success() {
            return Err(FetchFailure::Status(resp.status().as_u16()));
        }

        let limit = self.max_file_bytes;
        if resp.content_length().is_some_and(|len| len > limit) {
            return Err(FetchFailure::TooLarge { limit });
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = resp.chunk().await.map_err(transport_failure)? {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(FetchFailure::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(url, bytes = body.len(), "Fetched file");
        Ok(body.freeze())
    }
}

/// Download every file concurrently. Succeeds only if all downloads do;
/// results keep request order.
pub async fn fetch_all(
    source: &dyn FileSource,
    files: &ValidatedFileSet,
) -> Result<Vec<DownloadedFile>, FetchError> {
    let results = join_all(
        files
            .iter()
            .map(|file| async move { (file, source.fetch(&file.url).await) }),
    )
    .await;

    let mut downloaded = Vec::with_capacity(results.len());
    let mut failures = Vec::new();

    for (file, result) in results {
        match result {
            Ok(bytes) => downloaded.push(DownloadedFile {
                filename: file.filename.clone(),
                bytes,
            }),
            Err(reason) => {
                tracing::warn!(url = %file.url, %reason, "Origin fetch failed");
                failures.push(FailedFile {
                    url: file.url.clone(),
                    reason,
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(downloaded)
    } else {
        Err(FetchError { failures })
    }
}
