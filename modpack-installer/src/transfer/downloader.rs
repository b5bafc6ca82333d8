//! HTTP file fetcher with retry, size check and atomic placement.
//!
//! Bytes stream into `<dest>.part`; the destination is only replaced by a
//! rename once the body is complete and its length matches the declared
//! `Content-Length`. A failed attempt removes the partial file.

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TransferConfig;
use crate::transfer::progress_stream::{ByteCallback, ProgressStream};
use crate::transfer::retry::{AttemptOutcome, RetryError, RetryPolicy};
use crate::utils::{InstallerError, Result};

/// Build the HTTP client shared by document fetches and file downloads
pub fn build_client(config: &TransferConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .read_timeout(Duration::from_secs(config.read_timeout_secs))
        .build()?;
    Ok(client)
}

/// Manifest URLs sometimes carry raw spaces or Windows separators
pub fn normalize_url(url: &str) -> String {
    url.trim().replace(' ', "%20").replace('\\', "/")
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    pub bytes: u64,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl Downloader {
    pub fn new(config: &TransferConfig) -> Result<Self> {
        Ok(Self::from_client(build_client(config)?, config.retry_policy()))
    }

    pub fn from_client(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch `url` into `dest`, creating parent directories as needed.
    ///
    /// Every failure kind (connect error, timeout, non-2xx status, truncated
    /// body, local write error) is retried under the policy. Exhaustion
    /// yields [`InstallerError::Transfer`]; the destination is left untouched.
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_bytes: Option<ByteCallback>,
    ) -> Result<FetchReport> {
        let url = normalize_url(url);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part = part_path(dest);
        let url_ref = url.as_str();
        let part_ref = part.as_path();

        let result = self
            .policy
            .run(cancel, |attempt| {
                let on_bytes = on_bytes.clone();
                async move {
                    match self.attempt_once(url_ref, dest, part_ref, on_bytes).await {
                        Ok(bytes) => AttemptOutcome::Done(FetchReport {
                            bytes,
                            attempts: attempt,
                        }),
                        Err(reason) => {
                            discard_partial(part_ref).await;
                            AttemptOutcome::Retry(reason)
                        }
                    }
                }
            })
            .await;

        match result {
            Ok(report) => {
                info!(
                    "Fetched {} ({} bytes, attempt {})",
                    dest.display(),
                    report.bytes,
                    report.attempts
                );
                Ok(report)
            }
            Err(RetryError::Cancelled) => {
                discard_partial(&part).await;
                Err(InstallerError::Cancelled)
            }
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => Err(InstallerError::Transfer {
                url,
                attempts,
                reason: last_error,
            }),
        }
    }

    async fn attempt_once(
        &self,
        url: &str,
        dest: &Path,
        part: &Path,
        on_bytes: Option<ByteCallback>,
    ) -> std::result::Result<u64, String> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        let expected = response.content_length().filter(|len| *len > 0);
        let callback = on_bytes.unwrap_or_else(|| Arc::new(|_| {}));
        let mut stream = ProgressStream::new(Box::pin(response.bytes_stream()), callback);

        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| format!("cannot create {}: {}", part.display(), e))?;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("body read failed: {}", e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("write failed: {}", e))?;
        }
        file.flush()
            .await
            .map_err(|e| format!("flush failed: {}", e))?;
        drop(file);

        let written = stream.bytes_transferred();
        if let Some(expected) = expected {
            if written != expected {
                return Err(format!(
                    "size mismatch: received {} bytes, expected {}",
                    written, expected
                ));
            }
        }

        tokio::fs::rename(part, dest)
            .await
            .map_err(|e| format!("cannot replace {}: {}", dest.display(), e))?;

        Ok(written)
    }
}

async fn discard_partial(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => debug!("Removed partial file {}", part.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial file {}: {}", part.display(), e),
    }
}
