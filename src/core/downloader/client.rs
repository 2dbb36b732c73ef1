use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::config::InstallOptions;
use crate::core::error::{InstallError, InstallResult};
use crate::core::http::build_http_client;
use crate::core::verify::{digests_match, expected_digest, ContentHasher, HashAlgorithm};

const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// A single file to download with optional digest and size for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEntry {
    pub url: String,
    pub dest: PathBuf,
    pub hash: Option<String>,
    pub size: Option<u64>,
}

/// Streaming, verifying downloader with bounded retries.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    /// Maximum number of parallel downloads.
    concurrency: usize,
    max_retries: usize,
    retry_base_delay: Duration,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            concurrency: 8,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(250),
        }
    }

    pub fn from_options(options: &InstallOptions) -> InstallResult<Self> {
        Ok(Self::new(build_http_client()?)
            .with_concurrency(options.concurrency)
            .with_retries(options.max_retries, options.retry_base_delay()))
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_retries(mut self, max_retries: usize, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    // ── Single file download ────────────────────────────

    /// Download `url` to `dest`. The body is streamed into a sibling temp
    /// file while being hashed, and only renamed into place once size and
    /// digest match.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        expected_hash: Option<&str>,
        expected_size: Option<u64>,
    ) -> InstallResult<()> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| InstallError::io(parent, e))?;

        let temp = temp_sibling(dest);
        let result = self
            .stream_to(url, &temp, expected_hash, expected_size)
            .await;
        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&temp, dest).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(InstallError::io(dest, e));
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }

    async fn stream_to(
        &self,
        url: &str,
        temp: &Path,
        expected_hash: Option<&str>,
        expected_size: Option<u64>,
    ) -> InstallResult<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(InstallError::NetworkFailure {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        let expected_hash = expected_digest(expected_hash);
        let mut hasher = expected_hash.map(|h| ContentHasher::new(HashAlgorithm::for_digest(h)));
        let mut written: u64 = 0;

        // Scoped so the handle is closed before the rename.
        {
            let mut file = tokio::fs::File::create(temp)
                .await
                .map_err(|e| InstallError::io(temp, e))?;
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                if let Some(hasher) = hasher.as_mut() {
                    hasher.update(&chunk);
                }
                written += chunk.len() as u64;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| InstallError::io(temp, e))?;
            }
            file.flush().await.map_err(|e| InstallError::io(temp, e))?;
        }

        if let Some(expected) = expected_size {
            if written != expected {
                return Err(InstallError::VerificationFailure {
                    path: temp.to_path_buf(),
                    reason: format!(
                        "size mismatch for {}: expected {} bytes, got {}",
                        url, expected, written
                    ),
                });
            }
        }
        if let (Some(expected), Some(hasher)) = (expected_hash, hasher) {
            let actual = hasher.finalize_hex();
            if !digests_match(expected, &actual) {
                return Err(InstallError::VerificationFailure {
                    path: temp.to_path_buf(),
                    reason: format!(
                        "hash mismatch for {}: expected {}, got {}",
                        url, expected, actual
                    ),
                });
            }
        }
        Ok(())
    }

    /// [`download_file`](Self::download_file) with exponential backoff on
    /// transport and verification failures. Retries stop once `cancel` fires.
    pub async fn download_with_retry(
        &self,
        entry: &DownloadEntry,
        cancel: &CancellationToken,
    ) -> InstallResult<()> {
        let base = self.retry_base_delay.as_millis().min(u64::MAX as u128) as u64;
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(base.max(1))
            .max_delay(MAX_BACKOFF)
            .map(jitter)
            .take(self.max_retries);

        let this = self;
        RetryIf::start(
            strategy,
            move || async move {
                this.download_file(
                    &entry.url,
                    &entry.dest,
                    entry.hash.as_deref(),
                    entry.size,
                )
                .await
            },
            |e: &InstallError| {
                let retry = e.is_retryable() && !cancel.is_cancelled();
                if retry {
                    warn!("Retrying {}: {}", entry.url, e);
                }
                retry
            },
        )
        .await
    }

    // ── Small documents ─────────────────────────────────

    pub async fn fetch_bytes(&self, url: &str) -> InstallResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(InstallError::NetworkFailure {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

fn temp_sibling(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    let temp_name = format!(".{}.{}.part", name, uuid::Uuid::new_v4());
    match dest.parent() {
        Some(parent) => parent.join(temp_name),
        None => PathBuf::from(temp_name),
    }
}

/// Write `bytes` to `path` through a sibling temp file and a rename, so the
/// final path never holds a partial file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> InstallResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| InstallError::io(parent, e))?;
    }
    let temp = temp_sibling(path);
    if let Err(e) = tokio::fs::write(&temp, bytes).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(InstallError::io(&temp, e));
    }
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(InstallError::io(path, e));
    }
    Ok(())
}
