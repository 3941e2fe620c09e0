use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use crate::hub::{Credentials, HubClient, RepoRef};
use crate::net::{DownloadRequest, Downloader};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Test timed out after {0} seconds. Connection may be too slow.")]
    Timeout(u64),
    #[error("Speed test download failed: {0}")]
    Download(String),
    #[error("Speed test cache error: {0}")]
    Io(#[from] std::io::Error),
}

/// Megabits per second for `bytes` transferred in `elapsed`; zero when either is zero.
pub fn calculate_speed_mbps(elapsed: Duration, bytes: u64) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 && bytes > 0 {
        (bytes as f64 * 8.0) / secs / 1_000_000.0
    } else {
        0.0
    }
}

/// Times the download of a fixed reference object.
pub struct BandwidthProbe {
    client: Client,
    reference: RepoRef,
    filename: String,
    timeout: Duration,
    cache_dir: Utf8PathBuf,
}

impl BandwidthProbe {
    pub fn new(client: Client, cache_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            client,
            reference: RepoRef::model(texpp_config::SPEED_TEST_REPO_ID),
            filename: texpp_config::SPEED_TEST_FILENAME.to_string(),
            timeout: texpp_config::SPEED_TEST_TIMEOUT,
            cache_dir: cache_dir.into(),
        }
    }

    pub fn with_reference(mut self, reference: RepoRef, filename: impl Into<String>) -> Self {
        self.reference = reference;
        self.filename = filename.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache_dir(&self) -> &Utf8Path {
        &self.cache_dir
    }

    /// Downloads the reference object once and reports Mbps.
    ///
    /// The scratch cache is removed before and after, whatever the outcome.
    pub async fn measure(&self, creds: &Credentials) -> Result<f64, ProbeError> {
        self.cleanup().await;
        tokio::fs::create_dir_all(self.cache_dir.as_std_path()).await?;

        let url = HubClient::resolve_url(creds, &self.reference, &self.filename);
        let request = DownloadRequest {
            id: 0,
            url,
            target_path: self.cache_dir.join(&self.filename),
            expected_size: 0,
            bearer_token: None,
        };
        let downloader = Downloader::new(self.client.clone(), 1, None).with_attempts(1);

        let started = Instant::now();
        let outcome =
            tokio::time::timeout(self.timeout, downloader.download_batch(vec![request], None))
                .await;
        let elapsed = started.elapsed();
        self.cleanup().await;

        let results = outcome.map_err(|_| ProbeError::Timeout(self.timeout.as_secs()))?;
        let result = results
            .into_iter()
            .next()
            .ok_or_else(|| ProbeError::Download("no result".into()))?;
        if !result.success {
            return Err(ProbeError::Download(
                result.error.unwrap_or_else(|| "unknown error".into()),
            ));
        }

        let mbps = calculate_speed_mbps(elapsed, result.bytes_downloaded);
        info!(
            "Measured {:.2} Mbps ({} bytes in {:.2}s)",
            mbps,
            result.bytes_downloaded,
            elapsed.as_secs_f64()
        );
        Ok(mbps)
    }

    async fn cleanup(&self) {
        if self.cache_dir.as_std_path().is_dir() {
            if let Err(e) = tokio::fs::remove_dir_all(self.cache_dir.as_std_path()).await {
                debug!("could not remove {}: {}", self.cache_dir, e);
            }
        }
    }
}

/// HEAD `url` and report whether it answered 200.
pub async fn check_connection(client: &Client, url: &str, timeout: Duration) -> bool {
    match client.head(url).timeout(timeout).send().await {
        Ok(resp) => resp.status() == StatusCode::OK,
        Err(e) => {
            debug!("connection check {url} failed: {e}");
            false
        }
    }
}

/// Recommend the mirror only when the primary is down and the mirror is up.
pub async fn recommend_mirror(
    client: &Client,
    primary: &str,
    mirror: &str,
    timeout: Duration,
) -> bool {
    if check_connection(client, primary, timeout).await {
        return false;
    }
    check_connection(client, mirror, timeout).await
}
