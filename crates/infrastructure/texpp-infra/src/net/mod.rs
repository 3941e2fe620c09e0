use camino::Utf8PathBuf;
use futures::stream::{self, StreamExt};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Shared client with the user agent and connect timeout every request uses.
pub fn default_http_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("texpp/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(15))
        .build()
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub id: u64,
    pub url: String,
    pub target_path: Utf8PathBuf,
    /// Zero when the size is not known up front.
    pub expected_size: u64,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub id: u64,
    pub success: bool,
    pub bytes_downloaded: u64,
    pub error: Option<String>,
}

#[derive(Debug)]
pub enum DownloadEvent {
    Started { id: u64, total_bytes: u64 },
    Progress { id: u64, bytes_delta: u64 },
    Completed { id: u64, success: bool },
}

pub struct Downloader {
    client: Client,
    concurrency: usize,
    rate_limit_bytes: Option<u64>,
    attempts: u32,
}

impl Downloader {
    pub fn new(client: Client, concurrency: usize, rate_limit_bytes: Option<u64>) -> Self {
        Self {
            client,
            concurrency: texpp_config::clamp_threads(concurrency),
            rate_limit_bytes,
            attempts: texpp_config::DOWNLOAD_ATTEMPTS,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Generic batch download. Each file is written to `<target>.part` and
    /// renamed into place only once complete, so a crash never leaves a
    /// truncated file under its final name.
    pub async fn download_batch(
        &self,
        items: Vec<DownloadRequest>,
        progress_tx: Option<Sender<DownloadEvent>>,
    ) -> Vec<DownloadResult> {
        let limiter = self.rate_limit_bytes.and_then(|bps| {
            NonZeroU32::new(bps.min(u32::MAX as u64) as u32)
                .map(|nz| Arc::new(RateLimiter::direct(Quota::per_second(nz))))
        });
        let attempts = self.attempts;
        stream::iter(items)
            .map(|item| {
                let client = self.client.clone();
                let tx = progress_tx.clone();
                let lim = limiter.clone();

                async move { Self::download_single(client, item, tx, lim, attempts).await }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    async fn download_single(
        client: Client,
        req: DownloadRequest,
        tx: Option<Sender<DownloadEvent>>,
        lim: Option<Arc<Limiter>>,
        attempts: u32,
    ) -> DownloadResult {
        if let Some(ref t) = tx {
            let _ = t
                .send(DownloadEvent::Started {
                    id: req.id,
                    total_bytes: req.expected_size,
                })
                .await;
        }

        let tmp_path = req.target_path.with_extension(match req.target_path.extension() {
            Some(ext) => format!("{ext}.part"),
            None => "part".to_string(),
        });

        if let Some(parent) = req.target_path.parent() {
            let _ = tokio::fs::create_dir_all(parent.as_std_path()).await;
        }

        let mut last_error = None;
        let mut written = 0;

        for attempt in 0..attempts {
            match Self::attempt(&client, &req, &tmp_path, tx.as_ref(), lim.as_deref()).await {
                Ok(bytes) => match robust_rename(&tmp_path, &req.target_path).await {
                    Ok(()) => {
                        written = bytes;
                        last_error = None;
                        break;
                    }
                    Err(e) => last_error = Some(format!("rename into place failed: {e}")),
                },
                Err(e) => {
                    debug!("attempt {} for {} failed: {}", attempt + 1, req.url, e);
                    last_error = Some(e);
                }
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        let success = last_error.is_none();
        if !success {
            warn!(
                "Giving up on {}: {}",
                req.url,
                last_error.as_deref().unwrap_or("unknown error")
            );
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }

        if let Some(ref t) = tx {
            let _ = t
                .send(DownloadEvent::Completed {
                    id: req.id,
                    success,
                })
                .await;
        }

        DownloadResult {
            id: req.id,
            success,
            bytes_downloaded: written,
            error: last_error,
        }
    }

    async fn attempt(
        client: &Client,
        req: &DownloadRequest,
        tmp_path: &Utf8PathBuf,
        tx: Option<&Sender<DownloadEvent>>,
        lim: Option<&Limiter>,
    ) -> Result<u64, String> {
        let mut builder = client.get(&req.url);
        if let Some(token) = &req.bearer_token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let resp = builder.send().await.map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }

        let mut file = File::create(tmp_path.as_std_path())
            .await
            .map_err(|e| format!("create {tmp_path}: {e}"))?;
        let mut stream = resp.bytes_stream();
        let mut total_written = 0u64;
        let mut accumulated = 0u64;
        let mut last_emit = Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("stream: {e}"))?;
            if let Some(l) = lim {
                if let Some(nz) = NonZeroU32::new(chunk.len() as u32) {
                    l.until_n_ready(nz).await.ok();
                }
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("write {tmp_path}: {e}"))?;

            let len = chunk.len() as u64;
            total_written += len;
            accumulated += len;
            if accumulated > 1_000_000 || last_emit.elapsed().as_millis() > 100 {
                emit_progress(tx, req.id, accumulated).await;
                accumulated = 0;
                last_emit = Instant::now();
            }
        }
        if accumulated > 0 {
            emit_progress(tx, req.id, accumulated).await;
        }

        file.flush().await.map_err(|e| format!("flush: {e}"))?;
        drop(file);

        if req.expected_size > 0 && total_written != req.expected_size {
            return Err(format!(
                "size mismatch: expected {} bytes, got {total_written}",
                req.expected_size
            ));
        }
        Ok(total_written)
    }
}

async fn emit_progress(tx: Option<&Sender<DownloadEvent>>, id: u64, bytes_delta: u64) {
    if let Some(t) = tx {
        let _ = t.send(DownloadEvent::Progress { id, bytes_delta }).await;
    }
}

/// Rename with backoff; antivirus and indexers briefly lock fresh files on Windows.
pub async fn robust_rename<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> std::io::Result<()> {
    let mut attempt = 0u32;
    let max_attempts = 8u32;
    let mut backoff = Duration::from_millis(50);

    loop {
        match tokio::fs::rename(&from, &to).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(e);
                }
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, Duration::from_millis(2000));
            }
        }
    }
}
