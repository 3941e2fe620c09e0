//! Per-sync diagnostic record: assembled, written next to the install,
//! uploaded when possible. Nothing here can fail a sync.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use texpp_infra::hub::{Credentials, RepoRef};
use tracing::{debug, info, warn};

use crate::sync::ContentStore;

pub const NETWORK_UNAVAILABLE: &str = "Unavailable";

/// Host and network facts, each allowed to fail on its own.
#[async_trait::async_trait]
pub trait HostProbe: Send + Sync {
    /// UTC time as `YYYY-MM-DDTHH:MM:SS`; implementations fall back to the local clock.
    async fn utc_timestamp(&self) -> String;
    async fn network_info(&self) -> Option<Value>;
    async fn hardware_snapshot(&self) -> Result<Value, String>;
}

pub struct LiveHostProbe {
    client: reqwest::Client,
    network_info_url: String,
    utc_time_url: String,
}

impl LiveHostProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            network_info_url: texpp_config::NETWORK_INFO_URL.to_string(),
            utc_time_url: texpp_config::UTC_TIME_URL.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl HostProbe for LiveHostProbe {
    async fn utc_timestamp(&self) -> String {
        texpp_infra::utc_timestamp(&self.client, &self.utc_time_url).await
    }

    async fn network_info(&self) -> Option<Value> {
        texpp_infra::network_info(&self.client, &self.network_info_url).await
    }

    async fn hardware_snapshot(&self) -> Result<Value, String> {
        texpp_infra::hardware_snapshot().await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub timestamp_utc: String,
    /// Geolocation mapping, or the string `"Unavailable"`.
    pub ip: Value,
    pub network_speed_mbps: Option<f64>,
    pub variant_selected: String,
    pub hardware_info: Value,
    pub fetch_log: Vec<String>,
}

impl DiagnosticRecord {
    /// `{timestamp without colons}_{variant}.json`
    pub fn file_name(&self) -> String {
        let variant = self.variant_selected.replace(['/', '\\'], "_");
        format!("{}_{}.json", self.timestamp_utc.replace(':', ""), variant)
    }
}

pub struct DiagnosticsContext<'a> {
    pub install_root: &'a Utf8Path,
    pub variant: &'a str,
    pub bandwidth_mbps: Option<f64>,
    pub fetch_log: &'a [String],
    pub creds: &'a Credentials,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticsOutcome {
    /// Uploaded; the local copy was removed (or removal was attempted).
    Uploaded { remote_path: String },
    /// Written locally but the upload failed.
    KeptLocal { path: Utf8PathBuf, reason: String },
    NotWritten { reason: String },
}

impl DiagnosticsOutcome {
    pub fn uploaded(&self) -> bool {
        matches!(self, DiagnosticsOutcome::Uploaded { .. })
    }
}

pub struct DiagnosticsReporter {
    store: Arc<dyn ContentStore>,
    host: Arc<dyn HostProbe>,
    log_repo: RepoRef,
    remote_dir: String,
}

impl DiagnosticsReporter {
    pub fn new(
        store: Arc<dyn ContentStore>,
        host: Arc<dyn HostProbe>,
        log_repo: RepoRef,
        remote_dir: impl Into<String>,
    ) -> Self {
        Self {
            store,
            host,
            log_repo,
            remote_dir: remote_dir.into(),
        }
    }

    pub async fn assemble(&self, ctx: &DiagnosticsContext<'_>) -> DiagnosticRecord {
        let timestamp_utc = self.host.utc_timestamp().await;
        let ip = self
            .host
            .network_info()
            .await
            .unwrap_or_else(|| Value::String(NETWORK_UNAVAILABLE.to_string()));
        let hardware_info = match self.host.hardware_snapshot().await {
            Ok(v) => v,
            Err(e) => {
                warn!("Hardware snapshot failed: {e}");
                json!({ "error": format!("Could not retrieve hardware info: {e}") })
            }
        };

        DiagnosticRecord {
            timestamp_utc,
            ip,
            network_speed_mbps: ctx.bandwidth_mbps,
            variant_selected: ctx.variant.to_string(),
            hardware_info,
            fetch_log: ctx.fetch_log.to_vec(),
        }
    }

    /// Assembles, writes and uploads the record. Every failure is absorbed.
    pub async fn report(&self, ctx: &DiagnosticsContext<'_>) -> DiagnosticsOutcome {
        let record = self.assemble(ctx).await;
        let file_name = record.file_name();
        let local = ctx.install_root.join(&file_name);

        let bytes = match serde_json::to_vec_pretty(&record) {
            Ok(b) => b,
            Err(e) => {
                warn!("Could not serialize diagnostic record: {e}");
                return DiagnosticsOutcome::NotWritten {
                    reason: e.to_string(),
                };
            }
        };
        if let Err(e) = tokio::fs::write(local.as_std_path(), bytes).await {
            warn!("Could not write diagnostic log {local}: {e}");
            return DiagnosticsOutcome::NotWritten {
                reason: e.to_string(),
            };
        }

        let remote_path = format!("{}/{}", self.remote_dir.trim_end_matches('/'), file_name);
        match self
            .store
            .upload(&local, &self.log_repo, &remote_path, ctx.creds)
            .await
        {
            Ok(()) => {
                info!("Uploaded diagnostic log to {remote_path}");
                if let Err(e) = tokio::fs::remove_file(local.as_std_path()).await {
                    debug!("Could not remove local log {local}: {e}");
                }
                DiagnosticsOutcome::Uploaded { remote_path }
            }
            Err(e) => {
                warn!("Failed to upload diagnostic log, kept at {local}: {e}");
                DiagnosticsOutcome::KeptLocal {
                    path: local,
                    reason: e.to_string(),
                }
            }
        }
    }
}
