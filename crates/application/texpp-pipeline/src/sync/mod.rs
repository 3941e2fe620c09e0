use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use texpp_core::{CatalogError, VariantCatalog, VariantDescriptor};
use texpp_infra::hub::{Credentials, RepoRef};
use tokio_util::sync::CancellationToken;

pub mod engine;
pub mod remote;
pub mod state;
pub mod storage;

pub use engine::SyncEngine;
pub use remote::HubContentStore;
pub use state::FolderState;
pub use storage::{ContentStore, FetchReport, StoreError};

pub const COMPLETED_MESSAGE: &str = "All operations completed!";
pub const INTERRUPTED_MESSAGE: &str = "Process interrupted by user.";

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub max_threads: usize,
    pub rate_limit_bytes: Option<u64>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_threads: texpp_config::DEFAULT_DOWNLOAD_THREADS,
            rate_limit_bytes: None,
        }
    }
}

/// Access tokens for the two repositories. Either may be absent for public access.
#[derive(Clone, Default)]
pub struct AccessTokens {
    pub content: Option<String>,
    pub logs: Option<String>,
}

impl std::fmt::Debug for AccessTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokens")
            .field("content", &self.content.as_ref().map(|_| "<redacted>"))
            .field("logs", &self.logs.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Endpoints and repositories a [`SyncEngine`] talks to.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub primary_endpoint: String,
    pub mirror_endpoint: String,
    pub content_repo: RepoRef,
    pub log_repo: RepoRef,
    pub log_remote_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_endpoint: texpp_config::PRIMARY_ENDPOINT.to_string(),
            mirror_endpoint: texpp_config::MIRROR_ENDPOINT.to_string(),
            content_repo: RepoRef::dataset(texpp_config::CONTENT_REPO_ID),
            log_repo: RepoRef::dataset(texpp_config::LOG_REPO_ID),
            log_remote_dir: texpp_config::LOG_REMOTE_DIR.to_string(),
        }
    }
}

impl EngineConfig {
    /// Every endpoint points at `endpoint`; used against local test hubs.
    pub fn single_endpoint(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            primary_endpoint: endpoint.clone(),
            mirror_endpoint: endpoint,
            ..Self::default()
        }
    }

    pub fn endpoint(&self, use_mirror: bool) -> &str {
        if use_mirror {
            &self.mirror_endpoint
        } else {
            &self.primary_endpoint
        }
    }

    pub fn credentials(&self, use_mirror: bool, token: Option<String>) -> Credentials {
        Credentials::new(self.endpoint(use_mirror), token)
    }
}

/// Parameters of one sync. Built right before the run and not reused.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub mods_root: Utf8PathBuf,
    pub variant: VariantDescriptor,
    pub use_mirror: bool,
    /// Last measured bandwidth; `None` when the probe has not finished or failed.
    pub bandwidth_mbps: Option<f64>,
    pub tokens: AccessTokens,
    pub cancel: CancellationToken,
}

impl SyncRequest {
    /// Resolves `variant` against `catalog`, rejecting unknown names and
    /// empty custom selections before anything touches the disk or network.
    pub fn from_catalog(
        catalog: &VariantCatalog,
        variant: &str,
        mods_root: impl Into<Utf8PathBuf>,
        use_mirror: bool,
    ) -> Result<Self, SyncError> {
        let variant = catalog.resolve(variant)?;
        Ok(Self {
            mods_root: mods_root.into(),
            variant,
            use_mirror,
            bandwidth_mbps: None,
            tokens: AccessTokens::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_bandwidth(mut self, mbps: Option<f64>) -> Self {
        self.bandwidth_mbps = mbps;
        self
    }

    pub fn with_tokens(mut self, tokens: AccessTokens) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Messages from the sync worker to whoever presents progress.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Status(String),
    FolderStarted {
        index: usize,
        total: usize,
        folder: String,
    },
    FolderFinished {
        folder: String,
        fetched: usize,
        skipped: usize,
    },
    Swept {
        removed: usize,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub folders_fetched: usize,
    pub files_fetched: usize,
    pub files_skipped: usize,
    pub bytes_fetched: u64,
    pub files_removed: usize,
    pub fetch_log: Vec<String>,
    pub diagnostics_uploaded: bool,
}

/// Internal taxonomy. Only these abort a sync; everything else degrades.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Error: {0}")]
    InvalidSelection(String),
    #[error("An error occurred while downloading '{folder}': {message}")]
    StorageFetch { folder: String, message: String },
    #[error("An error occurred: {0}")]
    Filesystem(String),
    #[error("{}", INTERRUPTED_MESSAGE)]
    Cancelled,
}

impl From<CatalogError> for SyncError {
    fn from(e: CatalogError) -> Self {
        SyncError::InvalidSelection(format!("{e}."))
    }
}

/// What the caller gets back from [`SyncEngine::run`].
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Succeeded { message: String, report: SyncReport },
    Failed { message: String },
    /// Stop was requested; no success or failure report should be shown.
    Interrupted,
}

impl SyncOutcome {
    /// The `(success, message)` pair for display, or `None` when interrupted.
    pub fn as_result(&self) -> Option<(bool, String)> {
        match self {
            SyncOutcome::Succeeded { message, .. } => Some((true, message.clone())),
            SyncOutcome::Failed { message } => Some((false, message.clone())),
            SyncOutcome::Interrupted => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Succeeded { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, SyncOutcome::Interrupted)
    }

    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Succeeded { report, .. } => Some(report),
            _ => None,
        }
    }
}

impl From<Result<SyncReport, SyncError>> for SyncOutcome {
    fn from(result: Result<SyncReport, SyncError>) -> Self {
        match result {
            Ok(report) => SyncOutcome::Succeeded {
                message: COMPLETED_MESSAGE.to_string(),
                report,
            },
            Err(SyncError::Cancelled) => SyncOutcome::Interrupted,
            Err(e) => SyncOutcome::Failed {
                message: e.to_string(),
            },
        }
    }
}

/// Convenience constructor for the default engine.
pub fn default_engine(client: reqwest::Client) -> SyncEngine {
    SyncEngine::new(client, SyncOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_variant_is_invalid_selection() {
        let err = SyncRequest::from_catalog(&VariantCatalog::builtin(), "Ultra", "/tmp/x", false)
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidSelection(_)));
        assert_eq!(err.to_string(), "Error: Unknown variant 'Ultra'.");
    }

    #[test]
    fn empty_custom_selection_is_rejected() {
        let err = SyncRequest::from_catalog(&VariantCatalog::builtin(), "Custom", "/tmp/x", false)
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidSelection(_)));
    }

    #[test]
    fn interrupted_has_no_result_pair() {
        let outcome = SyncOutcome::from(Err(SyncError::Cancelled));
        assert!(outcome.is_interrupted());
        assert_eq!(outcome.as_result(), None);

        let ok = SyncOutcome::from(Ok(SyncReport::default()));
        assert_eq!(ok.as_result(), Some((true, COMPLETED_MESSAGE.to_string())));
    }

    #[test]
    fn mirror_flag_selects_endpoint() {
        let config = EngineConfig::default();
        assert_eq!(config.credentials(true, None).endpoint, texpp_config::MIRROR_ENDPOINT);
        assert_eq!(config.credentials(false, None).endpoint, texpp_config::PRIMARY_ENDPOINT);
    }
}
