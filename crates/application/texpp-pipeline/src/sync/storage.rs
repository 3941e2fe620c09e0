use camino::Utf8Path;
use texpp_infra::hub::{Credentials, RepoRef};

/// Result of mirroring one remote folder.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub files_total: usize,
    pub files_fetched: usize,
    pub files_skipped: usize,
    pub bytes_fetched: u64,
    /// Human-readable transfer log, kept for the diagnostic record.
    pub log: Vec<String>,
}

/// A failed fetch or upload. Carries whatever log lines were produced before
/// the failure so they still reach diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
    pub log: Vec<String>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            log: Vec::new(),
        }
    }

    pub fn with_log(mut self, log: Vec<String>) -> Self {
        self.log = log;
        self
    }
}

/// Remote object storage as seen by the sync engine.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Mirrors every object under `folder` into `dest_root`, keeping remote
    /// relative paths. Re-running against an unchanged remote must converge.
    async fn fetch(
        &self,
        repo: &RepoRef,
        folder: &str,
        dest_root: &Utf8Path,
        creds: &Credentials,
    ) -> Result<FetchReport, StoreError>;

    async fn upload(
        &self,
        local: &Utf8Path,
        repo: &RepoRef,
        remote_path: &str,
        creds: &Credentials,
    ) -> Result<(), StoreError>;
}
