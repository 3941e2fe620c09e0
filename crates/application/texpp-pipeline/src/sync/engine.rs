use std::sync::Arc;

use camino::Utf8PathBuf;
use texpp_core::path_utils::RemotePath;
use texpp_core::InstallLayout;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, warn};

use crate::diagnostics::{DiagnosticsContext, DiagnosticsReporter, HostProbe, LiveHostProbe};
use crate::sweep::ReconciliationSweeper;
use crate::sync::remote::HubContentStore;
use crate::sync::storage::ContentStore;
use crate::sync::{
    EngineConfig, SyncError, SyncEvent, SyncOptions, SyncOutcome, SyncReport, SyncRequest,
};

/// Fetches a variant's folders one after another, sweeps unreferenced
/// textures, then files a diagnostic record.
pub struct SyncEngine {
    store: Arc<dyn ContentStore>,
    reporter: DiagnosticsReporter,
    config: EngineConfig,
}

struct StatusSink<'a>(Option<&'a Sender<SyncEvent>>);

impl StatusSink<'_> {
    async fn event(&self, event: SyncEvent) {
        if let Some(tx) = self.0 {
            let _ = tx.send(event).await;
        }
    }

    async fn status(&self, text: impl Into<String>) {
        let text = text.into();
        info!("{text}");
        self.event(SyncEvent::Status(text)).await;
    }
}

impl SyncEngine {
    pub fn new(client: reqwest::Client, options: SyncOptions) -> Self {
        let store: Arc<dyn ContentStore> = Arc::new(HubContentStore::new(client.clone(), options));
        let host: Arc<dyn HostProbe> = Arc::new(LiveHostProbe::new(client));
        Self::with_components(store, host, EngineConfig::default())
    }

    pub fn with_components(
        store: Arc<dyn ContentStore>,
        host: Arc<dyn HostProbe>,
        config: EngineConfig,
    ) -> Self {
        let reporter = DiagnosticsReporter::new(
            store.clone(),
            host,
            config.log_repo.clone(),
            config.log_remote_dir.clone(),
        );
        Self {
            store,
            reporter,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one sync to completion, failure or interruption.
    pub async fn run(&self, req: &SyncRequest, events: Option<Sender<SyncEvent>>) -> SyncOutcome {
        let sink = StatusSink(events.as_ref());
        let result = self.execute(req, &sink).await;
        match &result {
            Ok(_) => {}
            Err(SyncError::Cancelled) => warn!("Sync of '{}' interrupted", req.variant.name),
            Err(e) => {
                error!("Sync of '{}' failed: {e}", req.variant.name);
                sink.status(e.to_string()).await;
            }
        }
        SyncOutcome::from(result)
    }

    fn validate(req: &SyncRequest) -> Result<(), SyncError> {
        let variant = &req.variant;
        if variant.folders.is_empty() {
            return Err(SyncError::InvalidSelection(format!(
                "Variant '{}' has no folders selected.",
                variant.name
            )));
        }
        if let Some(bad) = variant.folders.iter().find(|f| !RemotePath::verify_safe(f)) {
            return Err(SyncError::InvalidSelection(format!(
                "Folder name '{bad}' is not a valid remote folder."
            )));
        }
        Ok(())
    }

    fn check_cancel(req: &SyncRequest) -> Result<(), SyncError> {
        if req.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn execute(
        &self,
        req: &SyncRequest,
        sink: &StatusSink<'_>,
    ) -> Result<SyncReport, SyncError> {
        Self::validate(req)?;

        let layout = InstallLayout::new(&req.mods_root, &req.variant);
        let install_root: Utf8PathBuf = layout.install_root();
        tokio::fs::create_dir_all(install_root.as_std_path())
            .await
            .map_err(|e| {
                SyncError::Filesystem(format!("cannot create install folder {install_root}: {e}"))
            })?;

        let content_creds = self
            .config
            .credentials(req.use_mirror, req.tokens.content.clone());
        let mut report = SyncReport::default();
        let total = req.variant.folders.len();

        for (index, folder) in req.variant.folders.iter().enumerate() {
            Self::check_cancel(req)?;
            sink.event(SyncEvent::FolderStarted {
                index,
                total,
                folder: folder.clone(),
            })
            .await;
            sink.status(format!("Downloading '{folder}'...")).await;

            match self
                .store
                .fetch(&self.config.content_repo, folder, &install_root, &content_creds)
                .await
            {
                Ok(fetched) => {
                    report.folders_fetched += 1;
                    report.files_fetched += fetched.files_fetched;
                    report.files_skipped += fetched.files_skipped;
                    report.bytes_fetched += fetched.bytes_fetched;
                    report.fetch_log.extend(fetched.log);
                    sink.event(SyncEvent::FolderFinished {
                        folder: folder.clone(),
                        fetched: fetched.files_fetched,
                        skipped: fetched.files_skipped,
                    })
                    .await;
                }
                Err(e) => {
                    for line in &e.log {
                        debug!("{line}");
                    }
                    return Err(SyncError::StorageFetch {
                        folder: folder.clone(),
                        message: e.message,
                    });
                }
            }
        }

        sink.status("Download and Verification Complete. Cleaning Up...").await;
        Self::check_cancel(req)?;

        let scopes = layout.sweep_scopes();
        let swept =
            tokio::task::spawn_blocking(move || ReconciliationSweeper::sweep_all(scopes.as_slice()))
                .await
                .map_err(|e| SyncError::Filesystem(format!("cleanup task failed: {e}")))?;
        report.files_removed = swept.removed;
        sink.event(SyncEvent::Swept {
            removed: swept.removed,
        })
        .await;
        sink.status("Cleaned unused files.").await;

        Self::check_cancel(req)?;

        sink.status("Uploading diagnostic log...").await;
        let log_creds = self
            .config
            .credentials(req.use_mirror, req.tokens.logs.clone());
        let diagnostics = self
            .reporter
            .report(&DiagnosticsContext {
                install_root: &install_root,
                variant: &req.variant.name,
                bandwidth_mbps: req.bandwidth_mbps,
                fetch_log: &report.fetch_log,
                creds: &log_creds,
            })
            .await;
        report.diagnostics_uploaded = diagnostics.uploaded();

        Ok(report)
    }
}
