use std::sync::Arc;

use anyhow::Context;
use camino::Utf8PathBuf;
use texpp_core::{DownloadEstimate, InstallLayout, SpeedEstimator, VariantCatalog};
use texpp_pipeline::{AccessTokens, SyncEngine, SyncEvent, SyncOutcome, SyncRequest};
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::Settings;
use crate::events::{AppEvent, RunId};
use crate::orchestrator::InstallOrchestrator;
use crate::ports::{SettingsRepo, SpeedProbePort};

#[derive(Debug, Default)]
pub struct InstallerState {
    pub settings: Settings,
    /// `None` until the probe reports; 0 when it failed.
    pub bandwidth_mbps: Option<f64>,
    pub probe_error: Option<String>,
    pub run_id: Option<RunId>,
    pub running: bool,
    pub status: String,
    pub status_log: Vec<String>,
    /// (folders done, folders total) of the current run.
    pub folders: Option<(usize, usize)>,
    pub install_path: Option<Utf8PathBuf>,
    pub outcome: Option<SyncOutcome>,
}

/// Presentation-agnostic installer: settings, estimates and background runs.
pub struct InstallerApp {
    pub state: InstallerState,
    settings_repo: Arc<dyn SettingsRepo>,
    catalog: VariantCatalog,
    estimator: SpeedEstimator,
    orchestrator: InstallOrchestrator,
    msg_rx: mpsc::Receiver<AppEvent>,
}

impl InstallerApp {
    pub fn new(engine: Arc<SyncEngine>, settings_repo: Arc<dyn SettingsRepo>) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(256);
        Self {
            state: InstallerState::default(),
            settings_repo,
            catalog: VariantCatalog::builtin(),
            estimator: SpeedEstimator::default(),
            orchestrator: InstallOrchestrator::new(engine, msg_tx),
            msg_rx,
        }
    }

    pub fn load_settings(&mut self) -> anyhow::Result<()> {
        let settings = self.settings_repo.load().context("Failed to load settings")?;
        self.state.settings = settings.normalized(&self.catalog);
        Ok(())
    }

    pub fn save_settings(&self) -> anyhow::Result<()> {
        self.settings_repo
            .save(&self.state.settings)
            .context("Failed to save settings")
    }

    pub fn catalog(&self) -> &VariantCatalog {
        &self.catalog
    }

    pub fn set_custom_folders<I, S>(&mut self, folders: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.catalog.set_custom_folders(folders);
    }

    /// Where the selected variant lands, when a mods folder is set.
    pub fn layout(&self) -> Option<InstallLayout> {
        let settings = &self.state.settings;
        if !settings.has_mods_folder() {
            return None;
        }
        let variant = self.catalog.resolve(&settings.variant).ok()?;
        Some(InstallLayout::new(
            camino::Utf8Path::new(settings.mods_folder.trim()),
            &variant,
        ))
    }

    pub fn estimate(&self) -> DownloadEstimate {
        let Some(variant) = self
            .catalog
            .variants()
            .iter()
            .find(|v| v.name == self.state.settings.variant)
        else {
            return DownloadEstimate::Unavailable;
        };
        let exists = self.layout().is_some_and(|l| l.has_existing_install());
        self.estimator
            .estimate(variant, exists, self.state.bandwidth_mbps)
    }

    pub fn start_speed_probe(&mut self, probe: Arc<dyn SpeedProbePort>) -> anyhow::Result<()> {
        self.state.bandwidth_mbps = None;
        self.state.probe_error = None;
        self.orchestrator
            .start_speed_probe(probe, self.state.settings.use_mirror)
    }

    /// Validates the selection, saves the current settings, then starts a
    /// sync of the selected variant.
    pub fn start_install(&mut self, tokens: AccessTokens) -> anyhow::Result<RunId> {
        if self.state.running {
            anyhow::bail!("An installation is already running");
        }
        let settings = self.state.settings.clone();
        if !settings.has_mods_folder() {
            anyhow::bail!("Please select a mods folder first.");
        }
        let req = SyncRequest::from_catalog(
            &self.catalog,
            &settings.variant,
            settings.mods_folder.trim(),
            settings.use_mirror,
        )?
        .with_bandwidth(self.state.bandwidth_mbps)
        .with_tokens(tokens);
        self.save_settings()?;

        let run_id = self.orchestrator.start_install(req)?;
        self.state.run_id = Some(run_id);
        self.state.running = true;
        self.state.outcome = None;
        self.state.status_log.clear();
        self.state.folders = None;
        Ok(run_id)
    }

    pub fn cancel(&mut self) {
        self.orchestrator.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Drains pending events without blocking. Returns how many were applied.
    pub fn handle_events(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.msg_rx.try_recv() {
            self.apply(event);
            count += 1;
        }
        count
    }

    /// Waits for the next event, applies it and hands it back.
    pub async fn next_event(&mut self) -> Option<AppEvent> {
        let event = self.msg_rx.recv().await?;
        self.apply(event.clone());
        Some(event)
    }

    pub fn apply(&mut self, event: AppEvent) {
        if let Some(id) = event.run_id() {
            if self.state.run_id != Some(id) {
                debug!("dropping event from stale run {id}");
                return;
            }
        }

        match event {
            AppEvent::Started { install_path, .. } => {
                self.state.install_path = Some(install_path);
            }
            AppEvent::Sync { event, .. } => match event {
                SyncEvent::Status(text) => {
                    self.state.status = text.clone();
                    self.state.status_log.push(text);
                }
                SyncEvent::FolderStarted { index, total, .. } => {
                    self.state.folders = Some((index, total));
                }
                SyncEvent::FolderFinished { .. } => {
                    if let Some((done, total)) = self.state.folders {
                        self.state.folders = Some((done + 1, total));
                    }
                }
                SyncEvent::Swept { .. } => {}
            },
            AppEvent::Finished { outcome, .. } => {
                self.state.running = false;
                self.state.status = match &outcome {
                    SyncOutcome::Interrupted => texpp_pipeline::sync::INTERRUPTED_MESSAGE.into(),
                    SyncOutcome::Succeeded { message, .. } | SyncOutcome::Failed { message } => {
                        message.clone()
                    }
                };
                self.state.outcome = Some(outcome);
            }
            AppEvent::SpeedMeasured { mbps, error } => {
                self.state.bandwidth_mbps = Some(mbps);
                self.state.probe_error = error;
            }
        }
    }
}
