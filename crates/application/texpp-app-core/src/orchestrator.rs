use std::sync::Arc;

use anyhow::Context;
use texpp_core::InstallLayout;
use texpp_pipeline::{SyncEngine, SyncOutcome, SyncRequest};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{AppEvent, RunId};
use crate::ports::SpeedProbePort;

/// Runs syncs and bandwidth probes on their own threads and reports back
/// over a channel. The caller thread never blocks on either.
pub struct InstallOrchestrator {
    engine: Arc<SyncEngine>,
    tx: mpsc::Sender<AppEvent>,
    cancel: Option<CancellationToken>,
}

impl InstallOrchestrator {
    pub fn new(engine: Arc<SyncEngine>, tx: mpsc::Sender<AppEvent>) -> Self {
        Self {
            engine,
            tx,
            cancel: None,
        }
    }

    /// Requests a cooperative stop of the running sync, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }

    pub fn start_install(&mut self, mut req: SyncRequest) -> anyhow::Result<RunId> {
        self.cancel();
        let token = CancellationToken::new();
        req.cancel = token.clone();
        self.cancel = Some(token.clone());

        let run_id = RunId::new_v4();
        let tx = self.tx.clone();
        let engine = self.engine.clone();

        std::thread::Builder::new()
            .name("texpp-sync".into())
            .spawn(move || {
                let rt = match crate::async_runtime::runtime() {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = tx.blocking_send(AppEvent::Finished {
                            run_id,
                            outcome: SyncOutcome::Failed {
                                message: format!("Failed to start async runtime: {e}"),
                            },
                        });
                        return;
                    }
                };

                rt.block_on(async move {
                    let install_path =
                        InstallLayout::new(&req.mods_root, &req.variant).display_path();
                    let _ = tx
                        .send(AppEvent::Started {
                            run_id,
                            variant: req.variant.name.clone(),
                            install_path,
                        })
                        .await;

                    let (sync_tx, mut sync_rx) = mpsc::channel(64);
                    let forward_tx = tx.clone();
                    let forward = tokio::spawn(async move {
                        while let Some(event) = sync_rx.recv().await {
                            let _ = forward_tx.send(AppEvent::Sync { run_id, event }).await;
                        }
                    });

                    let outcome = engine.run(&req, Some(sync_tx)).await;
                    let _ = forward.await;

                    // A stop observed after the engine returned still wins.
                    let outcome = if token.is_cancelled() {
                        SyncOutcome::Interrupted
                    } else {
                        outcome
                    };
                    debug!("run {run_id} finished: {outcome:?}");
                    let _ = tx.send(AppEvent::Finished { run_id, outcome }).await;
                });
            })
            .context("Failed to spawn sync worker")?;

        Ok(run_id)
    }

    /// Measures bandwidth on a separate thread; the result arrives as
    /// [`AppEvent::SpeedMeasured`].
    pub fn start_speed_probe(
        &self,
        probe: Arc<dyn SpeedProbePort>,
        use_mirror: bool,
    ) -> anyhow::Result<()> {
        let tx = self.tx.clone();
        std::thread::Builder::new()
            .name("texpp-speedtest".into())
            .spawn(move || {
                let event = match probe.measure(use_mirror) {
                    Ok(mbps) => AppEvent::SpeedMeasured { mbps, error: None },
                    Err(e) => {
                        warn!("Speed test failed: {e:#}");
                        AppEvent::SpeedMeasured {
                            mbps: 0.0,
                            error: Some(format!("{e:#}")),
                        }
                    }
                };
                let _ = tx.blocking_send(event);
            })
            .context("Failed to spawn speed test worker")?;
        Ok(())
    }
}
