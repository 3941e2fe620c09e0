use camino::Utf8PathBuf;
use texpp_pipeline::{SyncEvent, SyncOutcome};
use uuid::Uuid;

pub type RunId = Uuid;

/// Everything background workers report back to the presentation thread.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Started {
        run_id: RunId,
        variant: String,
        install_path: Utf8PathBuf,
    },
    Sync {
        run_id: RunId,
        event: SyncEvent,
    },
    Finished {
        run_id: RunId,
        outcome: SyncOutcome,
    },
    /// Probe finished. `mbps` is 0 when the measurement failed.
    SpeedMeasured {
        mbps: f64,
        error: Option<String>,
    },
}

impl AppEvent {
    pub fn run_id(&self) -> Option<RunId> {
        match self {
            AppEvent::Started { run_id, .. }
            | AppEvent::Sync { run_id, .. }
            | AppEvent::Finished { run_id, .. } => Some(*run_id),
            AppEvent::SpeedMeasured { .. } => None,
        }
    }
}
