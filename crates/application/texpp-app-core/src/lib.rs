pub mod app;
mod async_runtime;
pub mod domain;
pub mod events;
pub mod orchestrator;
pub mod persistence;
pub mod ports;
pub mod probe;

pub use app::{InstallerApp, InstallerState};
pub use domain::Settings;
pub use events::{AppEvent, RunId};
pub use orchestrator::InstallOrchestrator;
pub use persistence::FilePersistence;
pub use ports::*;
pub use probe::HubSpeedProbe;
