pub mod diagnostics;
pub mod sweep;
pub mod sync;

pub use diagnostics::{
    DiagnosticRecord, DiagnosticsContext, DiagnosticsOutcome, DiagnosticsReporter, HostProbe,
    LiveHostProbe,
};
pub use sweep::{ReconciliationSweeper, SweepReport};
pub use sync::{
    default_engine, AccessTokens, ContentStore, EngineConfig, FetchReport, HubContentStore,
    StoreError, SyncEngine, SyncError, SyncEvent, SyncOptions, SyncOutcome, SyncReport,
    SyncRequest,
};
