pub mod hashing;
pub mod host;
pub mod hub;
pub mod net;
pub mod probe;

// Re-exports for convenience
pub use hashing::sha256_file;
pub use host::{hardware_snapshot, network_info, utc_timestamp};
pub use hub::{Credentials, HubClient, HubError, LfsPointer, RepoKind, RepoRef, TreeEntry};
pub use net::{default_http_client, DownloadEvent, DownloadRequest, DownloadResult, Downloader};
pub use probe::{check_connection, recommend_mirror, BandwidthProbe, ProbeError};
