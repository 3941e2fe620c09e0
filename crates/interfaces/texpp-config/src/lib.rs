//! Central configuration constants for endpoints, repositories and runtime limits.

use std::time::Duration;

/// Primary content hub endpoint.
pub const PRIMARY_ENDPOINT: &str = "https://huggingface.co";

/// Alternate endpoint used when the primary is unreachable.
pub const MIRROR_ENDPOINT: &str = "https://hf-mirror.com";

/// Dataset repository holding the texture folders.
pub const CONTENT_REPO_ID: &str = "texture-plus-plus/texture-pack";

/// Dataset repository receiving diagnostic logs.
pub const LOG_REPO_ID: &str = "texture-plus-plus/installer-logs";

/// Remote directory inside the log repository.
pub const LOG_REMOTE_DIR: &str = "logs";

/// Revision fetched from both repositories.
pub const DEFAULT_REVISION: &str = "main";

/// Variant selected when settings are missing or name an unknown variant.
pub const DEFAULT_VARIANT: &str = "Core";

/// Name of the variant whose folder list is chosen by the user.
pub const CUSTOM_VARIANT: &str = "Custom";

/// Model repository used as the bandwidth reference object.
pub const SPEED_TEST_REPO_ID: &str = "google-bert/bert-base-uncased";

/// File downloaded from [`SPEED_TEST_REPO_ID`] by the bandwidth probe.
pub const SPEED_TEST_FILENAME: &str = "model.safetensors";

/// Scratch directory name for the bandwidth probe.
pub const SPEED_TEST_CACHE_DIR: &str = ".speedtest_cache";

/// Hard limit on a single bandwidth measurement.
pub const SPEED_TEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout for reachability checks against an endpoint.
pub const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for the public IP lookup and the UTC time lookup.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Public IP / geolocation service used in diagnostics.
pub const NETWORK_INFO_URL: &str = "http://ip-api.com/json";

/// UTC time service used in diagnostics.
pub const UTC_TIME_URL: &str = "https://timeapi.io/api/Time/current/zone?timeZone=UTC";

/// Default number of concurrent file downloads inside one folder.
pub const DEFAULT_DOWNLOAD_THREADS: usize = 4;

/// Minimum allowed concurrent downloads.
pub const MIN_DOWNLOAD_THREADS: usize = 1;

/// Maximum allowed concurrent downloads.
pub const MAX_DOWNLOAD_THREADS: usize = 8;

/// Retries per file before the folder fetch is reported as failed.
pub const DOWNLOAD_ATTEMPTS: u32 = 3;

/// Extra seconds added to an estimate when a folder group is part of a variant.
///
/// Each group contributes once, no matter how many of its folders are targeted.
pub const FOLDER_OVERHEAD_SECONDS: &[(&[&str], f64)] = &[
    (&["Base_4X"], 30.0),
    (&["Core_2X", "Core_4X"], 60.0),
    (&["World_2X"], 120.0),
];

/// Convenience function to clamp a thread value into allowed range.
pub fn clamp_threads(v: usize) -> usize {
    v.clamp(MIN_DOWNLOAD_THREADS, MAX_DOWNLOAD_THREADS)
}
