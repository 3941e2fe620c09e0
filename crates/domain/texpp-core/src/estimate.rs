use std::fmt;

use texpp_config::FOLDER_OVERHEAD_SECONDS;

use crate::catalog::VariantDescriptor;

/// Megabits per gigabyte (decimal units).
const MEGABITS_PER_GB: f64 = 8.0 * 1000.0;

/// Fixed extra time charged when any folder of a group is part of a variant.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderOverhead {
    pub folders: Vec<String>,
    pub seconds: f64,
}

impl FolderOverhead {
    pub fn new<S: Into<String>>(folders: impl IntoIterator<Item = S>, seconds: f64) -> Self {
        Self {
            folders: folders.into_iter().map(Into::into).collect(),
            seconds,
        }
    }

    fn applies_to(&self, variant: &VariantDescriptor) -> bool {
        self.folders.iter().any(|f| variant.targets(f))
    }
}

/// What the selection screen shows about download time.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEstimate {
    /// The variant carries no size.
    Unavailable,
    /// A previous install exists and will be updated rather than downloaded fresh.
    ExistingInstall,
    /// Bandwidth has not been measured yet.
    Measuring,
    /// Bandwidth measurement failed or came back as zero.
    CannotEstimate,
    Duration { total_seconds: f64 },
}

impl DownloadEstimate {
    /// Whether the estimate should be recomputed once a measurement lands.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Measuring)
    }
}

impl fmt::Display for DownloadEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "No variant selected or size not available."),
            Self::ExistingInstall => write!(
                f,
                "Existing installation found. It will be updated and repaired."
            ),
            Self::Measuring => write!(f, "Measuring internet speed..."),
            Self::CannotEstimate => write!(f, "Cannot estimate internet speed."),
            Self::Duration { total_seconds } => write!(
                f,
                "Estimated download time: {}",
                render_duration(*total_seconds)
            ),
        }
    }
}

/// Seconds below a minute, minutes below an hour, hours otherwise; each
/// rounded to the nearest whole unit.
pub fn render_duration(total_seconds: f64) -> String {
    if total_seconds < 60.0 {
        format!("{} seconds", total_seconds.round() as u64)
    } else if total_seconds < 3600.0 {
        format!("{} minutes", (total_seconds / 60.0).round() as u64)
    } else {
        format!("{} hours", (total_seconds / 3600.0).round() as u64)
    }
}

#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    overheads: Vec<FolderOverhead>,
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new(
            FOLDER_OVERHEAD_SECONDS
                .iter()
                .map(|(folders, secs)| FolderOverhead::new(folders.iter().copied(), *secs))
                .collect(),
        )
    }
}

impl SpeedEstimator {
    pub fn new(overheads: Vec<FolderOverhead>) -> Self {
        Self { overheads }
    }

    pub fn overhead_seconds(&self, variant: &VariantDescriptor) -> f64 {
        self.overheads
            .iter()
            .filter(|o| o.applies_to(variant))
            .map(|o| o.seconds)
            .sum()
    }

    /// Policy order: missing size, existing install, unknown bandwidth,
    /// non-positive bandwidth, then the actual estimate.
    pub fn estimate(
        &self,
        variant: &VariantDescriptor,
        installed_tree_exists: bool,
        bandwidth_mbps: Option<f64>,
    ) -> DownloadEstimate {
        let Some(size_gb) = variant.size_gb else {
            return DownloadEstimate::Unavailable;
        };
        if installed_tree_exists {
            return DownloadEstimate::ExistingInstall;
        }
        let Some(mbps) = bandwidth_mbps else {
            return DownloadEstimate::Measuring;
        };
        if mbps.is_nan() || mbps <= 0.0 {
            return DownloadEstimate::CannotEstimate;
        }

        let base_seconds = size_gb * MEGABITS_PER_GB / mbps;
        DownloadEstimate::Duration {
            total_seconds: base_seconds + self.overhead_seconds(variant),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_picks_unit_by_magnitude() {
        assert_eq!(render_duration(0.4), "0 seconds");
        assert_eq!(render_duration(59.4), "59 seconds");
        assert_eq!(render_duration(60.0), "1 minutes");
        assert_eq!(render_duration(3599.0), "60 minutes");
        assert_eq!(render_duration(3600.0), "1 hours");
        assert_eq!(render_duration(12_000.0), "3 hours");
    }

    #[test]
    fn nan_bandwidth_cannot_estimate() {
        let v = crate::VariantCatalog::builtin().resolve("Base").unwrap();
        let est = SpeedEstimator::default().estimate(&v, false, Some(f64::NAN));
        assert_eq!(est, DownloadEstimate::CannotEstimate);
    }
}
