pub mod catalog;
pub mod estimate;
pub mod manifest;
pub mod path_utils;

pub use catalog::{CatalogError, InstallLayout, VariantCatalog, VariantDescriptor};
pub use estimate::{DownloadEstimate, FolderOverhead, SpeedEstimator};
pub use manifest::ReferenceSet;
