use serde::{Deserialize, Serialize};
use texpp_core::VariantCatalog;

/// User choices remembered between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mods_folder: String,
    pub variant: String,
    pub use_mirror: bool,
    pub max_threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mods_folder: String::new(),
            variant: texpp_config::DEFAULT_VARIANT.to_string(),
            use_mirror: false,
            max_threads: texpp_config::DEFAULT_DOWNLOAD_THREADS,
        }
    }
}

impl Settings {
    /// Parses a settings document; anything unreadable yields the defaults.
    pub fn from_json_lenient(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_default()
    }

    /// Replaces an unknown variant with the default and clamps the thread count.
    pub fn normalized(mut self, catalog: &VariantCatalog) -> Self {
        if !catalog.contains(&self.variant) {
            self.variant = texpp_config::DEFAULT_VARIANT.to_string();
        }
        self.max_threads = texpp_config::clamp_threads(self.max_threads);
        self
    }

    pub fn has_mods_folder(&self) -> bool {
        !self.mods_folder.trim().is_empty()
    }
}
