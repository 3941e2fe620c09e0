pub mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use camino::Utf8PathBuf;
use texpp_app_core::{FilePersistence, Settings};
use texpp_pipeline::{AccessTokens, EngineConfig, HostProbe, LiveHostProbe};

/// Everything a command needs from the outside world.
pub struct CliEnv {
    pub client: reqwest::Client,
    pub config: EngineConfig,
    pub persistence: FilePersistence,
    pub host: Arc<dyn HostProbe>,
}

impl CliEnv {
    /// `endpoint` replaces both hub endpoints; `config_dir` replaces the
    /// platform settings directory.
    pub fn new(endpoint: Option<String>, config_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let client =
            texpp_infra::default_http_client().context("Failed to build HTTP client")?;
        let config = match endpoint {
            Some(endpoint) => EngineConfig::single_endpoint(endpoint),
            None => EngineConfig::default(),
        };
        let persistence = match config_dir {
            Some(dir) => FilePersistence::in_dir(dir),
            None => FilePersistence::new(),
        };
        Ok(Self {
            host: Arc::new(LiveHostProbe::new(client.clone())),
            client,
            config,
            persistence,
        })
    }
}

/// Command-line values layered over the saved settings.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub mods_folder: Option<Utf8PathBuf>,
    pub variant: Option<String>,
    pub use_mirror: Option<bool>,
    pub threads: Option<usize>,
}

impl SettingsOverrides {
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(folder) = &self.mods_folder {
            settings.mods_folder = folder.to_string();
        }
        if let Some(variant) = &self.variant {
            settings.variant = variant.clone();
        }
        if let Some(mirror) = self.use_mirror {
            settings.use_mirror = mirror;
        }
        if let Some(threads) = self.threads {
            settings.max_threads = texpp_config::clamp_threads(threads);
        }
        settings
    }

    pub fn is_empty(&self) -> bool {
        self.mods_folder.is_none()
            && self.variant.is_none()
            && self.use_mirror.is_none()
            && self.threads.is_none()
    }
}

#[derive(Debug, Default)]
pub struct InstallArgs {
    pub overrides: SettingsOverrides,
    /// Folder list for the custom variant.
    pub folders: Vec<String>,
    pub tokens: AccessTokens,
    pub limit_mb: Option<u64>,
    pub skip_speed_test: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_what_was_given() {
        let saved = Settings {
            mods_folder: "/games/mods".into(),
            variant: "Finale".into(),
            use_mirror: true,
            max_threads: 4,
        };
        let overrides = SettingsOverrides {
            variant: Some("Base".into()),
            threads: Some(64),
            ..SettingsOverrides::default()
        };

        let merged = overrides.apply(saved);

        assert_eq!(merged.mods_folder, "/games/mods");
        assert_eq!(merged.variant, "Base");
        assert!(merged.use_mirror);
        assert_eq!(merged.max_threads, texpp_config::MAX_DOWNLOAD_THREADS);
        assert!(!overrides.is_empty());
        assert!(SettingsOverrides::default().is_empty());
    }
}
