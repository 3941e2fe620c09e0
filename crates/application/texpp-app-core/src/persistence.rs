use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing::warn;

use crate::domain::Settings;
use crate::ports::SettingsRepo;

const QUALIFIER: &str = "com";
const ORG: &str = "texture-plus-plus";
const APP: &str = "installer";
const SETTINGS_FILE: &str = "settings.json";

/// Settings stored as pretty JSON in the platform config directory.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    dir: Option<PathBuf>,
}

impl Default for FilePersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl FilePersistence {
    pub fn new() -> Self {
        Self { dir: None }
    }

    /// Keeps everything under `dir` instead of the platform directories.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from(QUALIFIER, ORG, APP)
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
    }

    pub fn config_dir(&self) -> Result<PathBuf> {
        let dir = match &self.dir {
            Some(d) => d.clone(),
            None => Self::project_dirs()?.config_dir().to_path_buf(),
        };
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(dir)
    }

    /// Scratch space for the bandwidth probe.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(d) => Ok(d.join("cache")),
            None => Ok(Self::project_dirs()?.cache_dir().to_path_buf()),
        }
    }

    pub fn settings_path(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join(SETTINGS_FILE))
    }

    /// Missing or malformed files give the defaults.
    pub fn load_settings(&self) -> Result<Settings> {
        let path = self.settings_path()?;
        if !path.exists() {
            return Ok(Settings::default());
        }
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => Ok(settings),
                Err(e) => {
                    warn!("Ignoring malformed settings {}: {}", path.display(), e);
                    Ok(Settings::default())
                }
            },
            Err(e) => {
                warn!("Could not read settings {}: {}", path.display(), e);
                Ok(Settings::default())
            }
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let path = self.settings_path()?;
        let json = serde_json::to_string_pretty(settings)?;
        atomic_write(&path, json.as_bytes()).context("Failed to write settings")?;
        Ok(())
    }
}

impl SettingsRepo for FilePersistence {
    fn load(&self) -> Result<Settings> {
        self.load_settings()
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        self.save_settings(settings)
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = {
        let mut name = path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    };

    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp file {}", tmp_path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write temp file {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync temp file {}", tmp_path.display()))?;
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path) {
        if e.kind() != std::io::ErrorKind::AlreadyExists {
            let _ = fs::remove_file(&tmp_path);
            return Err(e).with_context(|| {
                format!("Failed to move {} into place", tmp_path.display())
            });
        }
        fs::remove_file(path).ok();
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
    }

    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}
