use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use texpp_config::CUSTOM_VARIANT;

use crate::path_utils::RemotePath;

/// One install tier: which remote folders it pulls and where they land locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDescriptor {
    pub name: String,
    pub label: String,
    /// Remote folders fetched in order. Never empty for a resolved descriptor.
    pub folders: Vec<String>,
    /// Subdirectory under the mods root. Empty means "install into the root".
    pub local_dir: String,
    /// Approximate download size. `None` disables time estimation.
    pub size_gb: Option<f64>,
}

impl VariantDescriptor {
    fn fixed(name: &str, size_gb: f64, folders: &[&str], local_dir: &str) -> Self {
        Self {
            name: name.to_string(),
            label: format!("{name} (~{size_gb:.0}GB)"),
            folders: folders.iter().map(|f| f.to_string()).collect(),
            local_dir: local_dir.to_string(),
            size_gb: Some(size_gb),
        }
    }

    pub fn installs_into_root(&self) -> bool {
        self.local_dir.is_empty()
    }

    pub fn targets(&self, folder: &str) -> bool {
        self.folders.iter().any(|f| f == folder)
    }

    pub fn is_custom(&self) -> bool {
        self.name == CUSTOM_VARIANT
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("Unknown variant '{0}'")]
    NotFound(String),
    #[error("Variant '{0}' has no folders selected")]
    EmptySelection(String),
    #[error("Folder name '{0}' is not a valid remote folder")]
    InvalidFolder(String),
}

/// Fixed table of variants plus the one late-bound custom entry.
#[derive(Debug, Clone)]
pub struct VariantCatalog {
    variants: Vec<VariantDescriptor>,
    custom_folders: Vec<String>,
}

impl Default for VariantCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl VariantCatalog {
    pub fn builtin() -> Self {
        let variants = vec![
            VariantDescriptor::fixed("Mini", 1.0, &["Texture++ Mini"], ""),
            VariantDescriptor::fixed("Base", 12.0, &["Base_4X"], "Texture++ Base"),
            VariantDescriptor::fixed("Core", 15.0, &["Base_4X", "Core_2X"], "Texture++ Core"),
            VariantDescriptor::fixed(
                "Core 4K",
                26.0,
                &["Base_4X", "Core_4X"],
                "Texture++ Core 4K",
            ),
            VariantDescriptor::fixed(
                "Finale",
                55.0,
                &["Base_4X", "Core_4X", "World_2X"],
                "Texture++ Finale",
            ),
            VariantDescriptor {
                name: CUSTOM_VARIANT.to_string(),
                label: format!("{CUSTOM_VARIANT} (pick folders)"),
                folders: Vec::new(),
                local_dir: "Texture++ Custom".to_string(),
                size_gb: None,
            },
        ];
        Self {
            variants,
            custom_folders: Vec::new(),
        }
    }

    /// Injects the user's folder choice for the custom variant.
    /// Blank entries are dropped and duplicates collapsed, keeping first-seen order.
    pub fn with_custom_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_custom_folders(folders);
        self
    }

    pub fn set_custom_folders<I, S>(&mut self, folders: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.custom_folders.clear();
        for f in folders {
            let f = RemotePath::normalize(f.as_ref().trim())
                .trim_matches('/')
                .to_string();
            if !f.is_empty() && !self.custom_folders.contains(&f) {
                self.custom_folders.push(f);
            }
        }
    }

    pub fn variants(&self) -> &[VariantDescriptor] {
        &self.variants
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|v| v.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variants.iter().any(|v| v.name == name)
    }

    /// Every folder referenced by a fixed variant, deduplicated in catalog order.
    pub fn known_folders(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for v in &self.variants {
            for f in &v.folders {
                if !out.contains(&f.as_str()) {
                    out.push(f);
                }
            }
        }
        out
    }

    /// Looks up a variant ready for a sync. The custom variant only resolves
    /// once a non-empty folder list has been injected.
    pub fn resolve(&self, name: &str) -> Result<VariantDescriptor, CatalogError> {
        let found = self
            .variants
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;

        let mut desc = found.clone();
        if desc.is_custom() {
            desc.folders = self.custom_folders.clone();
        }

        if desc.folders.is_empty() {
            return Err(CatalogError::EmptySelection(name.to_string()));
        }
        if let Some(bad) = desc.folders.iter().find(|f| !RemotePath::verify_safe(f)) {
            return Err(CatalogError::InvalidFolder(bad.clone()));
        }
        Ok(desc)
    }
}

/// Where a variant lands under a mods root.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallLayout {
    mods_root: Utf8PathBuf,
    local_dir: String,
    folders: Vec<String>,
}

impl InstallLayout {
    pub fn new(mods_root: &Utf8Path, variant: &VariantDescriptor) -> Self {
        Self {
            mods_root: mods_root.to_path_buf(),
            local_dir: variant.local_dir.clone(),
            folders: variant.folders.clone(),
        }
    }

    pub fn mods_root(&self) -> &Utf8Path {
        &self.mods_root
    }

    /// The directory every fetched folder is mirrored into.
    pub fn install_root(&self) -> Utf8PathBuf {
        if self.local_dir.is_empty() {
            self.mods_root.clone()
        } else {
            self.mods_root.join(&self.local_dir)
        }
    }

    /// Directory whose presence means a previous install exists.
    ///
    /// Root-relative variants can't use the install root (the mods folder always
    /// exists), so their first fetched folder stands in for it.
    pub fn existing_install_marker(&self) -> Option<Utf8PathBuf> {
        if self.local_dir.is_empty() {
            self.folders.first().map(|f| self.mods_root.join(f))
        } else {
            Some(self.install_root())
        }
    }

    pub fn has_existing_install(&self) -> bool {
        self.existing_install_marker()
            .is_some_and(|p| p.as_std_path().is_dir())
    }

    /// Path shown to the user before an install starts.
    pub fn display_path(&self) -> Utf8PathBuf {
        self.existing_install_marker()
            .unwrap_or_else(|| self.install_root())
    }

    /// Trees the cleanup sweep may delete from.
    ///
    /// For root-relative variants this is each fetched folder rather than the
    /// mods root, so unrelated content next to the install is never touched.
    pub fn sweep_scopes(&self) -> Vec<Utf8PathBuf> {
        if self.local_dir.is_empty() {
            self.folders.iter().map(|f| self.mods_root.join(f)).collect()
        } else {
            vec![self.install_root()]
        }
    }
}
