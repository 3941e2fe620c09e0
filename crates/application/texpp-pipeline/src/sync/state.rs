use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use texpp_infra::hub::TreeEntry;
use tracing::warn;

pub const STATE_FILE: &str = ".texpp-state.json";

/// What was written for one path: the listed revision and the content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledFile {
    pub oid: Option<String>,
    pub size: u64,
    pub sha256: String,
}

/// Per-folder record of installed files, kept next to the files themselves.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FolderState {
    /// Map relative_path (forward slashes) -> what was installed there.
    pub files: BTreeMap<String, InstalledFile>,
}

impl FolderState {
    pub fn path_for(dest_root: &Utf8Path, folder: &str) -> Utf8PathBuf {
        dest_root.join(folder).join(STATE_FILE)
    }

    /// Missing or unreadable state is an empty state.
    pub fn load(path: &Utf8Path) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!("Install state at {} is corrupt, ignoring: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Utf8Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let s = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, s)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn get(&self, rel_path: &str) -> Option<&InstalledFile> {
        self.files.get(rel_path)
    }

    pub fn record(&mut self, rel_path: &str, entry: &TreeEntry, sha256: String) {
        self.files.insert(
            rel_path.to_string(),
            InstalledFile {
                oid: entry.oid.clone(),
                size: entry.size,
                sha256,
            },
        );
    }

    /// Drops paths the listing no longer contains.
    pub fn retain_listed(&mut self, listed: &HashSet<String>) {
        self.files.retain(|path, _| listed.contains(path));
    }

    /// Whether a local file with digest `local_sha256` is the listed revision.
    ///
    /// A published content hash decides on its own. Otherwise the file must
    /// have been installed from the same object id and be unchanged since.
    pub fn is_current(&self, rel_path: &str, entry: &TreeEntry, local_sha256: &str) -> bool {
        if let Some(expected) = entry.content_sha256() {
            return expected.eq_ignore_ascii_case(local_sha256);
        }
        match (self.get(rel_path), &entry.oid) {
            (Some(installed), Some(oid)) => {
                installed.oid.as_deref() == Some(oid.as_str())
                    && installed.size == entry.size
                    && installed.sha256 == local_sha256
            }
            _ => false,
        }
    }
}
