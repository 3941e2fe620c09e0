//! Mark-and-sweep cleanup of texture files no manifest references.

use std::fs;
use std::path::PathBuf;

use camino::Utf8Path;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use texpp_core::manifest::{is_manifest_file, is_texture_file};
use texpp_core::ReferenceSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub manifests_read: usize,
    pub references: usize,
    pub textures_seen: usize,
    pub removed: usize,
    /// Deletions that failed and were skipped.
    pub failed: usize,
}

pub struct ReconciliationSweeper;

impl ReconciliationSweeper {
    /// Sweeps a single tree and returns how many textures were deleted.
    pub fn sweep(root: &Utf8Path) -> usize {
        Self::sweep_all(&[root]).removed
    }

    /// Builds one reference set from every manifest under `roots`, then
    /// deletes each texture under `roots` whose bare name is not in it.
    ///
    /// Missing roots contribute nothing. Symlinked directories are not followed.
    pub fn sweep_all<P: AsRef<Utf8Path>>(roots: &[P]) -> SweepReport {
        let (manifests, textures) = Self::collect(roots);

        let references = manifests
            .par_iter()
            .map(|path| match fs::read(path) {
                Ok(bytes) => ReferenceSet::from_manifest_text(&String::from_utf8_lossy(&bytes)),
                Err(e) => {
                    warn!("Could not read manifest {}: {}", path.display(), e);
                    ReferenceSet::new()
                }
            })
            .reduce(ReferenceSet::new, |mut acc, set| {
                acc.merge(set);
                acc
            });

        let mut report = SweepReport {
            manifests_read: manifests.len(),
            references: references.len(),
            textures_seen: textures.len(),
            ..SweepReport::default()
        };

        for path in &textures {
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if references.contains(name) {
                continue;
            }
            match fs::remove_file(path) {
                Ok(()) => {
                    debug!("Removed unreferenced {}", path.display());
                    report.removed += 1;
                }
                Err(e) => {
                    debug!("Could not remove {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Sweep: {} manifests, {} references, removed {} of {} textures",
            report.manifests_read, report.references, report.removed, report.textures_seen
        );
        report
    }

    fn collect<P: AsRef<Utf8Path>>(roots: &[P]) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let mut manifests = Vec::new();
        let mut textures = Vec::new();
        for root in roots {
            let root = root.as_ref();
            if !root.as_std_path().is_dir() {
                continue;
            }
            for entry in WalkDir::new(root.as_std_path())
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.into_path();
                if is_manifest_file(&path) {
                    manifests.push(path);
                } else if is_texture_file(&path) {
                    textures.push(path);
                }
            }
        }
        (manifests, textures)
    }
}
