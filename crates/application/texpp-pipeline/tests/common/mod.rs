#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use texpp_infra::hub::{Credentials, RepoRef};
use texpp_pipeline::{ContentStore, FetchReport, HostProbe, StoreError};
use tokio_util::sync::CancellationToken;

pub const FAKE_TIMESTAMP: &str = "2024-01-02T03:04:05";

/// In-memory remote: folder name -> (relative path, bytes).
#[derive(Default)]
pub struct FakeStore {
    pub remote: BTreeMap<String, Vec<(String, Vec<u8>)>>,
    pub fail_folder: Option<String>,
    pub fail_upload: bool,
    /// Cancel this token once this many folders have been fetched.
    pub cancel_after: Option<(usize, CancellationToken)>,
    pub fetched: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<(String, String)>>,
}

impl FakeStore {
    pub fn with_folder(mut self, folder: &str, files: &[(&str, &str)]) -> Self {
        self.remote.insert(
            folder.to_string(),
            files
                .iter()
                .map(|(p, c)| (format!("{folder}/{p}"), c.as_bytes().to_vec()))
                .collect(),
        );
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ContentStore for FakeStore {
    async fn fetch(
        &self,
        repo: &RepoRef,
        folder: &str,
        dest_root: &Utf8Path,
        _creds: &Credentials,
    ) -> Result<FetchReport, StoreError> {
        if self.fail_folder.as_deref() == Some(folder) {
            return Err(StoreError::new("connection reset")
                .with_log(vec![format!("Fetching 1 files from '{folder}'")]));
        }
        let files = self.remote.get(folder).cloned().unwrap_or_default();
        let mut report = FetchReport {
            files_total: files.len(),
            ..FetchReport::default()
        };
        report
            .log
            .push(format!("Fetching {} files from '{}' in {}", files.len(), folder, repo.id));
        for (rel, bytes) in files {
            let target = dest_root.join(&rel);
            std::fs::create_dir_all(target.parent().unwrap()).unwrap();
            std::fs::write(&target, &bytes).unwrap();
            report.files_fetched += 1;
            report.bytes_fetched += bytes.len() as u64;
            report.log.push(format!("get {rel}"));
        }

        let count = {
            let mut fetched = self.fetched.lock().unwrap();
            fetched.push(folder.to_string());
            fetched.len()
        };
        if let Some((after, token)) = &self.cancel_after {
            if *after == count {
                token.cancel();
            }
        }
        Ok(report)
    }

    async fn upload(
        &self,
        local: &Utf8Path,
        repo: &RepoRef,
        remote_path: &str,
        _creds: &Credentials,
    ) -> Result<(), StoreError> {
        if self.fail_upload {
            return Err(StoreError::new("simulated network error"));
        }
        assert!(local.exists());
        self.uploads
            .lock()
            .unwrap()
            .push((repo.id.clone(), remote_path.to_string()));
        Ok(())
    }
}

pub struct FakeHost;

#[async_trait::async_trait]
impl HostProbe for FakeHost {
    async fn utc_timestamp(&self) -> String {
        FAKE_TIMESTAMP.to_string()
    }

    async fn network_info(&self) -> Option<Value> {
        None
    }

    async fn hardware_snapshot(&self) -> Result<Value, String> {
        Err("probe unavailable".to_string())
    }
}

pub fn fake_host() -> Arc<dyn HostProbe> {
    Arc::new(FakeHost)
}

pub fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

/// Every file under `root`, relative and sorted.
pub fn tree(root: &Utf8Path) -> BTreeSet<String> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}
