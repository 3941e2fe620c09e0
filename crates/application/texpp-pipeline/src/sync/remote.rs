use std::collections::{HashMap, HashSet};

use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use texpp_core::path_utils::RemotePath;
use texpp_infra::hashing::sha256_file;
use texpp_infra::hub::{Credentials, HubClient, RepoRef, TreeEntry};
use texpp_infra::net::{DownloadRequest, Downloader};
use tracing::{debug, info, warn};

use crate::sync::state::FolderState;
use crate::sync::storage::{ContentStore, FetchReport, StoreError};
use crate::sync::SyncOptions;

/// [`ContentStore`] backed by the content hub HTTP API.
///
/// A local file is skipped only when its content is the listed revision:
/// either it matches the published SHA-256, or it was installed from the same
/// object id and its digest has not changed since. Everything else is fetched
/// again, so a repeated fetch both updates and repairs.
pub struct HubContentStore {
    hub: HubClient,
    options: SyncOptions,
}

impl HubContentStore {
    pub fn new(client: reqwest::Client, options: SyncOptions) -> Self {
        Self {
            hub: HubClient::new(client),
            options,
        }
    }
}

fn has_size(path: &Utf8Path, expected_size: u64) -> bool {
    std::fs::metadata(path.as_std_path())
        .map(|m| m.is_file() && m.len() == expected_size)
        .unwrap_or(false)
}

/// Digests `paths` on the blocking pool; unreadable files give `None`.
async fn hash_files(paths: Vec<Utf8PathBuf>) -> Vec<Option<String>> {
    let count = paths.len();
    tokio::task::spawn_blocking(move || {
        paths
            .par_iter()
            .map(|p| match sha256_file(p) {
                Ok(digest) => Some(digest),
                Err(e) => {
                    debug!("could not hash {p}: {e}");
                    None
                }
            })
            .collect::<Vec<_>>()
    })
    .await
    .unwrap_or_else(|e| {
        warn!("hashing task failed: {e}");
        vec![None; count]
    })
}

struct Planned {
    rel: String,
    entry: TreeEntry,
    target: Utf8PathBuf,
}

#[async_trait::async_trait]
impl ContentStore for HubContentStore {
    async fn fetch(
        &self,
        repo: &RepoRef,
        folder: &str,
        dest_root: &Utf8Path,
        creds: &Credentials,
    ) -> Result<FetchReport, StoreError> {
        let entries = self
            .hub
            .list_tree(creds, repo, folder)
            .await
            .map_err(|e| StoreError::new(format!("listing failed: {e}")))?;

        let files: Vec<_> = entries.into_iter().filter(|e| e.is_file()).collect();
        let mut report = FetchReport {
            files_total: files.len(),
            ..FetchReport::default()
        };
        report
            .log
            .push(format!("Fetching {} files from '{folder}'", files.len()));
        if files.is_empty() {
            warn!("Remote folder '{folder}' is empty or missing");
            report.log.push(format!("No files found under '{folder}'"));
            return Ok(report);
        }

        let mut planned = Vec::with_capacity(files.len());
        for entry in files {
            let rel = RemotePath::normalize(&entry.path);
            if !RemotePath::verify_safe(&rel) || !RemotePath::is_under(&rel, folder) {
                report
                    .log
                    .push(format!("Security: refusing remote path '{rel}'"));
                return Err(StoreError::new(format!(
                    "Security: remote path '{rel}' escapes '{folder}'"
                ))
                .with_log(report.log));
            }
            let target = dest_root.join(&rel);
            planned.push(Planned { rel, entry, target });
        }

        let state_path = FolderState::path_for(dest_root, folder);
        let mut state = FolderState::load(&state_path);

        // Only files of the right size can be current; hash those.
        let sized: Vec<usize> = (0..planned.len())
            .filter(|&i| has_size(&planned[i].target, planned[i].entry.size))
            .collect();
        let digests = hash_files(sized.iter().map(|&i| planned[i].target.clone()).collect()).await;
        let mut local_digest: HashMap<usize, String> = HashMap::new();
        for (i, digest) in sized.into_iter().zip(digests) {
            if let Some(d) = digest {
                local_digest.insert(i, d);
            }
        }

        let mut requests = Vec::new();
        for (idx, item) in planned.iter().enumerate() {
            if let Some(digest) = local_digest.remove(&idx) {
                if state.is_current(&item.rel, &item.entry, &digest) {
                    report.files_skipped += 1;
                    report
                        .log
                        .push(format!("skip {} ({} bytes, up to date)", item.rel, item.entry.size));
                    state.record(&item.rel, &item.entry, digest);
                    continue;
                }
                debug!("{} differs from the listed revision", item.rel);
            }

            requests.push(DownloadRequest {
                id: idx as u64,
                url: HubClient::resolve_url(creds, repo, &item.rel),
                target_path: item.target.clone(),
                expected_size: item.entry.size,
                bearer_token: creds.token.clone(),
            });
        }

        debug!(
            "'{folder}': {} to download, {} up to date",
            requests.len(),
            report.files_skipped
        );

        let downloader = Downloader::new(
            self.hub.http().clone(),
            self.options.max_threads,
            self.options.rate_limit_bytes,
        );
        let mut results = downloader.download_batch(requests, None).await;
        results.sort_by_key(|r| r.id);

        let fetched: Vec<usize> = results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.id as usize)
            .collect();
        let fetched_digests =
            hash_files(fetched.iter().map(|&i| planned[i].target.clone()).collect()).await;
        let mut new_digest: HashMap<usize, Option<String>> =
            fetched.into_iter().zip(fetched_digests).collect();

        let mut failures = Vec::new();
        for result in results {
            let idx = result.id as usize;
            let item = &planned[idx];
            let outcome = if result.success {
                match new_digest.remove(&idx).flatten() {
                    Some(digest) => match item.entry.content_sha256() {
                        Some(expected) if !expected.eq_ignore_ascii_case(&digest) => {
                            Err(format!("checksum mismatch: expected {expected}, got {digest}"))
                        }
                        _ => Ok(digest),
                    },
                    None => Err("downloaded file could not be read back".to_string()),
                }
            } else {
                Err(result.error.unwrap_or_else(|| "unknown error".into()))
            };

            match outcome {
                Ok(digest) => {
                    report.files_fetched += 1;
                    report.bytes_fetched += result.bytes_downloaded;
                    report
                        .log
                        .push(format!("get {} ({} bytes)", item.rel, result.bytes_downloaded));
                    state.record(&item.rel, &item.entry, digest);
                }
                Err(err) => {
                    report.log.push(format!("failed {}: {err}", item.rel));
                    failures.push(format!("{}: {err}", item.rel));
                }
            }
        }

        let listed: HashSet<String> = planned.iter().map(|p| p.rel.clone()).collect();
        state.retain_listed(&listed);
        if let Err(e) = state.save(&state_path) {
            warn!("Could not save install state {state_path}: {e}");
        }

        if let Some(first) = failures.first() {
            let message = format!(
                "{} of {} files failed ({first})",
                failures.len(),
                report.files_total
            );
            return Err(StoreError::new(message).with_log(report.log));
        }

        report.log.push(format!(
            "'{folder}': {} downloaded ({} bytes), {} already up to date",
            report.files_fetched, report.bytes_fetched, report.files_skipped
        ));
        info!(
            "Fetched '{}': {} new, {} skipped",
            folder, report.files_fetched, report.files_skipped
        );
        Ok(report)
    }

    async fn upload(
        &self,
        local: &Utf8Path,
        repo: &RepoRef,
        remote_path: &str,
        creds: &Credentials,
    ) -> Result<(), StoreError> {
        self.hub
            .upload_file(creds, repo, local, remote_path)
            .await
            .map_err(|e| StoreError::new(e.to_string()))
    }
}
