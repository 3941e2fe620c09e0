//! Minimal client for a Hugging Face style content hub.
//!
//! Only what the installer needs: recursive tree listings, per-file resolve
//! URLs and single-file commits. Endpoint and token always come in through
//! [`Credentials`]; nothing is read from the process environment.

use base64::Engine;
use camino::Utf8Path;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, LINK};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoKind {
    Dataset,
    Model,
}

impl RepoKind {
    fn api_segment(self) -> &'static str {
        match self {
            RepoKind::Dataset => "datasets",
            RepoKind::Model => "models",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub id: String,
    pub kind: RepoKind,
    pub revision: String,
}

impl RepoRef {
    pub fn dataset(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: RepoKind::Dataset,
            revision: texpp_config::DEFAULT_REVISION.to_string(),
        }
    }

    pub fn model(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: RepoKind::Model,
            revision: texpp_config::DEFAULT_REVISION.to_string(),
        }
    }
}

/// Endpoint plus optional access token for one hub.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    fn base(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }
}

/// One object returned by a tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    #[serde(default)]
    pub size: u64,
    /// Git object id of the listed revision.
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub lfs: Option<LfsPointer>,
}

/// Large-file pointer; `oid` is the SHA-256 of the file content.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LfsPointer {
    pub oid: String,
    #[serde(default)]
    pub size: u64,
}

impl TreeEntry {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }

    /// Content SHA-256 when the hub publishes one.
    pub fn content_sha256(&self) -> Option<&str> {
        self.lfs.as_ref().map(|l| l.oid.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| utf8_percent_encode(s, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Extracts the `rel="next"` target from a `Link` header.
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        params
            .split(';')
            .any(|p| p.trim().eq_ignore_ascii_case("rel=\"next\""))
            .then(|| {
                target
                    .trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string()
            })
    })
}

#[derive(Clone)]
pub struct HubClient {
    client: Client,
}

impl HubClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn tree_url(creds: &Credentials, repo: &RepoRef, prefix: &str) -> String {
        format!(
            "{}/api/{}/{}/tree/{}/{}?recursive=true",
            creds.base(),
            repo.kind.api_segment(),
            repo.id,
            repo.revision,
            encode_path(prefix)
        )
    }

    pub fn resolve_url(creds: &Credentials, repo: &RepoRef, path: &str) -> String {
        let prefix = match repo.kind {
            RepoKind::Dataset => "datasets/",
            RepoKind::Model => "",
        };
        format!(
            "{}/{}{}/resolve/{}/{}",
            creds.base(),
            prefix,
            repo.id,
            repo.revision,
            encode_path(path)
        )
    }

    pub fn commit_url(creds: &Credentials, repo: &RepoRef) -> String {
        format!(
            "{}/api/{}/{}/commit/{}",
            creds.base(),
            repo.kind.api_segment(),
            repo.id,
            repo.revision
        )
    }

    /// Every object under `prefix`, following pagination links.
    pub async fn list_tree(
        &self,
        creds: &Credentials,
        repo: &RepoRef,
        prefix: &str,
    ) -> Result<Vec<TreeEntry>, HubError> {
        let mut entries = Vec::new();
        let mut next = Some(Self::tree_url(creds, repo, prefix));

        while let Some(url) = next.take() {
            debug!("listing {url}");
            let resp = creds
                .authorize(self.client.get(&url))
                .send()
                .await
                .map_err(|source| HubError::Request {
                    url: url.clone(),
                    source,
                })?;
            if !resp.status().is_success() {
                return Err(HubError::Status {
                    url,
                    status: resp.status().as_u16(),
                });
            }
            next = resp
                .headers()
                .get(LINK)
                .and_then(|h| h.to_str().ok())
                .and_then(next_link);

            let page: Vec<TreeEntry> = resp.json().await.map_err(|e| HubError::Decode {
                url: url.clone(),
                message: e.to_string(),
            })?;
            entries.extend(page);
        }

        Ok(entries)
    }

    /// Commits one local file to `path_in_repo`.
    pub async fn upload_file(
        &self,
        creds: &Credentials,
        repo: &RepoRef,
        local: &Utf8Path,
        path_in_repo: &str,
    ) -> Result<(), HubError> {
        let bytes = tokio::fs::read(local.as_std_path())
            .await
            .map_err(|source| HubError::Io {
                path: local.to_string(),
                source,
            })?;

        let header = json!({
            "key": "header",
            "value": { "summary": format!("Upload {path_in_repo}"), "description": "" },
        });
        let file = json!({
            "key": "file",
            "value": {
                "content": base64::engine::general_purpose::STANDARD.encode(&bytes),
                "path": path_in_repo,
                "encoding": "base64",
            },
        });
        let body = format!("{header}\n{file}\n");

        let url = Self::commit_url(creds, repo);
        let resp = creds
            .authorize(self.client.post(&url))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|source| HubError::Request {
                url: url.clone(),
                source,
            })?;
        if !resp.status().is_success() {
            return Err(HubError::Status {
                url,
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}
