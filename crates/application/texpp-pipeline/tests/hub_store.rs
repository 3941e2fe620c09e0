mod common;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use common::{fake_host, tree, utf8};
use tempfile::tempdir;
use texpp_core::VariantCatalog;
use texpp_infra::hub::{Credentials, RepoRef};
use texpp_pipeline::{
    ContentStore, EngineConfig, HubContentStore, SyncEngine, SyncOptions, SyncRequest,
};

#[derive(Default)]
struct Hits {
    resolves: AtomicUsize,
    commits: AtomicUsize,
    /// Revision served for the `Live` folder.
    revision: AtomicUsize,
}

const LFS_CONTENT: &str = "LFS01";
const LFS_SHA256: &str = "086dd58e654e9a9a0017de63b76853aeae0aff50f32e5eed128d1549e86217c1";

fn listing(folder: &str, revision: usize) -> Option<String> {
    let fixed = match folder {
        "Base_4X" => Some(
            r#"[
                {"type":"directory","path":"Base_4X/sub","oid":"d"},
                {"type":"file","path":"Base_4X/a.ini","size":16,"oid":"1"},
                {"type":"file","path":"Base_4X/a.dds","size":5,"oid":"2"},
                {"type":"file","path":"Base_4X/sub/old.png","size":3,"oid":"3"}
            ]"#,
        ),
        "Evil" => Some(r#"[{"type":"file","path":"Evil/../../escape.dds","size":1,"oid":"e"}]"#),
        "Broken" => Some(r#"[{"type":"file","path":"Broken/big.dds","size":99,"oid":"b"}]"#),
        "Lfs" => Some(
            r#"[
                {"type":"file","path":"Lfs/big.dds","size":5,"oid":"l1",
                 "lfs":{"oid":"086dd58e654e9a9a0017de63b76853aeae0aff50f32e5eed128d1549e86217c1","size":5}},
                {"type":"file","path":"Lfs/bad.dds","size":5,"oid":"l2",
                 "lfs":{"oid":"0000000000000000000000000000000000000000000000000000000000000000","size":5}}
            ]"#,
        ),
        "Live" => {
            return Some(format!(
                r#"[{{"type":"file","path":"Live/t.dds","size":4,"oid":"r{revision}"}}]"#
            ))
        }
        _ => None,
    };
    fixed.map(str::to_string)
}

fn content(path: &str, revision: usize) -> Option<String> {
    let fixed = match path {
        "Live/t.dds" => return Some(format!("rev{revision}")),
        "Lfs/big.dds" | "Lfs/bad.dds" => Some(LFS_CONTENT),
        "Base_4X/a.ini" => Some("filename = a.dds"),
        "Base_4X/a.dds" => Some("AAAAA"),
        "Base_4X/sub/old.png" => Some("old"),
        "Broken/big.dds" => Some("abc"),
        _ => None,
    };
    fixed.map(str::to_string)
}

async fn start_hub(hits: Arc<Hits>) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let content_repo = texpp_config::CONTENT_REPO_ID;
    let log_repo = texpp_config::LOG_REPO_ID;
    let resolve_hits = hits.clone();
    let tree_hits = hits.clone();

    let app = Router::new()
        .route(
            &format!("/api/datasets/{content_repo}/tree/main/*path"),
            get(move |Path(path): Path<String>| {
                let hits = tree_hits.clone();
                async move {
                    let revision = hits.revision.load(Ordering::SeqCst);
                    match listing(path.trim_matches('/'), revision) {
                        Some(body) => body.into_response(),
                        None => StatusCode::NOT_FOUND.into_response(),
                    }
                }
            }),
        )
        .route(
            &format!("/datasets/{content_repo}/resolve/main/*path"),
            get(move |Path(path): Path<String>| {
                let hits = resolve_hits.clone();
                async move {
                    hits.resolves.fetch_add(1, Ordering::SeqCst);
                    let revision = hits.revision.load(Ordering::SeqCst);
                    let resp: Response = match content(path.trim_start_matches('/'), revision) {
                        Some(body) => body.into_response(),
                        None => StatusCode::NOT_FOUND.into_response(),
                    };
                    resp
                }
            }),
        )
        .route(
            &format!("/api/datasets/{log_repo}/commit/main"),
            post(move || {
                let hits = hits.clone();
                async move {
                    hits.commits.fetch_add(1, Ordering::SeqCst);
                    r#"{"commitUrl":"ok"}"#
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

#[tokio::test]
async fn refetch_skips_files_already_in_place() {
    let hits = Arc::new(Hits::default());
    let (addr, handle) = start_hub(hits.clone()).await;
    let dir = tempdir().unwrap();
    let dest = utf8(dir.path());
    let store = HubContentStore::new(reqwest::Client::new(), SyncOptions::default());
    let creds = Credentials::new(format!("http://{addr}"), None);
    let repo = RepoRef::dataset(texpp_config::CONTENT_REPO_ID);

    let first = store.fetch(&repo, "Base_4X", &dest, &creds).await.unwrap();
    assert_eq!(first.files_total, 3);
    assert_eq!(first.files_fetched, 3);
    assert_eq!(first.log[0], "Fetching 3 files from 'Base_4X'");
    assert_eq!(std::fs::read_to_string(dest.join("Base_4X/a.dds")).unwrap(), "AAAAA");

    let second = store.fetch(&repo, "Base_4X", &dest, &creds).await.unwrap();
    assert_eq!(second.files_fetched, 0);
    assert_eq!(second.files_skipped, 3);
    assert_eq!(hits.resolves.load(Ordering::SeqCst), 3);

    // A damaged file is fetched again.
    std::fs::write(dest.join("Base_4X/a.dds"), "A").unwrap();
    let third = store.fetch(&repo, "Base_4X", &dest, &creds).await.unwrap();
    assert_eq!(third.files_fetched, 1);
    assert_eq!(std::fs::read_to_string(dest.join("Base_4X/a.dds")).unwrap(), "AAAAA");
    handle.abort();
}

#[tokio::test]
async fn same_size_local_change_is_repaired() {
    let hits = Arc::new(Hits::default());
    let (addr, handle) = start_hub(hits.clone()).await;
    let dir = tempdir().unwrap();
    let dest = utf8(dir.path());
    let store = HubContentStore::new(reqwest::Client::new(), SyncOptions::default());
    let creds = Credentials::new(format!("http://{addr}"), None);
    let repo = RepoRef::dataset(texpp_config::CONTENT_REPO_ID);

    store.fetch(&repo, "Base_4X", &dest, &creds).await.unwrap();
    std::fs::write(dest.join("Base_4X/a.dds"), "BBBBB").unwrap();

    let again = store.fetch(&repo, "Base_4X", &dest, &creds).await.unwrap();
    assert_eq!(again.files_fetched, 1);
    assert_eq!(again.files_skipped, 2);
    assert!(again.log.contains(&"get Base_4X/a.dds (5 bytes)".to_string()));
    assert_eq!(std::fs::read_to_string(dest.join("Base_4X/a.dds")).unwrap(), "AAAAA");
    handle.abort();
}

#[tokio::test]
async fn same_size_remote_update_is_fetched() {
    let hits = Arc::new(Hits::default());
    let (addr, handle) = start_hub(hits.clone()).await;
    let dir = tempdir().unwrap();
    let dest = utf8(dir.path());
    let store = HubContentStore::new(reqwest::Client::new(), SyncOptions::default());
    let creds = Credentials::new(format!("http://{addr}"), None);
    let repo = RepoRef::dataset(texpp_config::CONTENT_REPO_ID);

    store.fetch(&repo, "Live", &dest, &creds).await.unwrap();
    assert_eq!(std::fs::read_to_string(dest.join("Live/t.dds")).unwrap(), "rev0");
    let unchanged = store.fetch(&repo, "Live", &dest, &creds).await.unwrap();
    assert_eq!(unchanged.files_skipped, 1);

    hits.revision.store(1, Ordering::SeqCst);
    let updated = store.fetch(&repo, "Live", &dest, &creds).await.unwrap();
    assert_eq!(updated.files_fetched, 1);
    assert_eq!(updated.files_skipped, 0);
    assert_eq!(std::fs::read_to_string(dest.join("Live/t.dds")).unwrap(), "rev1");
    handle.abort();
}

#[tokio::test]
async fn published_sha256_is_checked() {
    let (addr, handle) = start_hub(Arc::default()).await;
    let dir = tempdir().unwrap();
    let dest = utf8(dir.path());
    let store = HubContentStore::new(reqwest::Client::new(), SyncOptions::default());
    let creds = Credentials::new(format!("http://{addr}"), None);
    let repo = RepoRef::dataset(texpp_config::CONTENT_REPO_ID);

    // A matching copy from an earlier install is kept without any recorded state.
    std::fs::create_dir_all(dest.join("Lfs")).unwrap();
    std::fs::write(dest.join("Lfs/big.dds"), LFS_CONTENT).unwrap();
    assert_eq!(
        texpp_infra::sha256_file(&dest.join("Lfs/big.dds")).unwrap(),
        LFS_SHA256
    );

    let err = store.fetch(&repo, "Lfs", &dest, &creds).await.unwrap_err();

    assert!(err.message.contains("Lfs/bad.dds"), "{}", err.message);
    assert!(err.message.contains("checksum mismatch"), "{}", err.message);
    assert!(err
        .log
        .contains(&"skip Lfs/big.dds (5 bytes, up to date)".to_string()));
    handle.abort();
}

#[tokio::test]
async fn listing_that_escapes_the_folder_is_refused() {
    let (addr, handle) = start_hub(Arc::default()).await;
    let dir = tempdir().unwrap();
    let dest = utf8(dir.path()).join("install");
    let store = HubContentStore::new(reqwest::Client::new(), SyncOptions::default());
    let creds = Credentials::new(format!("http://{addr}"), None);
    let repo = RepoRef::dataset(texpp_config::CONTENT_REPO_ID);

    let err = store.fetch(&repo, "Evil", &dest, &creds).await.unwrap_err();

    assert!(err.message.contains("Security"), "{}", err.message);
    assert!(!utf8(dir.path()).join("escape.dds").exists());
    handle.abort();
}

#[tokio::test]
async fn engine_syncs_against_local_hub() {
    let hits = Arc::new(Hits::default());
    let (addr, handle) = start_hub(hits.clone()).await;
    let dir = tempdir().unwrap();
    let root = utf8(dir.path());
    let client = reqwest::Client::new();
    let engine = SyncEngine::with_components(
        Arc::new(HubContentStore::new(client, SyncOptions::default())),
        fake_host(),
        EngineConfig::single_endpoint(format!("http://{addr}")),
    );

    let req = SyncRequest::from_catalog(&VariantCatalog::builtin(), "Base", root.clone(), true)
        .unwrap();
    let outcome = engine.run(&req, None).await;

    assert!(outcome.is_success(), "{outcome:?}");
    let report = outcome.report().unwrap();
    assert_eq!(report.files_fetched, 3);
    assert_eq!(report.files_removed, 1);
    assert!(report.diagnostics_uploaded);
    assert_eq!(hits.commits.load(Ordering::SeqCst), 1);
    assert_eq!(
        tree(&root.join("Texture++ Base")).into_iter().collect::<Vec<_>>(),
        vec!["Base_4X/.texpp-state.json", "Base_4X/a.dds", "Base_4X/a.ini"]
    );
    handle.abort();
}

#[tokio::test]
async fn size_mismatch_fails_the_sync() {
    let (addr, handle) = start_hub(Arc::default()).await;
    let dir = tempdir().unwrap();
    let root = utf8(dir.path());
    let engine = SyncEngine::with_components(
        Arc::new(HubContentStore::new(reqwest::Client::new(), SyncOptions::default())),
        fake_host(),
        EngineConfig::single_endpoint(format!("http://{addr}")),
    );

    let catalog = VariantCatalog::builtin().with_custom_folders(["Broken"]);
    let req = SyncRequest::from_catalog(&catalog, "Custom", root.clone(), false).unwrap();
    let outcome = engine.run(&req, None).await;

    let (ok, message) = outcome.as_result().unwrap();
    assert!(!ok);
    assert!(message.contains("Broken"), "{message}");
    assert!(message.contains("size mismatch"), "{message}");
    assert!(!root.join("Texture++ Custom/Broken/big.dds").exists());
    handle.abort();
}
