use axum::extract::Path as UrlPath;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{body::Body, Router};
use camino::Utf8PathBuf;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;
use texpp_app_core::FilePersistence;
use texpp_cli::{commands, CliEnv, InstallArgs, SettingsOverrides};
use texpp_core::DownloadEstimate;
use texpp_pipeline::{EngineConfig, HostProbe};

struct FakeHost;

#[async_trait::async_trait]
impl HostProbe for FakeHost {
    async fn utc_timestamp(&self) -> String {
        "2024-03-04T05:06:07".into()
    }

    async fn network_info(&self) -> Option<Value> {
        None
    }

    async fn hardware_snapshot(&self) -> Result<Value, String> {
        Ok(json!({ "hostname": "e2e" }))
    }
}

const BASE_LISTING: &str = r#"[
    {"type":"file","path":"Base_4X/a.ini","size":16,"oid":"1"},
    {"type":"file","path":"Base_4X/a.dds","size":5,"oid":"2"}
]"#;

async fn start_mock_hub(commits: Arc<AtomicUsize>) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let content_repo = texpp_config::CONTENT_REPO_ID;
    let log_repo = texpp_config::LOG_REPO_ID;
    let probe_repo = texpp_config::SPEED_TEST_REPO_ID;
    let probe_file = texpp_config::SPEED_TEST_FILENAME;

    let app = Router::new()
        .route("/", get(|| async { "hub" }))
        .route(
            &format!("/api/datasets/{content_repo}/tree/main/*path"),
            get(|UrlPath(path): UrlPath<String>| async move {
                match path.trim_matches('/') {
                    "Base_4X" => BASE_LISTING.into_response(),
                    _ => StatusCode::NOT_FOUND.into_response(),
                }
            }),
        )
        .route(
            &format!("/datasets/{content_repo}/resolve/main/*path"),
            get(|UrlPath(path): UrlPath<String>| async move {
                match path.trim_start_matches('/') {
                    "Base_4X/a.ini" => Body::from("filename = a.dds").into_response(),
                    "Base_4X/a.dds" => Body::from("AAAAA").into_response(),
                    _ => StatusCode::NOT_FOUND.into_response(),
                }
            }),
        )
        .route(
            &format!("/{probe_repo}/resolve/main/{probe_file}"),
            get(|| async { Body::from(vec![7u8; 64 * 1024]) }),
        )
        .route(
            &format!("/api/datasets/{log_repo}/commit/main"),
            post(move || {
                let commits = commits.clone();
                async move {
                    commits.fetch_add(1, Ordering::SeqCst);
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

fn env_for(config: EngineConfig, config_dir: &Path) -> CliEnv {
    CliEnv {
        client: reqwest::Client::new(),
        config,
        persistence: FilePersistence::in_dir(config_dir),
        host: Arc::new(FakeHost),
    }
}

fn install_args(mods: &Utf8PathBuf, variant: &str) -> InstallArgs {
    InstallArgs {
        overrides: SettingsOverrides {
            mods_folder: Some(mods.clone()),
            variant: Some(variant.to_string()),
            ..SettingsOverrides::default()
        },
        skip_speed_test: true,
        ..InstallArgs::default()
    }
}

#[tokio::test]
async fn install_fetches_sweeps_and_converges() {
    let commits = Arc::new(AtomicUsize::new(0));
    let (addr, handle) = start_mock_hub(commits.clone()).await;
    let config_dir = tempdir().unwrap();
    let mods_dir = tempdir().unwrap();
    let mods = Utf8PathBuf::from_path_buf(mods_dir.path().to_path_buf()).unwrap();
    let env = env_for(
        EngineConfig::single_endpoint(format!("http://{addr}")),
        config_dir.path(),
    );

    let install = mods.join("Texture++ Base");
    std::fs::create_dir_all(install.join("Base_4X")).unwrap();
    std::fs::write(install.join("Base_4X/stale.dds"), "old").unwrap();

    let outcome = commands::cmd_install(&env, install_args(&mods, "Base"))
        .await
        .unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(report.files_fetched, 2);
    assert_eq!(report.bytes_fetched, 21);
    assert_eq!(report.files_removed, 1);
    assert!(report.diagnostics_uploaded);
    assert_eq!(
        std::fs::read_to_string(install.join("Base_4X/a.dds")).unwrap(),
        "AAAAA"
    );
    assert!(!install.join("Base_4X/stale.dds").exists());
    assert_eq!(commits.load(Ordering::SeqCst), 1);

    let saved = env.persistence.load_settings().unwrap();
    assert_eq!(saved.variant, "Base");
    assert_eq!(saved.mods_folder, mods.as_str());

    // Settings now carry the selection; a bare install repeats it.
    let args = InstallArgs {
        skip_speed_test: true,
        ..InstallArgs::default()
    };
    let again = commands::cmd_install(&env, args).await.unwrap();
    let report = again.report().unwrap();
    assert_eq!(report.files_fetched, 0);
    assert_eq!(report.files_skipped, 2);
    assert_eq!(report.files_removed, 0);
    assert_eq!(commits.load(Ordering::SeqCst), 2);
    handle.abort();
}

#[tokio::test]
async fn missing_remote_folder_fails_the_install() {
    let (addr, handle) = start_mock_hub(Arc::default()).await;
    let config_dir = tempdir().unwrap();
    let mods_dir = tempdir().unwrap();
    let mods = Utf8PathBuf::from_path_buf(mods_dir.path().to_path_buf()).unwrap();
    let env = env_for(
        EngineConfig::single_endpoint(format!("http://{addr}")),
        config_dir.path(),
    );

    let mut args = install_args(&mods, "Custom");
    args.folders = vec!["Base_4X".into(), "Missing".into()];
    let err = commands::cmd_install(&env, args).await.unwrap_err();

    assert!(
        err.to_string()
            .contains("An error occurred while downloading 'Missing'"),
        "{err}"
    );
    assert!(mods.join("Texture++ Custom/Base_4X/a.dds").exists());
    handle.abort();
}

#[tokio::test]
async fn empty_custom_selection_is_rejected() {
    let config_dir = tempdir().unwrap();
    let mods_dir = tempdir().unwrap();
    let mods = Utf8PathBuf::from_path_buf(mods_dir.path().to_path_buf()).unwrap();
    let env = env_for(
        EngineConfig::single_endpoint("http://127.0.0.1:9"),
        config_dir.path(),
    );

    let err = commands::cmd_install(&env, install_args(&mods, "Custom"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no folders selected"), "{err}");
    assert!(!config_dir.path().join("settings.json").exists());
}

#[tokio::test]
async fn speed_test_measures_against_the_hub() {
    let (addr, handle) = start_mock_hub(Arc::default()).await;
    let config_dir = tempdir().unwrap();
    let env = env_for(
        EngineConfig::single_endpoint(format!("http://{addr}")),
        config_dir.path(),
    );

    let mbps = commands::cmd_speed_test(&env, false).await.unwrap();

    assert!(mbps > 0.0);
    assert!(!config_dir
        .path()
        .join("cache")
        .join(texpp_config::SPEED_TEST_CACHE_DIR)
        .exists());
    handle.abort();
}

#[tokio::test]
async fn mirror_is_recommended_when_primary_is_down() {
    let (addr, handle) = start_mock_hub(Arc::default()).await;
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let config_dir = tempdir().unwrap();

    let down = EngineConfig {
        primary_endpoint: format!("http://{dead}"),
        mirror_endpoint: format!("http://{addr}"),
        ..EngineConfig::default()
    };
    let env = env_for(down, config_dir.path());
    assert!(commands::cmd_mirror_check(&env).await.unwrap());

    let up = env_for(
        EngineConfig::single_endpoint(format!("http://{addr}")),
        config_dir.path(),
    );
    assert!(!commands::cmd_mirror_check(&up).await.unwrap());
    handle.abort();
}

#[tokio::test]
async fn estimate_uses_given_bandwidth() {
    let config_dir = tempdir().unwrap();
    let mods_dir = tempdir().unwrap();
    let mods = Utf8PathBuf::from_path_buf(mods_dir.path().to_path_buf()).unwrap();
    let env = env_for(EngineConfig::default(), config_dir.path());

    let overrides = SettingsOverrides {
        mods_folder: Some(mods.clone()),
        variant: Some("Core".into()),
        ..SettingsOverrides::default()
    };
    let estimate = commands::cmd_estimate(&env, overrides.clone(), Vec::new(), Some(1000.0))
        .await
        .unwrap();
    assert_eq!(
        estimate.to_string(),
        "Estimated download time: 4 minutes"
    );

    std::fs::create_dir_all(mods.join("Texture++ Core")).unwrap();
    let estimate = commands::cmd_estimate(&env, overrides, Vec::new(), Some(1000.0))
        .await
        .unwrap();
    assert_eq!(estimate, DownloadEstimate::ExistingInstall);
}

#[test]
fn settings_set_then_show() {
    let config_dir = tempdir().unwrap();
    let env = env_for(EngineConfig::default(), config_dir.path());

    let saved = commands::cmd_settings_set(
        &env,
        SettingsOverrides {
            variant: Some("Finale".into()),
            use_mirror: Some(true),
            ..SettingsOverrides::default()
        },
    )
    .unwrap();
    assert_eq!(saved.variant, "Finale");

    let shown = commands::cmd_settings_show(&env).unwrap();
    assert_eq!(shown, saved);
    assert!(shown.use_mirror);

    let err = commands::cmd_settings_set(
        &env,
        SettingsOverrides {
            variant: Some("Ultra".into()),
            ..SettingsOverrides::default()
        },
    )
    .unwrap_err();
    assert!(err.to_string().contains("Unknown variant 'Ultra'"));
    assert!(commands::cmd_settings_set(&env, SettingsOverrides::default()).is_err());
}
