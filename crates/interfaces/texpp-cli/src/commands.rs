use crate::{CliEnv, InstallArgs, SettingsOverrides};
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use texpp_app_core::{AppEvent, HubSpeedProbe, InstallerApp, Settings};
use texpp_core::{DownloadEstimate, VariantCatalog};
use texpp_pipeline::sync::INTERRUPTED_MESSAGE;
use texpp_pipeline::{HubContentStore, SyncEngine, SyncEvent, SyncOptions, SyncOutcome};

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    pb
}

fn build_app(env: &CliEnv, options: SyncOptions) -> InstallerApp {
    let store = Arc::new(HubContentStore::new(env.client.clone(), options));
    let engine = SyncEngine::with_components(store, env.host.clone(), env.config.clone());
    InstallerApp::new(Arc::new(engine), Arc::new(env.persistence.clone()))
}

fn speed_probe(env: &CliEnv) -> Result<HubSpeedProbe> {
    let cache_dir = env
        .persistence
        .cache_dir()?
        .join(texpp_config::SPEED_TEST_CACHE_DIR);
    let cache_dir = Utf8PathBuf::from_path_buf(cache_dir)
        .map_err(|p| anyhow::anyhow!("Cache path is not valid UTF-8: {}", p.display()))?;
    Ok(HubSpeedProbe::new(
        env.client.clone(),
        env.config.clone(),
        cache_dir,
    ))
}

/// Runs the bandwidth probe on its worker thread and waits for the result.
async fn measure_bandwidth(env: &CliEnv, app: &mut InstallerApp) -> Result<()> {
    app.start_speed_probe(Arc::new(speed_probe(env)?))?;

    let pb = spinner("Measuring internet speed...");
    while let Some(event) = app.next_event().await {
        if matches!(event, AppEvent::SpeedMeasured { .. }) {
            break;
        }
    }
    pb.finish_and_clear();
    Ok(())
}

fn print_bandwidth(app: &InstallerApp) {
    match (app.state.bandwidth_mbps, &app.state.probe_error) {
        (_, Some(err)) => println!("   Speed:    unavailable ({err})"),
        (Some(mbps), None) => println!("   Speed:    {mbps:.2} Mbps"),
        (None, None) => {}
    }
}

pub fn cmd_variants() {
    println!(":: Available variants");
    let catalog = VariantCatalog::builtin();
    for v in catalog.variants() {
        let folders = if v.folders.is_empty() {
            "chosen with --folders".to_string()
        } else {
            v.folders.join(", ")
        };
        let target = if v.installs_into_root() {
            "<mods folder>"
        } else {
            v.local_dir.as_str()
        };
        println!("   {:<20} {:<32} -> {}", v.label, folders, target);
    }
    println!(
        "   Folders usable with --folders: {}",
        catalog.known_folders().join(", ")
    );
}

pub async fn cmd_estimate(
    env: &CliEnv,
    overrides: SettingsOverrides,
    folders: Vec<String>,
    mbps: Option<f64>,
) -> Result<DownloadEstimate> {
    let mut app = build_app(env, SyncOptions::default());
    app.load_settings()?;
    app.state.settings = overrides.apply(app.state.settings.clone());
    app.set_custom_folders(&folders);

    println!(":: Download estimate");
    println!("   Variant:  {}", app.state.settings.variant);
    if let Some(layout) = app.layout() {
        println!("   Install:  {}", layout.display_path());
    }

    match mbps {
        Some(mbps) => app.state.bandwidth_mbps = Some(mbps),
        None if app.estimate().is_pending() => measure_bandwidth(env, &mut app).await?,
        None => {}
    }
    print_bandwidth(&app);

    let estimate = app.estimate();
    println!("   {estimate}");
    Ok(estimate)
}

pub async fn cmd_install(env: &CliEnv, args: InstallArgs) -> Result<SyncOutcome> {
    let saved = env
        .persistence
        .load_settings()?
        .normalized(&VariantCatalog::builtin());
    let settings = args.overrides.apply(saved);
    let options = SyncOptions {
        max_threads: settings.max_threads,
        rate_limit_bytes: args.limit_mb.map(|mb| mb * 1024 * 1024),
    };

    let mut app = build_app(env, options);
    app.state.settings = settings;
    app.set_custom_folders(&args.folders);

    println!(":: Installing Texture++ {}", app.state.settings.variant);
    println!("   Mods:     {}", app.state.settings.mods_folder.trim());
    if let Some(layout) = app.layout() {
        println!("   Target:   {}", layout.display_path());
    }
    println!(
        "   Endpoint: {}",
        env.config.endpoint(app.state.settings.use_mirror)
    );

    if !args.skip_speed_test {
        measure_bandwidth(env, &mut app).await?;
        print_bandwidth(&app);
    }
    let estimate = app.estimate();
    if !estimate.is_pending() {
        println!("   {estimate}");
    }

    app.start_install(args.tokens)?;

    let pb = spinner("Starting...");
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;

    while app.is_running() {
        tokio::select! {
            event = app.next_event() => match event {
                Some(AppEvent::Sync { event: SyncEvent::Status(text), .. }) => pb.set_message(text),
                Some(AppEvent::Sync {
                    event: SyncEvent::FolderFinished { folder, fetched, skipped },
                    ..
                }) => pb.println(format!("   {folder}: {fetched} fetched, {skipped} up to date")),
                Some(AppEvent::Sync { event: SyncEvent::Swept { removed }, .. }) => {
                    pb.println(format!("   Removed {removed} unused files"))
                }
                Some(_) => {}
                None => break,
            },
            _ = &mut ctrl_c, if !stopping => {
                stopping = true;
                app.cancel();
                pb.set_message("Stopping after the current folder...");
            }
        }
    }
    pb.finish_and_clear();

    let outcome = app
        .state
        .outcome
        .clone()
        .context("Sync worker stopped without reporting a result")?;

    match &outcome {
        SyncOutcome::Succeeded { message, report } => {
            println!("\n:: {message}");
            println!("   Folders:   {}", report.folders_fetched);
            println!(
                "   Fetched:   {} files ({})",
                report.files_fetched,
                format_size(report.bytes_fetched, DECIMAL)
            );
            println!("   Unchanged: {}", report.files_skipped);
            println!("   Removed:   {}", report.files_removed);
            println!(
                "   Log:       {}",
                if report.diagnostics_uploaded {
                    "uploaded"
                } else {
                    "not uploaded"
                }
            );
        }
        SyncOutcome::Failed { message } => anyhow::bail!("{message}"),
        SyncOutcome::Interrupted => println!("\n{INTERRUPTED_MESSAGE}"),
    }

    Ok(outcome)
}

pub async fn cmd_speed_test(env: &CliEnv, use_mirror: bool) -> Result<f64> {
    println!(":: Measuring download speed...");
    println!("   Endpoint: {}", env.config.endpoint(use_mirror));

    let mut app = build_app(env, SyncOptions::default());
    app.state.settings.use_mirror = use_mirror;
    measure_bandwidth(env, &mut app).await?;

    if let Some(err) = &app.state.probe_error {
        anyhow::bail!("Speed test failed: {err}");
    }
    let mbps = app.state.bandwidth_mbps.unwrap_or(0.0);
    println!("   Result:   {mbps:.2} Mbps");
    Ok(mbps)
}

/// Returns true when the mirror should be used.
pub async fn cmd_mirror_check(env: &CliEnv) -> Result<bool> {
    println!(":: Checking connectivity...");
    println!("   Primary: {}", env.config.primary_endpoint);
    println!("   Mirror:  {}", env.config.mirror_endpoint);

    let use_mirror = speed_probe(env)?.recommend_mirror().await;
    if use_mirror {
        println!("   Primary endpoint unreachable; use the mirror (--mirror).");
    } else {
        println!("   Use the primary endpoint.");
    }
    Ok(use_mirror)
}

fn print_settings(settings: &Settings) {
    let folder = settings.mods_folder.trim();
    println!(
        "   Mods folder: {}",
        if folder.is_empty() { "(not set)" } else { folder }
    );
    println!("   Variant:     {}", settings.variant);
    println!("   Mirror:      {}", settings.use_mirror);
    println!("   Threads:     {}", settings.max_threads);
}

pub fn cmd_settings_show(env: &CliEnv) -> Result<Settings> {
    let settings = env
        .persistence
        .load_settings()?
        .normalized(&VariantCatalog::builtin());

    println!(":: Settings");
    println!("   File:        {}", env.persistence.settings_path()?.display());
    print_settings(&settings);
    Ok(settings)
}

pub fn cmd_settings_set(env: &CliEnv, overrides: SettingsOverrides) -> Result<Settings> {
    if overrides.is_empty() {
        anyhow::bail!("Nothing to change; pass at least one option");
    }
    let catalog = VariantCatalog::builtin();
    if let Some(variant) = &overrides.variant {
        if !catalog.contains(variant) {
            anyhow::bail!("Unknown variant '{variant}'. Run `texpp variants` to list them.");
        }
    }

    let current = env.persistence.load_settings()?.normalized(&catalog);
    let settings = overrides.apply(current);
    env.persistence.save_settings(&settings)?;

    println!(":: Saved settings");
    print_settings(&settings);
    Ok(settings)
}
