//! Host and network facts recorded in the diagnostic log.

use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde_json::{json, Map, Value};
use sysinfo::{Disks, System};
use tracing::debug;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

fn gb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_GB * 100.0).round() / 100.0
}

fn collect_hardware() -> Value {
    let mut sys = System::new_all();
    sys.refresh_all();

    let physical_cores = sys.physical_core_count();
    let mut cpus: Vec<Value> = Vec::new();
    let mut seen_brands: Vec<&str> = Vec::new();
    for cpu in sys.cpus() {
        let brand = cpu.brand().trim();
        if !seen_brands.contains(&brand) {
            seen_brands.push(brand);
            cpus.push(json!({ "Name": brand, "Cores": physical_cores }));
        }
    }

    let disks = Disks::new_with_refreshed_list();
    let disk_info: Vec<Value> = disks
        .list()
        .iter()
        .map(|d| {
            json!({
                "Drive": d.mount_point().to_string_lossy(),
                "TotalSpace_GB": gb(d.total_space()),
                "FreeSpace_GB": gb(d.available_space()),
            })
        })
        .collect();

    let os = format!(
        "{} {} ({})",
        System::name().unwrap_or_else(|| "Unknown".into()),
        System::os_version().unwrap_or_default(),
        std::env::consts::ARCH,
    );

    json!({
        "Hostname": System::host_name().unwrap_or_default(),
        "OSVersion": os,
        "CPU": cpus,
        "RAM": gb(sys.total_memory()),
        "Disk_Info": disk_info,
    })
}

/// Hardware snapshot (hostname, OS, CPUs, RAM, disks).
///
/// Enumeration runs on the blocking pool; a panic there comes back as `Err`.
pub async fn hardware_snapshot() -> Result<Value, String> {
    tokio::task::spawn_blocking(collect_hardware)
        .await
        .map_err(|e| e.to_string())
}

/// Public IP and geolocation details, or `None` when the lookup fails.
pub async fn network_info(client: &Client, url: &str) -> Option<Value> {
    let resp = client
        .get(url)
        .timeout(texpp_config::LOOKUP_TIMEOUT)
        .send()
        .await
        .map_err(|e| debug!("network info lookup failed: {e}"))
        .ok()?;
    let value: Value = resp
        .json()
        .await
        .map_err(|e| debug!("network info decode failed: {e}"))
        .ok()?;
    match &value {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        _ => Some(value),
    }
}

/// Current UTC time to the second (`YYYY-MM-DDTHH:MM:SS`).
///
/// Asks the time service first and falls back to the local clock.
pub async fn utc_timestamp(client: &Client, url: &str) -> String {
    match remote_utc(client, url).await {
        Some(ts) => ts,
        None => local_utc_timestamp(),
    }
}

pub fn local_utc_timestamp() -> String {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    now.trim_end_matches('Z').to_string()
}

async fn remote_utc(client: &Client, url: &str) -> Option<String> {
    let resp = client
        .get(url)
        .timeout(texpp_config::LOOKUP_TIMEOUT)
        .send()
        .await
        .ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let body: Map<String, Value> = resp.json().await.ok()?;
    let date_time = body.get("dateTime")?.as_str()?;
    let trimmed = date_time.split('.').next()?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
