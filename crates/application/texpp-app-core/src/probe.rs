use std::time::Duration;

use camino::Utf8PathBuf;
use texpp_infra::hub::Credentials;
use texpp_infra::probe::{recommend_mirror, BandwidthProbe, ProbeError};
use texpp_pipeline::EngineConfig;

use crate::ports::SpeedProbePort;

/// Bandwidth probe and mirror check against the configured hub endpoints.
pub struct HubSpeedProbe {
    client: reqwest::Client,
    config: EngineConfig,
    cache_dir: Utf8PathBuf,
    timeout: Duration,
}

impl HubSpeedProbe {
    pub fn new(client: reqwest::Client, config: EngineConfig, cache_dir: Utf8PathBuf) -> Self {
        Self {
            client,
            config,
            cache_dir,
            timeout: texpp_config::SPEED_TEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn measure_async(&self, use_mirror: bool) -> Result<f64, ProbeError> {
        let creds = Credentials::new(self.config.endpoint(use_mirror), None);
        BandwidthProbe::new(self.client.clone(), self.cache_dir.clone())
            .with_timeout(self.timeout)
            .measure(&creds)
            .await
    }

    /// True when only the mirror endpoint is reachable.
    pub async fn recommend_mirror(&self) -> bool {
        recommend_mirror(
            &self.client,
            &self.config.primary_endpoint,
            &self.config.mirror_endpoint,
            texpp_config::CONNECTIVITY_TIMEOUT,
        )
        .await
    }
}

impl SpeedProbePort for HubSpeedProbe {
    fn measure(&self, use_mirror: bool) -> anyhow::Result<f64> {
        let rt = crate::async_runtime::runtime()?;
        Ok(rt.block_on(self.measure_async(use_mirror))?)
    }
}
