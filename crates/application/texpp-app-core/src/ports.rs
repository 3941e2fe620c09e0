use crate::domain::Settings;

pub trait SettingsRepo: Send + Sync + 'static {
    fn load(&self) -> anyhow::Result<Settings>;
    fn save(&self, settings: &Settings) -> anyhow::Result<()>;
}

/// Out-of-band bandwidth measurement. Blocking; called from a dedicated thread.
pub trait SpeedProbePort: Send + Sync + 'static {
    fn measure(&self, use_mirror: bool) -> anyhow::Result<f64>;
}
