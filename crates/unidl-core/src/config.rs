//! User configuration loaded from `~/.config/unidl/config.toml`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::platform::Platform;

/// Pacing of the simulated engine (optional `[engine]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay between simulated progress steps, in milliseconds.
    pub step_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { step_delay_ms: 400 }
    }
}

impl EngineConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

/// Global configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnidlConfig {
    /// Interval of the job-status poll fallback, in milliseconds.
    pub poll_interval_ms: u64,
    /// Directory downloads are written to.
    pub output_dir: String,
    /// Preferred resolution, used to pre-select a format (e.g. "1080p").
    pub preferred_resolution: String,
    /// Platform used when none is given and detection finds nothing specific.
    #[serde(default)]
    pub default_platform: Option<Platform>,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for UnidlConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            output_dir: "Downloads".to_string(),
            preferred_resolution: "1080p".to_string(),
            default_platform: None,
            engine: EngineConfig::default(),
        }
    }
}

impl UnidlConfig {
    /// Poll interval, never below 50 ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(50))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("unidl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<UnidlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = UnidlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: UnidlConfig = toml::from_str(&data)?;
    Ok(cfg)
}
