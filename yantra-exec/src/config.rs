//! Configuration loading for YantraExec

use crate::error::{ExecError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Execution-side tunables.
#[derive(Clone, Debug, Deserialize)]
pub struct ExecConfig {
    /// Whether this host may load/unload and activate/deactivate controllers
    #[serde(default)]
    pub manage_controllers: bool,

    /// Maximum age of a cached controller state before it is refreshed (seconds)
    #[serde(default = "default_cache_age_secs")]
    pub state_cache_age_secs: f64,

    /// Multiplicative slack on the expected trajectory duration
    #[serde(default = "default_timeout_scale")]
    pub timeout_scale: f64,

    /// Additive slack on the expected trajectory duration (seconds)
    #[serde(default = "default_timeout_pad_secs")]
    pub timeout_pad_secs: f64,

    /// Log the full contents of pushed execution contexts
    #[serde(default)]
    pub verbose: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            manage_controllers: false,
            state_cache_age_secs: default_cache_age_secs(),
            timeout_scale: default_timeout_scale(),
            timeout_pad_secs: default_timeout_pad_secs(),
            verbose: false,
        }
    }
}

fn default_cache_age_secs() -> f64 {
    1.0
}
fn default_timeout_scale() -> f64 {
    1.1
}
fn default_timeout_pad_secs() -> f64 {
    0.5
}

impl ExecConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ExecError::Config(format!("Failed to read config file: {}", e)))?;
        let config: ExecConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn state_cache_age(&self) -> Duration {
        Duration::from_secs_f64(self.state_cache_age_secs)
    }

    pub fn timeout_pad(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_pad_secs)
    }
}
