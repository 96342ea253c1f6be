//! `stencil.yaml` loading.

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::document::DEFAULT_MODEL;
use crate::eval::PollConfig;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

#[derive(Debug)]
pub struct ConfigError(pub String);

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConfigError: {}", self.0)
    }
}
impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StencilConfig {
    pub version: u32,
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default)]
    pub poll: PollSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSettings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from(".stencil/stencil.db")
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_interval_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    60
}

impl Default for StencilConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            database: default_database(),
            default_model: default_model(),
            poll: PollSettings::default(),
        }
    }
}

impl StencilConfig {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(self.poll.interval_secs),
            max_attempts: self.poll.max_attempts,
        }
    }
}

pub fn load_config(path: &Path) -> Result<StencilConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    let cfg: StencilConfig = serde_yaml::from_str(&raw)
        .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;
    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }
    if cfg.poll.max_attempts == 0 {
        return Err(ConfigError("poll.max_attempts must be at least 1".into()));
    }
    Ok(cfg)
}
