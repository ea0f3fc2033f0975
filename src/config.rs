// Configuration loading and parsing (config/coordinator.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    Validation { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Top-level configuration. Every section (and every field) has a default,
/// so a missing config file and a partial one are both fine.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub draft: DraftSettings,
    pub render: RenderConfig,
}

/// `[gateway]` section: where the chat bridge connects.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig { port: 9320 }
    }
}

/// `[draft]` section: game pacing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DraftSettings {
    /// Turn clock in seconds. 30 minutes unless overridden.
    pub turn_seconds: u64,
}

impl Default for DraftSettings {
    fn default() -> Self {
        DraftSettings { turn_seconds: 1800 }
    }
}

impl DraftSettings {
    pub fn turn_duration(&self) -> Duration {
        Duration::from_secs(self.turn_seconds)
    }
}

/// `[render]` section: summary shaping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// How many remaining options a summary previews.
    pub preview_limit: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig { preview_limit: 10 }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load configuration from `config/coordinator.toml` under the current
/// working directory. A missing file yields the built-in defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(Path::new("."))
}

/// Load configuration from `config/coordinator.toml` under `base_dir`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("coordinator.toml");
    if !path.exists() {
        let config = Config::default();
        validate(&config)?;
        return Ok(config);
    }
    let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
        path: path.clone(),
        source: e,
    })?;
    parse(&text, &path)
}

fn parse(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.gateway.port == 0 {
        return Err(ConfigError::Validation {
            field: "gateway.port".to_string(),
            message: "port must be non-zero".to_string(),
        });
    }
    if config.draft.turn_seconds == 0 {
        return Err(ConfigError::Validation {
            field: "draft.turn_seconds".to_string(),
            message: "turn clock must be at least one second".to_string(),
        });
    }
    if config.render.preview_limit == 0 {
        return Err(ConfigError::Validation {
            field: "render.preview_limit".to_string(),
            message: "preview must show at least one option".to_string(),
        });
    }
    Ok(())
}
