//! Bridge configuration.
//!
//! Configuration is TOML on disk, JSON when the host app passes it at init,
//! or `CTV_*` environment variables. Every source is validated the same way.
//!
//! ```toml
//! channel_name = "com.example.casttotvscreen/casting"
//! engine = "placeholder"  # "placeholder" | "simulated"
//! log_level = "info"
//!
//! [capture]
//! target_fps = 30
//! width = 1280
//! height = 720
//!
//! [session]
//! permission_timeout_ms = 30000
//! connect_timeout_ms = 10000
//! capture_timeout_ms = 10000
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::command::CHANNEL_NAME;
use crate::platform::CaptureSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("failed to parse config JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Which command handler backs the channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Answer every recognized command with synthetic success
    #[default]
    Placeholder,
    /// Run the capture session engine against the simulated platform
    Simulated,
}

impl FromStr for EngineKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "placeholder" => Ok(EngineKind::Placeholder),
            "simulated" => Ok(EngineKind::Simulated),
            other => Err(ConfigError::ValidationError(format!(
                "unknown engine '{}', expected 'placeholder' or 'simulated'",
                other
            ))),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Placeholder => write!(f, "placeholder"),
            EngineKind::Simulated => write!(f, "simulated"),
        }
    }
}

/// Deadlines for the session setup steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub permission_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub capture_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            permission_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            capture_timeout_ms: 10_000,
        }
    }
}

impl SessionConfig {
    pub fn permission_timeout(&self) -> Duration {
        Duration::from_millis(self.permission_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub channel_name: String,
    pub engine: EngineKind,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub capture: CaptureSettings,
    pub session: SessionConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel_name: CHANNEL_NAME.to_string(),
            engine: EngineKind::default(),
            log_level: "info".to_string(),
            log_file: None,
            capture: CaptureSettings::default(),
            session: SessionConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        config.validate()?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse the JSON blob handed over by the host app at init.
    /// An empty string means defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Build from defaults overlaid with variables from `lookup`.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup("CTV_CHANNEL_NAME") {
            config.channel_name = name;
        }
        if let Some(engine) = lookup("CTV_ENGINE") {
            config.engine = engine.parse()?;
        }
        if let Some(level) = lookup("CTV_LOG_LEVEL").or_else(|| lookup("RUST_LOG")) {
            config.log_level = level;
        }
        if let Some(file) = lookup("CTV_LOG_FILE") {
            config.log_file = Some(PathBuf::from(file));
        }
        if let Some(fps) = lookup("CTV_CAPTURE_FPS") {
            config.capture.target_fps = fps.parse().map_err(|_| {
                ConfigError::ValidationError(format!("CTV_CAPTURE_FPS is not a number: {}", fps))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "channel_name must not be empty".to_string(),
            ));
        }
        if self.capture.target_fps == 0 || self.capture.target_fps > 60 {
            return Err(ConfigError::ValidationError(
                "capture.target_fps must be between 1 and 60".to_string(),
            ));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(ConfigError::ValidationError(
                "capture.width and capture.height must be non-zero".to_string(),
            ));
        }
        if self.session.permission_timeout_ms == 0
            || self.session.connect_timeout_ms == 0
            || self.session.capture_timeout_ms == 0
        {
            return Err(ConfigError::ValidationError(
                "session timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
