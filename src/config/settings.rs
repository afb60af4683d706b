//! Application settings

use super::ConfigError;
use crate::core::codec::{CommandEncoder, LineEnding};
use crate::core::filter::Dialect;
use crate::core::session::SessionOptions;
use crate::core::transport::TransportSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Terminal settings
    pub terminal: TerminalConfig,
    /// Login pacing
    pub login: LoginConfig,
    /// GPS command pacing
    pub gps: GpsConfig,
    /// Transport adapter
    pub transport: TransportSettings,
    /// Classifier keyword lists and patterns
    pub dialect: Dialect,
}

impl AppConfig {
    /// Load `config.toml` from the platform config directory.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match super::config_file() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: Default::default(),
            source,
        })
    }

    /// Settings for the session controller
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            encoder: CommandEncoder::new(
                self.terminal.hex_mode,
                self.terminal.checksum,
                self.terminal.line_ending,
            ),
            login_timeout: Duration::from_millis(self.login.timeout_ms),
            settle_delay: Duration::from_millis(self.login.settle_delay_ms),
            gps_line_delay: Duration::from_millis(self.gps.line_delay_ms),
            dialect: self.dialect.clone(),
        }
    }
}

/// Terminal settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Commands are typed as hex digits
    pub hex_mode: bool,
    /// Append and verify modulo-256 checksum tokens
    pub checksum: bool,
    /// Command terminator
    pub line_ending: LineEnding,
    /// Prefix transcript lines with the time
    pub show_timings: bool,
    /// Show direction arrows in the transcript
    pub show_direction: bool,
}

/// Login pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Deadline for reaching a shell prompt
    pub timeout_ms: u64,
    /// Pause before each step
    pub settle_delay_ms: u64,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 8000,
            settle_delay_ms: 500,
        }
    }
}

/// GPS command pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    /// Pause before each line of the position block
    pub line_delay_ms: u64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self { line_delay_ms: 50 }
    }
}
