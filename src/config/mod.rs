//! Configuration module
//!
//! Settings are read from `config.toml` in the platform config directory
//! and are never written back.

mod settings;

pub use settings::{AppConfig, GpsConfig, LoginConfig, TerminalConfig};

use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid configuration TOML
    #[error("Invalid configuration {}: {source}", path.display())]
    Parse {
        /// File that failed (empty when parsing a string)
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("org", "sppterm", "sppterm").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default configuration file
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}
