//! Configuration management for the obexftpd server.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/obexftpd/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("root_path must be an absolute path, got {0}")]
    RelativeRootPath(PathBuf),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("mime override for {0:?} has an empty type")]
    EmptyMimeOverride(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for obexftpd.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// Folder browsing service configuration.
    pub ftp: FtpConfig,

    /// Storage volume configuration.
    pub storage: StorageConfig,

    /// MIME classification configuration.
    pub mime: MimeConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Folder browsing service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FtpConfig {
    /// Shared folder clients browse. Clients can never leave it.
    pub root_path: PathBuf,
}

/// Storage volume configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Bytes that must stay free after an upload (default: 1MB).
    pub reserve_bytes: u64,
}

/// MIME classification configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct MimeConfig {
    /// Extension to MIME type mappings layered over the built-in table.
    pub overrides: BTreeMap<String, String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            reserve_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("obexftpd")
        .join("config.toml")
}

/// Returns the default shared folder.
fn default_root_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/"))
        .join("Shared")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - OBEXFTPD_ROOT: Override the shared folder
    /// - OBEXFTPD_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("OBEXFTPD_ROOT") {
            if !root.is_empty() {
                tracing::info!("Overriding root_path from environment: {}", root);
                self.ftp.root_path = PathBuf::from(root);
            }
        }

        if let Ok(level) = std::env::var("OBEXFTPD_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.daemon.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ftp.root_path.is_absolute() {
            return Err(ConfigError::RelativeRootPath(self.ftp.root_path.clone()));
        }

        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        if let Some((ext, _)) = self.mime.overrides.iter().find(|(_, mime)| mime.trim().is_empty()) {
            return Err(ConfigError::EmptyMimeOverride(ext.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
