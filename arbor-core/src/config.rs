//! Configuration management for Arbor
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (ARBOR_*)
//! 3. Config file (~/.config/arbor/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Clone-related configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CloneSettings {
    /// Name given to the remote created by a clone
    pub remote: String,

    /// Verify TLS certificates when fetching
    pub verify_certificates: bool,

    /// Log transfer and checkout progress at debug level
    pub log_progress: bool,
}

impl Default for CloneSettings {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            verify_certificates: true,
            log_progress: true,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Clone configuration
    pub clone: CloneSettings,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config {}: {}", path.display(), e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/arbor/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("arbor").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - ARBOR_REMOTE: Remote name for clones
    /// - ARBOR_VERIFY_CERTIFICATES: true/false
    /// - ARBOR_PROGRESS: true/false, log clone progress
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(remote) = get("ARBOR_REMOTE").filter(|r| !r.is_empty()) {
            self.clone.remote = remote;
        }

        if let Some(value) = get("ARBOR_VERIFY_CERTIFICATES") {
            match parse_bool(&value) {
                Some(verify) => self.clone.verify_certificates = verify,
                None => tracing::warn!(value = %value, "Ignoring invalid ARBOR_VERIFY_CERTIFICATES"),
            }
        }

        if let Some(value) = get("ARBOR_PROGRESS") {
            match parse_bool(&value) {
                Some(progress) => self.clone.log_progress = progress,
                None => tracing::warn!(value = %value, "Ignoring invalid ARBOR_PROGRESS"),
            }
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, remote: Option<String>, insecure: bool) -> Self {
        if let Some(r) = remote {
            self.clone.remote = r;
        }

        if insecure {
            self.clone.verify_certificates = false;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(remote: Option<String>, insecure: bool) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(remote, insecure))
    }
}
