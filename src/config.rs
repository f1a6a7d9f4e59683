//! Editor configuration.
//!
//! Layered the usual way: built-in defaults, then an optional `attune.toml`,
//! then `ATTUNE_`-prefixed environment variables (e.g. `ATTUNE_BASE_URL`,
//! `ATTUNE_LOGGING__LEVEL`).

use crate::error::SyncError;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for an editing session against the agent backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Base URL of the agent backend, e.g. `https://agents.internal.example`.
    #[serde(default)]
    pub base_url: String,

    /// Operator identifier sent with every update.
    #[serde(default)]
    pub user_id: String,

    /// Workspace scope sent with every update.
    #[serde(default = "default_workspace_id")]
    pub workspace_id: String,

    /// Settle window in milliseconds before a coalesced write is sent.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Per-request timeout in milliseconds for backend calls.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Logging section.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_workspace_id() -> String {
    "1".to_string()
}

fn default_settle_ms() -> u64 {
    500
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            user_id: String::new(),
            workspace_id: default_workspace_id(),
            settle_ms: default_settle_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the default file name and environment.
    pub fn load() -> Result<EditorConfig, SyncError> {
        Self::build(File::with_name("attune").required(false))
    }

    /// Load configuration from a specific file, then environment.
    pub fn load_from_file(path: &Path) -> Result<EditorConfig, SyncError> {
        Self::build(File::from(path))
    }

    fn build(file: File<config::FileSourceFile, config::FileFormat>) -> Result<EditorConfig, SyncError> {
        let defaults = Config::try_from(&EditorConfig::default())
            .map_err(|e| SyncError::ConfigError(e.to_string()))?;
        Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(Environment::with_prefix("ATTUNE").separator("__"))
            .build()
            .and_then(|merged| merged.try_deserialize())
            .map_err(|e| SyncError::ConfigError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert!(config.base_url.is_empty());
        assert_eq!(config.workspace_id, "1");
        assert_eq!(config.settle_ms, 500);
        assert_eq!(config.request_timeout_ms, 10_000);
        assert!(config.logging.enabled);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attune.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "base_url = \"https://agents.test\"\nsettle_ms = 250\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.base_url, "https://agents.test");
        assert_eq!(config.settle_ms, 250);
        assert_eq!(config.logging.level, "debug");
        // Untouched keys keep their defaults.
        assert_eq!(config.workspace_id, "1");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(ConfigLoader::load_from_file(&path).is_err());
    }
}
