//! Configuration types for Verbatim
//!
//! A config file is optional. Values given on the command line take
//! precedence over the file, which takes precedence over the defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Smallest accepted worker count
pub const MIN_CONCURRENCY: usize = 1;
/// Largest accepted worker count
pub const MAX_CONCURRENCY: usize = 256;

/// Root configuration for Verbatim
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Indexing configuration
    pub index: IndexConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load a config file, falling back to defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse a config from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| Error::configuration(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let n = self.index.concurrency;
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&n) {
            return Err(Error::configuration(format!(
                "concurrency {n} outside {MIN_CONCURRENCY}..={MAX_CONCURRENCY}"
            )));
        }
        Ok(())
    }
}

/// Indexing configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Number of worker threads
    pub concurrency: usize,
    /// Follow symbolic links while walking the music directory
    pub follow_links: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            follow_links: false,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.index.concurrency, 2);
        assert!(!config.index.follow_links);
        assert_eq!(config.logging.level, "warn");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("[index]\nconcurrency = 8\n").unwrap();
        assert_eq!(config.index.concurrency, 8);
        assert!(!config.index.follow_links);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_concurrency_out_of_range() {
        let err = Config::from_toml("[index]\nconcurrency = 0\n").unwrap_err();
        assert!(err.is_usage());
        assert!(Config::from_toml("[index]\nconcurrency = 257\n").is_err());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("verbatim.toml");
        std::fs::write(&path, "[index]\nfollow_links = true\n[logging]\nlevel = \"debug\"\n")
            .unwrap();
        let config = Config::load(&path).unwrap();
        assert!(config.index.follow_links);
        assert_eq!(config.logging.level, "debug");
    }
}
