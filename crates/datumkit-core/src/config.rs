//! Configuration management for Datumkit.
//!
//! Settings live in a TOML file in the platform config directory. Every
//! section has defaults, so a missing file or a partial file is fine.

use crate::error::{DatumError, Result};
use crate::validate::DEFAULT_OUTPUT_REPO;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure.
///
/// ## Example Configuration File (datumkit.toml)
///
/// ```toml
/// [general]
/// log_level = "info"
///
/// [session]
/// page_size = 1000
///
/// [resolve]
/// parallel = true
///
/// [validation]
/// output_repo = "out"
///
/// [store]
/// root = "/var/lib/datumkit/repos"
/// default_project = "default"
/// default_branch = "master"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    /// Enumeration paging
    pub session: SessionConfig,

    /// Atom resolution
    pub resolve: ResolveConfig,

    pub validation: ValidationConfig,

    /// Local directory store used by the CLI
    pub store: StoreConfig,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            log_level: "info".to_string(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Datums materialized per extension of the known window
    pub page_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig { page_size: 1000 }
    }
}

/// Resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Resolve atoms on the rayon pool instead of one by one
    pub parallel: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        ResolveConfig { parallel: true }
    }
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Repo name that must be referenced under an explicit alias
    pub output_repo: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            output_repo: DEFAULT_OUTPUT_REPO.to_string(),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store root (None = `<data dir>/repos`)
    pub root: Option<PathBuf>,

    /// Project used by atoms that do not name one
    pub default_project: String,

    /// Head branch for repos that do not record one
    pub default_branch: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            root: None,
            default_project: "default".to_string(),
            default_branch: "master".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| DatumError::config(format!("Failed to parse config: {}", e)))?;

        if config.session.page_size == 0 {
            return Err(DatumError::config("session.page_size must be at least 1"));
        }

        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Saving configuration");
        let contents = toml::to_string_pretty(self)
            .map_err(|e| DatumError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = project_dirs()?;
        Ok(dirs.config_dir().join("datumkit.toml"))
    }

    /// Get the default data directory path.
    pub fn default_data_dir() -> Result<PathBuf> {
        let dirs = project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Root of the local store (from config or default).
    pub fn store_root(&self) -> Result<PathBuf> {
        match self.store.root {
            Some(ref path) => Ok(path.clone()),
            None => Ok(Self::default_data_dir()?.join("repos")),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "datumkit")
        .ok_or_else(|| DatumError::config("Could not determine config directory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.page_size, 1000);
        assert!(config.resolve.parallel);
        assert_eq!(config.validation.output_repo, "out");
        assert_eq!(config.store.default_project, "default");
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("test.toml");

        let mut config = Config::default();
        config.session.page_size = 25;
        config.store.root = Some(temp_dir.path().join("repos"));

        config.save_to(&config_path).unwrap();
        let loaded = Config::load_from(&config_path).unwrap();

        assert_eq!(loaded.session.page_size, 25);
        assert_eq!(loaded.store_root().unwrap(), temp_dir.path().join("repos"));
    }

    #[test]
    fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.session.page_size, 1000);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.toml");
        fs::write(&path, "[validation]\noutput_repo = \"results\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.validation.output_repo, "results");
        assert_eq!(config.store.default_branch, "master");
    }

    #[test]
    fn test_rejects_bad_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");

        fs::write(&path, "[session\npage_size = ").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(DatumError::Config { .. })
        ));

        fs::write(&path, "[session]\npage_size = 0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(DatumError::Config { .. })
        ));
    }
}
