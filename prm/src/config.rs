//! prm configuration types and loading

use eyre::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::backend::BackendType;
use crate::error::PrmError;

/// Project-local config file name
pub const LOCAL_CONFIG_FILE: &str = ".prm.yml";

/// Puppet version used when nothing is configured
pub const DEFAULT_PUPPET_VERSION: &str = "7.0.0";

/// Active run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Puppet version tools are run against
    #[serde(rename = "puppet-version")]
    pub puppet_version: Version,

    /// Which backend executes tools
    pub backend: BackendType,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Root of per-tool cache directories
    #[serde(rename = "cache-dir", skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Container engine settings
    pub docker: DockerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            puppet_version: Version::new(7, 0, 0),
            backend: BackendType::default(),
            log_level: None,
            cache_dir: None,
            docker: DockerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `.prm.yml`, then `~/.config/prm/prm.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(user_config) = user_config_path() {
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load the config a `set` command will rewrite
    ///
    /// Same as [`Config::load`], except that an explicit path which does not
    /// exist yet yields defaults so the first `set` can create it.
    pub fn load_for_update(config_path: Option<&PathBuf>) -> Result<Self> {
        match config_path {
            Some(path) if !path.exists() => {
                debug!(?path, "Config::load_for_update: new config file, using defaults");
                Ok(Self::default())
            }
            _ => Self::load(config_path),
        }
    }

    /// Peek at the configured log level before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Write config to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), PrmError> {
        debug!(?path, "Config::save: called");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self).map_err(|e| PrmError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Where `set` persists changes
    pub fn save_path(config_path: Option<&PathBuf>) -> PathBuf {
        match config_path {
            Some(path) => path.clone(),
            None => user_config_path().unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE)),
        }
    }

    pub fn set_puppet_version(&mut self, version: &str) -> Result<(), PrmError> {
        debug!(%version, "Config::set_puppet_version: called");
        self.puppet_version = Version::parse(version.trim_start_matches('v')).map_err(|source| {
            PrmError::InvalidVersion {
                version: version.to_string(),
                source,
            }
        })?;
        Ok(())
    }

    pub fn set_backend(&mut self, backend: &str) -> Result<(), PrmError> {
        debug!(%backend, "Config::set_backend: called");
        self.backend = backend.parse()?;
        Ok(())
    }

    /// Root directory of per-tool caches
    pub fn cache_root(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")).join("prm"),
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("prm").join("prm.yml"))
}

/// Container engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Engine address (`unix:///path` or `tcp://host:port`); local defaults when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Timeout for engine requests, including the status probe
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Registry prefix prepended to tool image names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host: None,
            timeout_secs: 10,
            registry: None,
        }
    }
}
