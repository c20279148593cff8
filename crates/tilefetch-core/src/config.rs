//! Persisted application configuration.
//!
//! The auth token and download location live in a small JSON file under
//! the user's home directory. Values can be overridden per process through
//! environment variables (the CLI also loads a `.env` file first).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Directory (under the home directory) that holds the config file.
pub const CONFIG_DIR_NAME: &str = ".tilefetch";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable overriding the catalog API token.
pub const ENV_API_TOKEN: &str = "TILEFETCH_API_TOKEN";
/// Environment variable overriding the download location.
pub const ENV_DOWNLOAD_DIR: &str = "TILEFETCH_DOWNLOAD_DIR";
/// Environment variable overriding the vendor CLI path.
pub const ENV_OM_PATH: &str = "TILEFETCH_OM_PATH";
/// Environment variable holding the `HuggingFace` token.
pub const ENV_HF_TOKEN: &str = "HF_TOKEN";

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not determine the user's home directory.
    #[error("Cannot determine home directory")]
    NoHomeDir,

    /// Failed to read or write the config file.
    #[error("Failed to access config file {path}: {reason}")]
    Access { path: PathBuf, reason: String },

    /// The config file is not valid JSON.
    #[error("Invalid config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Application configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Catalog API token.
    #[serde(default)]
    pub api_token: String,
    /// Directory downloads are written into.
    #[serde(default)]
    pub download_location: PathBuf,
    /// Explicit path to the vendor download CLI; looked up on `PATH` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub om_path: Option<PathBuf>,
    /// `HuggingFace` token passed to the model fetcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hf_token: Option<String>,
}

impl AppConfig {
    /// Default configuration rooted at the given home directory.
    #[must_use]
    pub fn with_home(home: &Path) -> Self {
        Self {
            api_token: String::new(),
            download_location: default_download_location(Some(home)),
            om_path: None,
            hf_token: None,
        }
    }

    /// Apply environment overrides on top of the persisted values.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(token) = non_empty_env(ENV_API_TOKEN) {
            self.api_token = token;
        }
        if let Some(dir) = non_empty_env(ENV_DOWNLOAD_DIR) {
            self.download_location = PathBuf::from(dir);
        }
        if let Some(path) = non_empty_env(ENV_OM_PATH) {
            self.om_path = Some(PathBuf::from(path));
        }
        if let Some(token) = non_empty_env(ENV_HF_TOKEN) {
            self.hf_token = Some(token);
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            download_location: default_download_location(dirs::home_dir().as_deref()),
            om_path: None,
            hf_token: None,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// `<home>/Downloads/Tanzu`, or a relative fallback when there is no home.
#[must_use]
pub fn default_download_location(home: Option<&Path>) -> PathBuf {
    home.map_or_else(
        || PathBuf::from("./Downloads/Tanzu"),
        |home| home.join("Downloads").join("Tanzu"),
    )
}

/// Loads and saves [`AppConfig`] at a fixed path.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
    home: Option<PathBuf>,
}

impl ConfigStore {
    /// Store at `<home>/.tilefetch/config.json`.
    pub fn at_home() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(Self {
            path: home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
            home: Some(home),
        })
    }

    /// Store at an explicit path (tests, `--config` overrides).
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            home: dirs::home_dir(),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn defaults(&self) -> AppConfig {
        AppConfig {
            download_location: default_download_location(self.home.as_deref()),
            ..AppConfig::default()
        }
    }

    /// Load the config; a missing file yields defaults.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No config file, using defaults");
                return Ok(self.defaults());
            }
            Err(e) => {
                return Err(ConfigError::Access {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let mut config: AppConfig =
            serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if config.download_location.as_os_str().is_empty() {
            config.download_location = default_download_location(self.home.as_deref());
        }

        Ok(config)
    }

    /// Save the config as pretty JSON, creating the parent directory.
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let access = |e: std::io::Error| ConfigError::Access {
            path: self.path.clone(),
            reason: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(access)?;
            restrict_permissions(parent, 0o700).map_err(access)?;
        }

        let data = serde_json::to_string_pretty(config).map_err(|e| ConfigError::Parse {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&self.path, data).map_err(access)?;
        restrict_permissions(&self.path, 0o600).map_err(access)?;

        debug!(path = %self.path.display(), "Saved config");
        Ok(())
    }

    /// Load, modify, and save in one step.
    pub fn update(&self, apply: impl FnOnce(&mut AppConfig)) -> Result<AppConfig, ConfigError> {
        let mut config = self.load().unwrap_or_else(|_| self.defaults());
        apply(&mut config);
        self.save(&config)?;
        Ok(config)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn restrict_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
