//! Configuration management for Platter.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file is fine.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Platter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Search defaults
    pub search: SearchConfig,

    /// Upload limits
    pub limits: LimitsConfig,

    /// Recipe table and image root
    pub recipes: RecipesConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.platter.platter/config.toml
    /// - Linux: ~/.config/platter/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\platter\config\config.toml
    ///
    /// Falls back to ~/.platter/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "platter", "platter")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".platter").join("config.toml")
            })
    }

    /// Resolved artifact bundle directory (with ~ expansion).
    pub fn bundle_dir(&self) -> PathBuf {
        expand(&self.general.bundle_dir)
    }

    /// Resolved recipe table path, if one is configured.
    pub fn recipe_table(&self) -> Option<PathBuf> {
        self.recipes.table.as_deref().map(expand)
    }

    /// Resolved root directory that catalog paths are relative to.
    pub fn image_root(&self) -> Option<PathBuf> {
        self.recipes.image_root.as_deref().map(expand)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}
