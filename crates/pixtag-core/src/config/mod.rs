//! Configuration management for pixtag.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file is fine.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for pixtag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dispatcher settings
    pub loader: LoaderConfig,

    /// Remote fetch settings
    pub remote: RemoteConfig,

    /// Photo library settings
    pub library: LibraryConfig,

    /// Bundled resource settings
    pub resources: ResourceConfig,

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
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.pixtag.pixtag/config.toml
    /// - Linux: ~/.config/pixtag/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\pixtag\config\config.toml
    ///
    /// Falls back to ~/.pixtag/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "pixtag", "pixtag")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".pixtag").join("config.toml")
            })
    }

    /// Get the resolved photo library root (with ~ expansion).
    pub fn library_root(&self) -> PathBuf {
        expand(&self.library.root)
    }

    /// Get the resolved resource bundle directory (with ~ expansion).
    pub fn bundle_dir(&self) -> PathBuf {
        expand(&self.resources.bundle_dir)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.loader.default_scale, 1.0);
        assert_eq!(config.loader.photos_delivery, PhotosDelivery::First);
        assert_eq!(config.remote.timeout_ms, 30000);
        assert!(config.remote.user_agent.starts_with("pixtag/"));
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[loader]"));
        assert!(toml.contains("[remote]"));
        assert!(toml.contains("photos_delivery = \"first\""));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[loader]\nphotos_delivery = \"final\"\n\n[library]\nroot = \"/srv/photos\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.loader.photos_delivery, PhotosDelivery::Final);
        assert_eq!(config.loader.default_scale, 1.0);
        assert_eq!(config.library_root(), PathBuf::from("/srv/photos"));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[remote]\ntimeout_ms = 0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));

        std::fs::write(&path, "[loader]\nphotos_delivery = \"sometimes\"\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_tilde_expansion() {
        let mut config = Config::default();
        config.resources.bundle_dir = PathBuf::from("~/bundle");
        assert!(!config.bundle_dir().to_string_lossy().starts_with('~'));
    }
}
