//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Pixels per point used when a request passes a scale of 0
    pub default_scale: f64,

    /// Which photo-library delivery completes a `ph://` request
    pub photos_delivery: PhotosDelivery,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            default_scale: 1.0,
            photos_delivery: PhotosDelivery::First,
        }
    }
}

/// Terminal delivery policy for managed photo fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotosDelivery {
    /// The first delivery completes the request, degraded or not
    #[default]
    First,
    /// Wait for a non-degraded delivery; fall back to the last degraded one
    Final,
}

/// Remote fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Whole-request timeout in milliseconds
    pub timeout_ms: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            user_agent: format!("pixtag/{}", crate::VERSION),
        }
    }
}

/// Photo library settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directory served as the device photo library
    pub root: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/Pictures"),
        }
    }
}

/// Bundled resource settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Base directory for relative resource names
    pub bundle_dir: PathBuf,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            bundle_dir: PathBuf::from("."),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,

    /// Log format (pretty, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
