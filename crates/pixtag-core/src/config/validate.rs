//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

const LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !(self.loader.default_scale.is_finite() && self.loader.default_scale > 0.0) {
            return Err(ConfigError::ValidationError(
                "loader.default_scale must be > 0".into(),
            ));
        }
        if self.remote.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "remote.timeout_ms must be > 0".into(),
            ));
        }
        if self.remote.user_agent.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "remote.user_agent must not be empty".into(),
            ));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be one of {:?}, got {:?}",
                LOG_FORMATS, self.logging.format
            )));
        }
        Ok(())
    }
}
