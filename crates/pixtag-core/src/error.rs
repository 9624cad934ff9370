//! Error types for the pixtag image loader.
//!
//! Per-request failures are [`LoadError`]s and always carry the tag that was
//! requested, so a callback receiving one can tell which image failed and why.

use thiserror::Error;

/// Top-level error type for pixtag operations outside a single load request.
#[derive(Error, Debug)]
pub enum PixtagError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A load request failed
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// No Tokio runtime available to drive load requests
    #[error("Runtime error: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Failure of a single load request.
///
/// Exactly one of `LoadError` or a decoded image is delivered per request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The asset, store entry, or resource does not exist
    #[error("Image not found for tag {tag}")]
    NotFound { tag: String },

    /// The tag looked like a URL but could not be parsed as one
    #[error("Invalid URL for tag {tag}: {message}")]
    MalformedUrl { tag: String, message: String },

    /// Bytes could not be read or decoding produced no image
    #[error("Decode error for tag {tag}: {message}")]
    Decode { tag: String, message: String },

    /// The remote fetcher failed
    #[error("Fetch error for tag {tag}: {message}")]
    Fetch {
        tag: String,
        message: String,
        status_code: Option<u16>,
    },

    /// No loader understood the tag
    #[error("Unrecognized tag protocol for image {tag}")]
    UnrecognizedProtocol { tag: String },

    /// The request was cancelled before it completed
    #[error("Image load cancelled for tag {tag}")]
    Cancelled { tag: String },
}

/// Coarse classification of a [`LoadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    MalformedInput,
    DecodeFailure,
    Fetch,
    UnrecognizedProtocol,
    Cancelled,
}

impl LoadError {
    pub(crate) fn not_found(tag: &str) -> Self {
        Self::NotFound {
            tag: tag.to_string(),
        }
    }

    pub(crate) fn decode(tag: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            tag: tag.to_string(),
            message: message.into(),
        }
    }

    /// The tag of the request that failed.
    pub fn tag(&self) -> &str {
        match self {
            Self::NotFound { tag }
            | Self::MalformedUrl { tag, .. }
            | Self::Decode { tag, .. }
            | Self::Fetch { tag, .. }
            | Self::UnrecognizedProtocol { tag }
            | Self::Cancelled { tag } => tag,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::MalformedUrl { .. } => ErrorKind::MalformedInput,
            Self::Decode { .. } => ErrorKind::DecodeFailure,
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::UnrecognizedProtocol { .. } => ErrorKind::UnrecognizedProtocol,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Convenience type alias for pixtag results.
pub type Result<T> = std::result::Result<T, PixtagError>;

/// Convenience type alias for per-request results.
pub type LoadResult<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_names_tag() {
        let err = LoadError::not_found("rct-image-store://missing-key");
        assert!(err.to_string().contains("rct-image-store://missing-key"));
        assert_eq!(err.tag(), "rct-image-store://missing-key");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            LoadError::decode("a.gif", "no frames").kind(),
            ErrorKind::DecodeFailure
        );
        let err = LoadError::MalformedUrl {
            tag: "http//".into(),
            message: "relative URL without a base".into(),
        };
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(!err.is_cancelled());
        assert!(LoadError::Cancelled { tag: "x".into() }.is_cancelled());
    }
}
