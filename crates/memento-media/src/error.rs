//! Error types for the media module.
//!
//! Two families live here. [`ErrorKind`] and [`AssetError`] describe runtime
//! failures of a single asset; they are recorded into runtime state and
//! surfaced as events, never returned as `Err`. [`MediaError`] and
//! [`ConfigError`] cover fallible setup such as registry parsing.

use std::fmt;

use serde::Serialize;

/// Failure reported by a media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorKind {
    /// The resource could not be fetched.
    Network,
    /// The resource could not be decoded.
    Decode,
    /// The container or codec is not supported.
    Unsupported,
    /// Fetching was aborted.
    Aborted,
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Decode => write!(f, "decode"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Classification of asset failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum ErrorKind {
    /// The accessibility probe failed.
    UrlUnreachable,
    /// The element did not become playable in time.
    LoadTimeout,
    /// The element reported a media error.
    MediaError(MediaErrorKind),
    /// Both unmuted and muted playback were rejected.
    PlaybackBlocked,
    /// The attempt budget is spent until an explicit retry.
    AttemptsExhausted,
    /// A low-priority preload did not reach metadata in time.
    PreloadTimeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UrlUnreachable => write!(f, "url unreachable"),
            Self::LoadTimeout => write!(f, "load timeout"),
            Self::MediaError(kind) => write!(f, "media error ({kind})"),
            Self::PlaybackBlocked => write!(f, "playback blocked"),
            Self::AttemptsExhausted => write!(f, "attempts exhausted"),
            Self::PreloadTimeout => write!(f, "preload timeout"),
        }
    }
}

/// A recorded asset failure: kind plus diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AssetError {
    /// Failure classification.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl AssetError {
    /// Create an error of `kind`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid TOML or does not match the schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Create an out-of-range error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors from fallible media setup APIs.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The asset registry document could not be parsed.
    #[error("invalid asset registry: {0}")]
    Registry(#[from] toml::de::Error),

    /// A key appears twice within one registry category.
    #[error("duplicate key `{key}` in category `{category}`")]
    DuplicateKey {
        /// Registry category.
        category: String,
        /// Repeated key.
        key: String,
    },

    /// An asset id is not known.
    #[error("unknown asset `{0}`")]
    UnknownAsset(String),

    /// The asset is already tracked.
    #[error("asset `{0}` is already tracked")]
    AlreadyTracked(String),

    /// JSON export failed.
    #[error("export failed: {0}")]
    Export(#[from] serde_json::Error),
}

/// A specialized Result type for media setup operations.
pub type Result<T> = std::result::Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_error_display() {
        let err = AssetError::new(ErrorKind::MediaError(MediaErrorKind::Decode), "bad frame");
        assert_eq!(err.to_string(), "media error (decode): bad frame");
    }

    #[test]
    fn error_kind_json_shape() {
        let json = serde_json::to_value(ErrorKind::MediaError(MediaErrorKind::Network)).unwrap();
        assert_eq!(json["kind"], "media_error");
        assert_eq!(json["detail"], "network");

        let json = serde_json::to_value(ErrorKind::LoadTimeout).unwrap();
        assert_eq!(json["kind"], "load_timeout");
    }

    #[test]
    fn duplicate_key_message() {
        let err = MediaError::DuplicateKey {
            category: "videos".into(),
            key: "beach".into(),
        };
        assert_eq!(err.to_string(), "duplicate key `beach` in category `videos`");
    }
}
