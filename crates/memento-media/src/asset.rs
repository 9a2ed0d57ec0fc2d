//! Immutable asset descriptions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of an asset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Create an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for AssetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Whether an asset is played by an audio or a video element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Music track.
    Audio,
    /// Video clip.
    Video,
}

/// A playable remote media resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Identifier, unique within the tracked set.
    pub id: AssetId,
    /// Audio or video.
    pub kind: AssetKind,
    /// Display title.
    pub title: String,
    /// Remote URL of the media resource.
    pub source_url: String,
    /// Poster or cover image.
    pub thumbnail_url: Option<String>,
    /// Duration declared by the registry, before metadata is known.
    pub declared_duration_seconds: Option<f64>,
    /// Free-form metadata (artist, caption, date).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Asset {
    /// Create an asset with the given kind and source.
    pub fn new(id: impl Into<AssetId>, kind: AssetKind, source_url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.to_string(),
            id,
            kind,
            source_url: source_url.into(),
            thumbnail_url: None,
            declared_duration_seconds: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Create a video asset.
    pub fn video(id: impl Into<AssetId>, source_url: impl Into<String>) -> Self {
        Self::new(id, AssetKind::Video, source_url)
    }

    /// Create an audio asset.
    pub fn audio(id: impl Into<AssetId>, source_url: impl Into<String>) -> Self {
        Self::new(id, AssetKind::Audio, source_url)
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the thumbnail URL.
    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// Set the declared duration.
    pub fn with_declared_duration(mut self, seconds: f64) -> Self {
        self.declared_duration_seconds = Some(seconds);
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_title_to_id() {
        let asset = Asset::video("beach", "https://cdn.example.com/beach.mp4")
            .with_declared_duration(42.0)
            .with_metadata("date", "2019-07-14");

        assert_eq!(asset.title, "beach");
        assert_eq!(asset.kind, AssetKind::Video);
        assert_eq!(asset.declared_duration_seconds, Some(42.0));
        assert_eq!(asset.metadata.get("date").map(String::as_str), Some("2019-07-14"));
    }

    #[test]
    fn id_serializes_as_string() {
        let json = serde_json::to_string(&AssetId::new("song-1")).unwrap();
        assert_eq!(json, "\"song-1\"");
    }
}
