//! Static asset registry.
//!
//! The registry maps symbolic keys to remote URLs, grouped by category, and is
//! immutable once loaded. Declaration order is preserved so galleries and
//! playlists render in the order they were written.
//!
//! ```toml
//! [hero_video]
//! key = "hero"
//! url = "https://cdn.example.com/hero.mp4"
//!
//! [[videos]]
//! key = "beach"
//! url = "https://cdn.example.com/beach.mp4"
//! title = "Summer at the beach"
//! thumbnail = "https://cdn.example.com/beach.jpg"
//!
//! [[music]]
//! key = "waltz"
//! url = "https://cdn.example.com/waltz.mp3"
//! duration = 185.0
//! metadata = { artist = "Family band" }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use memento_core::logging::targets;
use serde::Deserialize;

use crate::asset::{Asset, AssetKind};
use crate::error::{MediaError, Result};

/// Registry category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Photos,
    Videos,
    Music,
    Decorations,
    HeroVideo,
}

impl Category {
    /// All categories in document order.
    pub const ALL: [Category; 5] = [
        Self::HeroVideo,
        Self::Photos,
        Self::Videos,
        Self::Music,
        Self::Decorations,
    ];

    /// The asset kind entries of this category play as, if playable.
    pub fn playable_kind(self) -> Option<AssetKind> {
        match self {
            Self::Videos | Self::HeroVideo => Some(AssetKind::Video),
            Self::Music => Some(AssetKind::Audio),
            Self::Photos | Self::Decorations => None,
        }
    }

    /// Name used in registry documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photos => "photos",
            Self::Videos => "videos",
            Self::Music => "music",
            Self::Decorations => "decorations",
            Self::HeroVideo => "hero_video",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryEntry {
    pub key: String,
    pub url: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    /// Declared duration in seconds.
    pub duration: Option<f64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RegistryEntry {
    fn to_asset(&self, kind: AssetKind) -> Asset {
        let mut asset = Asset::new(self.key.as_str(), kind, self.url.as_str());
        if let Some(title) = &self.title {
            asset.title = title.clone();
        }
        asset.thumbnail_url = self.thumbnail.clone();
        asset.declared_duration_seconds = self.duration;
        asset.metadata = self.metadata.clone();
        asset
    }
}

/// Immutable key-to-URL mapping across categories.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetRegistry {
    hero_video: Option<RegistryEntry>,
    photos: Vec<RegistryEntry>,
    videos: Vec<RegistryEntry>,
    music: Vec<RegistryEntry>,
    decorations: Vec<RegistryEntry>,
}

impl AssetRegistry {
    /// Parse a registry document. Duplicate keys within a category are rejected.
    pub fn from_toml(document: &str) -> Result<Self> {
        let registry: Self = toml::from_str(document)?;
        for category in Category::ALL {
            let mut seen = HashSet::new();
            for entry in registry.entries(category) {
                if !seen.insert(entry.key.as_str()) {
                    return Err(MediaError::DuplicateKey {
                        category: category.to_string(),
                        key: entry.key.clone(),
                    });
                }
            }
        }
        tracing::debug!(
            target: targets::REGISTRY,
            photos = registry.photos.len(),
            videos = registry.videos.len(),
            music = registry.music.len(),
            decorations = registry.decorations.len(),
            hero = registry.hero_video.is_some(),
            "asset registry loaded"
        );
        Ok(registry)
    }

    /// Entries of `category` in declaration order.
    pub fn entries(&self, category: Category) -> &[RegistryEntry] {
        match category {
            Category::Photos => &self.photos,
            Category::Videos => &self.videos,
            Category::Music => &self.music,
            Category::Decorations => &self.decorations,
            Category::HeroVideo => self.hero_video.as_slice(),
        }
    }

    /// URL registered under `key` in `category`.
    pub fn url(&self, category: Category, key: &str) -> Option<&str> {
        self.entries(category)
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.url.as_str())
    }

    /// Playable assets of `category`. Empty for photos and decorations.
    pub fn assets(&self, category: Category) -> Vec<Asset> {
        let Some(kind) = category.playable_kind() else {
            return Vec::new();
        };
        self.entries(category)
            .iter()
            .map(|entry| entry.to_asset(kind))
            .collect()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        Category::ALL.iter().map(|c| self.entries(*c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
        [hero_video]
        key = "hero"
        url = "https://cdn.example.com/hero.mp4"

        [[photos]]
        key = "portrait"
        url = "https://cdn.example.com/portrait.jpg"

        [[videos]]
        key = "beach"
        url = "https://cdn.example.com/beach.mp4"
        title = "Summer at the beach"

        [[videos]]
        key = "garden"
        url = "https://cdn.example.com/garden.mp4"
        duration = 61.5

        [[music]]
        key = "waltz"
        url = "https://cdn.example.com/waltz.mp3"
        metadata = { artist = "Family band" }
    "#;

    #[test]
    fn lookups() {
        let registry = AssetRegistry::from_toml(DOCUMENT).unwrap();
        assert_eq!(registry.len(), 5);
        assert_eq!(
            registry.url(Category::Videos, "garden"),
            Some("https://cdn.example.com/garden.mp4")
        );
        assert_eq!(registry.url(Category::Music, "beach"), None);
        assert_eq!(registry.entries(Category::HeroVideo).len(), 1);
        assert!(registry.entries(Category::Decorations).is_empty());
    }

    #[test]
    fn assets_preserve_order_and_kind() {
        let registry = AssetRegistry::from_toml(DOCUMENT).unwrap();
        let videos = registry.assets(Category::Videos);
        let ids: Vec<_> = videos.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["beach", "garden"]);
        assert_eq!(videos[0].title, "Summer at the beach");
        assert_eq!(videos[1].title, "garden");
        assert_eq!(videos[1].declared_duration_seconds, Some(61.5));

        let music = registry.assets(Category::Music);
        assert_eq!(music[0].kind, AssetKind::Audio);
        assert_eq!(music[0].metadata["artist"], "Family band");
    }

    #[test]
    fn photos_are_not_playable() {
        let registry = AssetRegistry::from_toml(DOCUMENT).unwrap();
        assert!(registry.assets(Category::Photos).is_empty());
    }

    #[test]
    fn duplicate_keys_rejected() {
        let err = AssetRegistry::from_toml(
            r#"
            [[music]]
            key = "a"
            url = "https://cdn.example.com/1.mp3"
            [[music]]
            key = "a"
            url = "https://cdn.example.com/2.mp3"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, MediaError::DuplicateKey { ref key, .. } if key == "a"));
    }

    #[test]
    fn same_key_in_different_categories_is_fine() {
        let registry = AssetRegistry::from_toml(
            r#"
            [[photos]]
            key = "beach"
            url = "https://cdn.example.com/beach.jpg"
            [[videos]]
            key = "beach"
            url = "https://cdn.example.com/beach.mp4"
            "#,
        )
        .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn malformed_document() {
        assert!(matches!(
            AssetRegistry::from_toml("[[videos]]\nurl = 3"),
            Err(MediaError::Registry(_))
        ));
    }
}
