//! Collaborators shared by every controller of a page.

use std::fmt;
use std::sync::Arc;

use memento_net::UrlProbe;

use crate::arbiter::PlaybackArbiter;
use crate::cache::PreloadCache;
use crate::config::MediaConfig;
use crate::element::ElementFactory;

/// Probe, element factory, preload cache, playback slot and configuration.
///
/// Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct MediaContext {
    probe: Arc<dyn UrlProbe>,
    factory: Arc<dyn ElementFactory>,
    cache: Option<PreloadCache>,
    arbiter: PlaybackArbiter,
    config: Arc<MediaConfig>,
}

impl MediaContext {
    /// A context with default configuration, no preload cache and a fresh
    /// playback slot.
    pub fn new(probe: Arc<dyn UrlProbe>, factory: Arc<dyn ElementFactory>) -> Self {
        Self {
            probe,
            factory,
            cache: None,
            arbiter: PlaybackArbiter::new(),
            config: Arc::new(MediaConfig::default()),
        }
    }

    /// Adopt handles from `cache` when loading.
    pub fn with_cache(mut self, cache: PreloadCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_config(mut self, config: MediaConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Share a playback slot with another context.
    pub fn with_arbiter(mut self, arbiter: PlaybackArbiter) -> Self {
        self.arbiter = arbiter;
        self
    }

    pub fn probe(&self) -> &Arc<dyn UrlProbe> {
        &self.probe
    }

    pub fn factory(&self) -> &Arc<dyn ElementFactory> {
        &self.factory
    }

    pub fn cache(&self) -> Option<&PreloadCache> {
        self.cache.as_ref()
    }

    pub fn arbiter(&self) -> &PlaybackArbiter {
        &self.arbiter
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }
}

impl fmt::Debug for MediaContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaContext")
            .field("cache", &self.cache)
            .field("arbiter", &self.arbiter)
            .field("config", &self.config)
            .finish()
    }
}
