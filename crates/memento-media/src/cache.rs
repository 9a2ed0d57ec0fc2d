//! Preload cache.
//!
//! Initialized media handles keyed by source URL, so a controller can adopt a
//! handle that already fetched metadata (or more) instead of starting cold.
//! The cache is explicitly constructed and shared by cloning; there is no
//! process-wide instance. Eviction is manual through
//! [`clear_cache`](PreloadCache::clear_cache).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use memento_core::ConnectionId;
use memento_core::logging::{span_names, targets};
use memento_net::NetworkQuality;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::Instrument;

use crate::config::MediaConfig;
use crate::element::{ElementEvent, ElementFactory, MediaHandle, PreloadMode};
use crate::error::{ErrorKind, MediaErrorKind};

/// How urgently a URL is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreloadPriority {
    /// Speculative: metadata only, bounded wait.
    Low,
    /// About to be shown: full preload on fast networks.
    High,
}

/// Why a preload did not produce a handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreloadError {
    #[error("offline, preload not started")]
    Offline,
    #[error("preload did not reach metadata in time")]
    Timeout,
    #[error("media error ({0})")]
    Media(MediaErrorKind),
    #[error("preload cancelled by cache eviction")]
    Cancelled,
}

impl PreloadError {
    /// The matching asset error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Offline => ErrorKind::UrlUnreachable,
            Self::Timeout => ErrorKind::PreloadTimeout,
            Self::Media(kind) => ErrorKind::MediaError(*kind),
            Self::Cancelled => ErrorKind::MediaError(MediaErrorKind::Aborted),
        }
    }
}

/// Fetch strategy for a priority on a given network.
///
/// Returns `None` when offline.
pub fn preload_mode(priority: PreloadPriority, quality: NetworkQuality) -> Option<PreloadMode> {
    match (priority, quality) {
        (_, NetworkQuality::Offline) => None,
        (PreloadPriority::High, NetworkQuality::Fast) => Some(PreloadMode::Auto),
        (PreloadPriority::High, NetworkQuality::Slow) | (PreloadPriority::Low, _) => {
            Some(PreloadMode::Metadata)
        }
    }
}

type Waiter = oneshot::Sender<Result<MediaHandle, PreloadError>>;

struct InFlight {
    handle: MediaHandle,
    waiters: Vec<Waiter>,
    connection: Option<ConnectionId>,
    generation: u64,
}

#[derive(Default)]
struct CacheState {
    ready: HashMap<String, MediaHandle>,
    in_flight: HashMap<String, InFlight>,
}

struct CacheInner {
    factory: Arc<dyn ElementFactory>,
    low_priority_timeout: Duration,
    generation: AtomicU64,
    state: Mutex<CacheState>,
}

/// Cache of preloaded media handles. Clones share the cache.
#[derive(Clone)]
pub struct PreloadCache {
    inner: Arc<CacheInner>,
}

impl PreloadCache {
    /// Default timeout of low-priority preloads.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create an empty cache building handles with `factory`.
    pub fn new(factory: Arc<dyn ElementFactory>) -> Self {
        Self::with_timeout(factory, Self::DEFAULT_TIMEOUT)
    }

    /// Create an empty cache using the configured low-priority timeout.
    pub fn from_config(factory: Arc<dyn ElementFactory>, config: &MediaConfig) -> Self {
        Self::with_timeout(factory, config.preload_timeout())
    }

    /// Create an empty cache with a custom low-priority timeout.
    pub fn with_timeout(factory: Arc<dyn ElementFactory>, low_priority_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                factory,
                low_priority_timeout,
                generation: AtomicU64::new(0),
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Cached handle for `url`. Never starts work.
    pub fn get(&self, url: &str) -> Option<MediaHandle> {
        self.inner.state.lock().ready.get(url).cloned()
    }

    /// Remove and return the cached handle for `url`.
    ///
    /// Used when a controller adopts the handle, so no second controller can
    /// attach to the same element.
    pub fn take(&self, url: &str) -> Option<MediaHandle> {
        let handle = self.inner.state.lock().ready.remove(url);
        if handle.is_some() {
            tracing::debug!(target: targets::CACHE, url, "handle handed over");
        }
        handle
    }

    pub fn contains(&self, url: &str) -> bool {
        self.inner.state.lock().ready.contains_key(url)
    }

    /// Whether a preload of `url` is still running.
    pub fn is_in_flight(&self, url: &str) -> bool {
        self.inner.state.lock().in_flight.contains_key(url)
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.inner.state.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build a muted handle for `url` and resolve once its metadata is known.
    ///
    /// Concurrent preloads of one URL share a handle. Low-priority preloads
    /// give up after the cache timeout, but the handle keeps loading and
    /// lands in the cache if it succeeds later.
    pub async fn preload(
        &self,
        url: &str,
        priority: PreloadPriority,
        quality: NetworkQuality,
    ) -> Result<MediaHandle, PreloadError> {
        let span = tracing::debug_span!(target: targets::CACHE, span_names::PRELOAD, url, ?priority, %quality);
        self.preload_inner(url, priority, quality).instrument(span).await
    }

    /// Preload several URLs concurrently.
    pub async fn preload_all(
        &self,
        urls: &[&str],
        priority: PreloadPriority,
        quality: NetworkQuality,
    ) -> Vec<Result<MediaHandle, PreloadError>> {
        join_all(urls.iter().map(|url| self.preload(url, priority, quality))).await
    }

    async fn preload_inner(
        &self,
        url: &str,
        priority: PreloadPriority,
        quality: NetworkQuality,
    ) -> Result<MediaHandle, PreloadError> {
        let Some(mode) = preload_mode(priority, quality) else {
            tracing::debug!(target: targets::CACHE, "offline, preload rejected");
            return Err(PreloadError::Offline);
        };

        let (tx, rx) = oneshot::channel();
        let started = {
            let mut state = self.inner.state.lock();
            if let Some(handle) = state.ready.get(url) {
                return Ok(Arc::clone(handle));
            }
            if let Some(flight) = state.in_flight.get_mut(url) {
                flight.waiters.push(tx);
                None
            } else {
                let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
                let handle = self.inner.factory.create();
                state.in_flight.insert(
                    url.to_owned(),
                    InFlight {
                        handle: Arc::clone(&handle),
                        waiters: vec![tx],
                        connection: None,
                        generation,
                    },
                );
                Some((handle, generation))
            }
        };

        match started {
            Some((handle, generation)) => self.start(url, handle, generation, mode),
            None => tracing::trace!(target: targets::CACHE, "joined in-flight preload"),
        }

        let outcome = match priority {
            PreloadPriority::High => rx.await,
            PreloadPriority::Low => match tokio::time::timeout(self.inner.low_priority_timeout, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::debug!(target: targets::CACHE, "low-priority preload timed out");
                    return Err(PreloadError::Timeout);
                }
            },
        };
        outcome.unwrap_or(Err(PreloadError::Cancelled))
    }

    fn start(&self, url: &str, handle: MediaHandle, generation: u64, mode: PreloadMode) {
        let weak = Arc::downgrade(&self.inner);
        let key = url.to_owned();
        let connection = handle.events().connect(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_element_event(&key, generation, event);
            }
        });

        handle.set_muted(true);
        handle.load(url, mode);

        let settled = {
            let mut state = self.inner.state.lock();
            match state.in_flight.get_mut(url) {
                Some(flight) if flight.generation == generation => {
                    flight.connection = Some(connection);
                    false
                }
                _ => true,
            }
        };
        if settled {
            // Finished synchronously during `load`.
            handle.events().disconnect(connection);
        }
    }

    /// Evict everything, including preloads still running. Returns the
    /// number of handles dropped.
    pub fn clear_cache(&self) -> usize {
        let CacheState { ready, in_flight } = std::mem::take(&mut *self.inner.state.lock());
        let evicted = ready.len() + in_flight.len();
        for flight in in_flight.into_values() {
            if let Some(connection) = flight.connection {
                flight.handle.events().disconnect(connection);
            }
        }
        tracing::debug!(target: targets::CACHE, evicted, "cache cleared");
        evicted
    }
}

impl CacheInner {
    fn on_element_event(&self, url: &str, generation: u64, event: &ElementEvent) {
        let outcome = match event {
            ElementEvent::LoadedMetadata { .. } | ElementEvent::CanPlay => Ok(()),
            ElementEvent::Error(kind) => Err(PreloadError::Media(*kind)),
            _ => return,
        };

        let flight = {
            let mut state = self.state.lock();
            if state
                .in_flight
                .get(url)
                .is_none_or(|flight| flight.generation != generation)
            {
                return;
            }
            let Some(flight) = state.in_flight.remove(url) else {
                return;
            };
            if outcome.is_ok() {
                state.ready.insert(url.to_owned(), Arc::clone(&flight.handle));
            }
            flight
        };

        match &outcome {
            Ok(()) => tracing::debug!(target: targets::CACHE, url, "preloaded"),
            Err(err) => tracing::warn!(target: targets::CACHE, url, error = %err, "preload failed"),
        }
        for waiter in flight.waiters {
            let _ = waiter.send(outcome.clone().map(|()| Arc::clone(&flight.handle)));
        }
        if let Some(connection) = flight.connection {
            flight.handle.events().disconnect(connection);
        }
    }
}

impl fmt::Debug for PreloadCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("PreloadCache")
            .field("ready", &state.ready.keys().collect::<Vec<_>>())
            .field("in_flight", &state.in_flight.keys().collect::<Vec<_>>())
            .finish()
    }
}
