//! Media element capability interface.
//!
//! A [`MediaElement`] is whatever actually fetches and renders a resource: a
//! platform media API, a native binding, or the scripted double in
//! [`testing`](crate::testing). Elements report progress through their
//! [`events`](MediaElement::events) signal; controllers and the preload cache
//! subscribe to it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use memento_core::Signal;

use crate::error::MediaErrorKind;
use crate::state::{NetworkState, ReadyLevel};

/// How eagerly an element fetches its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreloadMode {
    /// Fetch nothing until playback.
    None,
    /// Fetch only enough to learn duration and dimensions.
    Metadata,
    /// Fetch as much as the element sees fit.
    Auto,
}

/// Notifications emitted by a media element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementEvent {
    /// Fetching started.
    LoadStart,
    /// Duration and dimensions are known.
    LoadedMetadata {
        /// Duration in seconds, if finite.
        duration: Option<f64>,
    },
    /// Enough data to start playing.
    CanPlay,
    /// More data was buffered.
    Progress {
        /// Seconds buffered ahead of the start.
        buffered: f64,
    },
    /// Playback started.
    Playing,
    /// Playback paused.
    Pause,
    /// Playback position moved.
    TimeUpdate {
        /// Current position in seconds.
        current_time: f64,
    },
    /// Volume or mute changed.
    VolumeChange {
        /// Volume percent, `0..=100`.
        volume: u8,
        /// Mute flag.
        muted: bool,
    },
    /// Playback reached the end.
    Ended,
    /// The element failed.
    Error(MediaErrorKind),
}

/// A rejected `play()` request, typically an autoplay policy refusal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("play rejected: {reason}")]
pub struct PlayRejected {
    /// Platform-provided reason.
    pub reason: String,
}

impl PlayRejected {
    /// Create a rejection.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Capabilities the engine needs from a media element.
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Assign `url` as the source and start fetching per `mode`.
    ///
    /// Resets any previous source. Progress is reported through
    /// [`events`](Self::events).
    fn load(&self, url: &str, mode: PreloadMode);

    /// Change how eagerly the current source is fetched.
    fn set_preload(&self, mode: PreloadMode);

    /// The current source, if any.
    fn source(&self) -> Option<String>;

    /// Start playback with the given mute flag.
    async fn play(&self, muted: bool) -> Result<(), PlayRejected>;

    /// Pause playback.
    fn pause(&self);

    /// Move the playback position.
    fn seek(&self, seconds: f64);

    /// Set volume percent, `0..=100`.
    fn set_volume(&self, percent: u8);

    /// Set the mute flag.
    fn set_muted(&self, muted: bool);

    fn ready_state(&self) -> ReadyLevel;

    fn network_state(&self) -> NetworkState;

    /// Duration in seconds, once metadata is known.
    fn duration(&self) -> Option<f64>;

    /// Event signal. Handlers run on the thread that emits.
    fn events(&self) -> &Arc<Signal<ElementEvent>>;
}

impl fmt::Debug for dyn MediaElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaElement")
            .field("source", &self.source())
            .finish_non_exhaustive()
    }
}

/// Shared handle to an initialized element.
pub type MediaHandle = Arc<dyn MediaElement>;

/// Creates media elements.
pub trait ElementFactory: Send + Sync {
    /// Create a fresh element with no source.
    fn create(&self) -> MediaHandle;
}

impl<F> ElementFactory for F
where
    F: Fn() -> MediaHandle + Send + Sync,
{
    fn create(&self) -> MediaHandle {
        self()
    }
}
