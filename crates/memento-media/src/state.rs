//! Per-asset runtime state.

use std::fmt;

use memento_net::ProbeResult;
use serde::Serialize;

use crate::error::{AssetError, ErrorKind};

/// Lifecycle of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "error")]
pub enum Lifecycle {
    /// Tracked, nothing attempted.
    Idle,
    /// Accessibility probe in flight.
    Probing,
    /// Element is fetching the resource.
    Loading,
    /// Playable.
    Ready,
    /// Playing.
    Playing,
    /// Paused by a command or by the element.
    Paused,
    /// Played to the end.
    Ended,
    /// Failed; `last_error` carries the same kind.
    Error(ErrorKind),
}

impl Lifecycle {
    /// Whether a playable resource is attached (`Ready`, `Playing` or `Paused`).
    pub fn is_loaded(self) -> bool {
        matches!(self, Self::Ready | Self::Playing | Self::Paused)
    }

    /// Whether a load attempt is in flight.
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Probing | Self::Loading)
    }

    /// Whether this is an error state.
    pub fn is_error(self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The error kind, if this is an error state.
    pub fn error_kind(self) -> Option<ErrorKind> {
        match self {
            Self::Error(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Probing => write!(f, "probing"),
            Self::Loading => write!(f, "loading"),
            Self::Ready => write!(f, "ready"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::Ended => write!(f, "ended"),
            Self::Error(kind) => write!(f, "error ({kind})"),
        }
    }
}

/// How much of the resource is available, as an ordered ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(into = "u8")]
#[repr(u8)]
pub enum ReadyLevel {
    /// Nothing known.
    #[default]
    HaveNothing = 0,
    /// Duration and dimensions known.
    HaveMetadata = 1,
    /// Data for the current position.
    HaveCurrentData = 2,
    /// Data beyond the current position.
    HaveFutureData = 3,
    /// Enough data to play through.
    HaveEnoughData = 4,
}

impl From<ReadyLevel> for u8 {
    fn from(level: ReadyLevel) -> Self {
        level as u8
    }
}

/// Network activity of a media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(into = "u8")]
#[repr(u8)]
pub enum NetworkState {
    /// No source assigned.
    #[default]
    Empty = 0,
    /// Source assigned, not fetching.
    Idle = 1,
    /// Fetching.
    Loading = 2,
    /// No usable source.
    NoSource = 3,
}

impl From<NetworkState> for u8 {
    fn from(state: NetworkState) -> Self {
        state as u8
    }
}

/// Recorded outcome of the last accessibility probe.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProbeSnapshot {
    /// A probe was performed.
    pub tested: bool,
    /// The resource answered with a success status.
    pub accessible: bool,
    /// Status code, when a response arrived.
    pub http_status: Option<u16>,
}

impl From<&ProbeResult> for ProbeSnapshot {
    fn from(result: &ProbeResult) -> Self {
        Self {
            tested: result.tested,
            accessible: result.accessible,
            http_status: result.http_status,
        }
    }
}

/// Mutable state of one asset, owned by its controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRuntimeState {
    pub lifecycle: Lifecycle,
    pub ready_level: ReadyLevel,
    pub network_state: NetworkState,
    pub buffered_seconds: f64,
    pub current_time_seconds: f64,
    pub duration_seconds: Option<f64>,
    pub volume_percent: u8,
    pub muted: bool,
    /// Set when playback only started after falling back to muted.
    pub played_muted: bool,
    pub load_attempts: u32,
    pub play_attempts: u32,
    pub last_error: Option<AssetError>,
    pub url_probe_result: Option<ProbeSnapshot>,
}

impl Default for AssetRuntimeState {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::Idle,
            ready_level: ReadyLevel::HaveNothing,
            network_state: NetworkState::Empty,
            buffered_seconds: 0.0,
            current_time_seconds: 0.0,
            duration_seconds: None,
            volume_percent: 100,
            muted: false,
            played_muted: false,
            load_attempts: 0,
            play_attempts: 0,
            last_error: None,
            url_probe_result: None,
        }
    }
}

impl AssetRuntimeState {
    /// Fresh state for a newly tracked asset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a load has ever been attempted.
    pub fn load_attempted(&self) -> bool {
        self.lifecycle != Lifecycle::Idle || self.load_attempts > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loaded_states() {
        assert!(Lifecycle::Ready.is_loaded());
        assert!(Lifecycle::Paused.is_loaded());
        assert!(!Lifecycle::Ended.is_loaded());
        assert!(!Lifecycle::Error(ErrorKind::LoadTimeout).is_loaded());
        assert!(Lifecycle::Probing.is_loading());
    }

    #[test]
    fn ready_ladder_is_ordered() {
        assert!(ReadyLevel::HaveEnoughData > ReadyLevel::HaveFutureData);
        assert!(ReadyLevel::HaveMetadata > ReadyLevel::HaveNothing);
        assert_eq!(u8::from(ReadyLevel::HaveCurrentData), 2);
    }

    #[test]
    fn probe_snapshot_from_result() {
        let snapshot = ProbeSnapshot::from(&ProbeResult::status(404));
        assert!(snapshot.tested);
        assert!(!snapshot.accessible);
        assert_eq!(snapshot.http_status, Some(404));
    }

    #[test]
    fn serializes_lifecycle_with_error() {
        let json = serde_json::to_value(Lifecycle::Error(ErrorKind::UrlUnreachable)).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["error"]["kind"], "url_unreachable");
    }
}
