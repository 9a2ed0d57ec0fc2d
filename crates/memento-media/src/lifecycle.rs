//! The asset state machine.
//!
//! Every mutation of an [`AssetRuntimeState`] goes through [`reduce`], which
//! applies one [`Input`] and returns the events to publish. The reducer is
//! pure: controllers hold the state lock only while reducing and emit the
//! returned events after releasing it.

use memento_net::ProbeResult;

use crate::element::ElementEvent;
use crate::error::{AssetError, ErrorKind, MediaErrorKind};
use crate::state::{AssetRuntimeState, Lifecycle, NetworkState, ProbeSnapshot, ReadyLevel};

/// Events published by a resource controller.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// The lifecycle changed. Always precedes the event that caused it.
    StateChanged(Lifecycle),
    LoadStart,
    MetadataReady {
        duration: Option<f64>,
    },
    ReadyToPlay,
    Playing {
        muted: bool,
    },
    Paused,
    TimeUpdate {
        current_time: f64,
    },
    VolumeChanged {
        volume: u8,
        muted: bool,
    },
    /// Playback reached the end. The sole trigger for auto-advance.
    Ended,
    Error(AssetError),
}

impl MediaEvent {
    /// Short name for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::StateChanged(_) => "state_changed",
            Self::LoadStart => "load_start",
            Self::MetadataReady { .. } => "metadata_ready",
            Self::ReadyToPlay => "ready_to_play",
            Self::Playing { .. } => "playing",
            Self::Paused => "paused",
            Self::TimeUpdate { .. } => "time_update",
            Self::VolumeChanged { .. } => "volume_changed",
            Self::Ended => "ended",
            Self::Error(_) => "error",
        }
    }
}

/// Something that happened to an asset.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// A load attempt begins with the accessibility probe.
    AttemptStarted,
    /// The accessibility probe finished.
    ProbeCompleted(ProbeResult),
    /// The attached element reported an event.
    Element(ElementEvent),
    /// Element properties read back after a successful load.
    Synced {
        ready_level: ReadyLevel,
        network_state: NetworkState,
        duration: Option<f64>,
    },
    /// The bounded wait for "can play" elapsed.
    LoadTimedOut,
    /// A load or play was refused because the attempt budget is spent.
    AttemptsExhausted { message: String },
    /// A play attempt begins.
    PlayAttempted,
    /// Playback started, possibly only after falling back to muted.
    PlayStarted { muted_fallback: bool },
    /// Both unmuted and muted playback were rejected.
    PlayBlocked { message: String },
    PauseRequested,
    SeekRequested(f64),
    VolumeRequested(u8),
    MuteRequested(bool),
    /// Explicit retry: both attempt counters return to zero.
    AttemptsReset,
    /// A forced load at exhaustion starts a fresh load budget.
    LoadAttemptsReset,
}

/// Apply `input` to `state` and return the events to publish, in order.
pub fn reduce(state: &mut AssetRuntimeState, input: Input) -> Vec<MediaEvent> {
    let mut events = Vec::new();
    match input {
        Input::AttemptStarted => {
            state.load_attempts += 1;
            transition(state, Lifecycle::Probing, &mut events);
        }
        Input::ProbeCompleted(result) => {
            if state.lifecycle != Lifecycle::Probing {
                return events;
            }
            state.url_probe_result = Some(ProbeSnapshot::from(&result));
            if result.accessible {
                state.network_state = NetworkState::Loading;
                transition(state, Lifecycle::Loading, &mut events);
                events.push(MediaEvent::LoadStart);
            } else {
                let message = result
                    .error_message
                    .unwrap_or_else(|| "resource not accessible".to_owned());
                fail(state, ErrorKind::UrlUnreachable, message, &mut events);
            }
        }
        Input::Element(event) => element_event(state, event, &mut events),
        Input::Synced {
            ready_level,
            network_state,
            duration,
        } => {
            if state.lifecycle.is_loaded() {
                state.ready_level = state.ready_level.max(ready_level);
                state.network_state = network_state;
                if duration.is_some() {
                    state.duration_seconds = duration;
                }
            }
        }
        Input::LoadTimedOut => {
            if state.lifecycle == Lifecycle::Loading {
                fail(
                    state,
                    ErrorKind::LoadTimeout,
                    "element did not become playable in time",
                    &mut events,
                );
            }
        }
        Input::AttemptsExhausted { message } => {
            let error = AssetError::new(ErrorKind::AttemptsExhausted, message);
            state.last_error = Some(error.clone());
            if state.lifecycle.is_error() {
                transition(state, Lifecycle::Error(ErrorKind::AttemptsExhausted), &mut events);
            }
            events.push(MediaEvent::Error(error));
        }
        Input::PlayAttempted => {
            state.play_attempts += 1;
        }
        Input::PlayStarted { muted_fallback } => {
            state.play_attempts = 0;
            state.played_muted = muted_fallback;
            if muted_fallback && !state.muted {
                state.muted = true;
                events.push(MediaEvent::VolumeChanged {
                    volume: state.volume_percent,
                    muted: true,
                });
            }
            start_playing(state, &mut events);
        }
        Input::PlayBlocked { message } => {
            let error = AssetError::new(ErrorKind::PlaybackBlocked, message);
            state.last_error = Some(error.clone());
            events.push(MediaEvent::Error(error));
        }
        Input::PauseRequested => {
            if state.lifecycle == Lifecycle::Playing {
                transition(state, Lifecycle::Paused, &mut events);
                events.push(MediaEvent::Paused);
            }
        }
        Input::SeekRequested(seconds) => {
            let seconds = clamp_position(seconds, state.duration_seconds);
            state.current_time_seconds = seconds;
            let before_end = state.duration_seconds.is_none_or(|d| seconds < d);
            if state.lifecycle == Lifecycle::Ended && before_end {
                transition(state, Lifecycle::Paused, &mut events);
            }
            events.push(MediaEvent::TimeUpdate {
                current_time: seconds,
            });
        }
        Input::VolumeRequested(percent) => {
            let percent = percent.min(100);
            set_volume(state, percent, percent == 0, &mut events);
        }
        Input::MuteRequested(muted) => {
            // An unmute at zero volume would break the volume/mute pairing.
            let muted = muted || state.volume_percent == 0;
            set_volume(state, state.volume_percent, muted, &mut events);
        }
        Input::AttemptsReset => {
            state.load_attempts = 0;
            state.play_attempts = 0;
        }
        Input::LoadAttemptsReset => {
            state.load_attempts = 0;
        }
    }
    events
}

fn element_event(state: &mut AssetRuntimeState, event: ElementEvent, events: &mut Vec<MediaEvent>) {
    let lifecycle = state.lifecycle;
    // Progress from an abandoned or failed load is stale.
    let fetching = lifecycle == Lifecycle::Loading || lifecycle.is_loaded() || lifecycle == Lifecycle::Ended;

    match event {
        ElementEvent::LoadStart => {
            if fetching {
                state.network_state = NetworkState::Loading;
            }
        }
        ElementEvent::LoadedMetadata { duration } => {
            if !fetching {
                return;
            }
            state.ready_level = state.ready_level.max(ReadyLevel::HaveMetadata);
            if duration.is_some() {
                state.duration_seconds = duration;
            }
            events.push(MediaEvent::MetadataReady {
                duration: state.duration_seconds,
            });
        }
        ElementEvent::CanPlay => {
            if !fetching {
                return;
            }
            state.ready_level = state.ready_level.max(ReadyLevel::HaveFutureData);
            if lifecycle == Lifecycle::Loading {
                state.network_state = NetworkState::Idle;
                transition(state, Lifecycle::Ready, events);
                events.push(MediaEvent::ReadyToPlay);
            }
        }
        ElementEvent::Progress { buffered } => {
            if fetching {
                state.buffered_seconds = buffered.max(0.0);
            }
        }
        ElementEvent::Playing => {
            if lifecycle.is_loaded() || lifecycle == Lifecycle::Ended {
                start_playing(state, events);
            }
        }
        ElementEvent::Pause => {
            if lifecycle == Lifecycle::Playing {
                transition(state, Lifecycle::Paused, events);
                events.push(MediaEvent::Paused);
            }
        }
        ElementEvent::TimeUpdate { current_time } => {
            let moved = state.current_time_seconds != current_time;
            if moved && (lifecycle.is_loaded() || lifecycle == Lifecycle::Ended) {
                state.current_time_seconds = current_time;
                events.push(MediaEvent::TimeUpdate { current_time });
            }
        }
        ElementEvent::VolumeChange { volume, muted } => {
            let volume = volume.min(100);
            set_volume(state, volume, muted || volume == 0, events);
        }
        ElementEvent::Ended => {
            if lifecycle.is_loaded() {
                if let Some(duration) = state.duration_seconds {
                    state.current_time_seconds = duration;
                }
                transition(state, Lifecycle::Ended, events);
                events.push(MediaEvent::Ended);
            }
        }
        ElementEvent::Error(kind) => {
            if fetching {
                state.network_state = NetworkState::NoSource;
                fail(state, ErrorKind::MediaError(kind), describe(kind), events);
            }
        }
    }
}

fn start_playing(state: &mut AssetRuntimeState, events: &mut Vec<MediaEvent>) {
    if state.lifecycle != Lifecycle::Playing {
        transition(state, Lifecycle::Playing, events);
        events.push(MediaEvent::Playing { muted: state.muted });
    }
}

fn set_volume(state: &mut AssetRuntimeState, volume: u8, muted: bool, events: &mut Vec<MediaEvent>) {
    if state.volume_percent == volume && state.muted == muted {
        return;
    }
    state.volume_percent = volume;
    state.muted = muted;
    events.push(MediaEvent::VolumeChanged { volume, muted });
}

fn transition(state: &mut AssetRuntimeState, to: Lifecycle, events: &mut Vec<MediaEvent>) {
    if state.lifecycle != to {
        state.lifecycle = to;
        events.push(MediaEvent::StateChanged(to));
    }
}

fn fail(
    state: &mut AssetRuntimeState,
    kind: ErrorKind,
    message: impl Into<String>,
    events: &mut Vec<MediaEvent>,
) {
    let error = AssetError::new(kind, message);
    state.last_error = Some(error.clone());
    transition(state, Lifecycle::Error(kind), events);
    events.push(MediaEvent::Error(error));
}

fn clamp_position(seconds: f64, duration: Option<f64>) -> f64 {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    match duration {
        Some(duration) => seconds.min(duration),
        None => seconds,
    }
}

fn describe(kind: MediaErrorKind) -> &'static str {
    match kind {
        MediaErrorKind::Network => "network error while fetching media",
        MediaErrorKind::Decode => "media could not be decoded",
        MediaErrorKind::Unsupported => "media format not supported",
        MediaErrorKind::Aborted => "media fetch aborted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_in(lifecycle: Lifecycle) -> AssetRuntimeState {
        AssetRuntimeState {
            lifecycle,
            ..AssetRuntimeState::default()
        }
    }

    fn loaded() -> AssetRuntimeState {
        let mut state = AssetRuntimeState::new();
        reduce(&mut state, Input::AttemptStarted);
        reduce(&mut state, Input::ProbeCompleted(ProbeResult::accessible(200)));
        reduce(&mut state, Input::Element(ElementEvent::LoadedMetadata { duration: Some(30.0) }));
        reduce(&mut state, Input::Element(ElementEvent::CanPlay));
        state
    }

    #[test]
    fn successful_load_walks_the_ladder() {
        let mut state = AssetRuntimeState::new();

        let events = reduce(&mut state, Input::AttemptStarted);
        assert_eq!(events, vec![MediaEvent::StateChanged(Lifecycle::Probing)]);
        assert_eq!(state.load_attempts, 1);

        let events = reduce(&mut state, Input::ProbeCompleted(ProbeResult::accessible(200)));
        assert_eq!(
            events,
            vec![MediaEvent::StateChanged(Lifecycle::Loading), MediaEvent::LoadStart]
        );

        let events = reduce(
            &mut state,
            Input::Element(ElementEvent::LoadedMetadata { duration: Some(12.5) }),
        );
        assert_eq!(events, vec![MediaEvent::MetadataReady { duration: Some(12.5) }]);
        assert_eq!(state.ready_level, ReadyLevel::HaveMetadata);

        let events = reduce(&mut state, Input::Element(ElementEvent::CanPlay));
        assert_eq!(
            events,
            vec![MediaEvent::StateChanged(Lifecycle::Ready), MediaEvent::ReadyToPlay]
        );
        assert_eq!(state.ready_level, ReadyLevel::HaveFutureData);
        assert!(state.url_probe_result.as_ref().is_some_and(|p| p.accessible));
    }

    #[test]
    fn unreachable_probe_is_an_error() {
        let mut state = AssetRuntimeState::new();
        reduce(&mut state, Input::AttemptStarted);
        let events = reduce(&mut state, Input::ProbeCompleted(ProbeResult::status(404)));

        assert_eq!(state.lifecycle, Lifecycle::Error(ErrorKind::UrlUnreachable));
        let error = state.last_error.clone().unwrap();
        assert_eq!(error.kind, ErrorKind::UrlUnreachable);
        assert_eq!(error.message, "HTTP 404");
        assert_eq!(events.last(), Some(&MediaEvent::Error(error)));
        assert_eq!(state.url_probe_result.as_ref().and_then(|p| p.http_status), Some(404));
    }

    #[test]
    fn media_error_records_subkind() {
        let mut state = AssetRuntimeState::new();
        reduce(&mut state, Input::AttemptStarted);
        reduce(&mut state, Input::ProbeCompleted(ProbeResult::accessible(200)));
        reduce(&mut state, Input::Element(ElementEvent::Error(MediaErrorKind::Decode)));

        let kind = ErrorKind::MediaError(MediaErrorKind::Decode);
        assert_eq!(state.lifecycle, Lifecycle::Error(kind));
        assert_eq!(state.last_error.as_ref().map(|e| e.kind), Some(kind));
        assert_eq!(state.network_state, NetworkState::NoSource);
    }

    #[test]
    fn timeout_only_applies_while_loading() {
        let mut state = state_in(Lifecycle::Loading);
        reduce(&mut state, Input::LoadTimedOut);
        assert_eq!(state.lifecycle, Lifecycle::Error(ErrorKind::LoadTimeout));

        let mut ready = loaded();
        assert!(reduce(&mut ready, Input::LoadTimedOut).is_empty());
        assert_eq!(ready.lifecycle, Lifecycle::Ready);
    }

    #[test]
    fn late_can_play_after_timeout_is_ignored() {
        let mut state = state_in(Lifecycle::Loading);
        reduce(&mut state, Input::LoadTimedOut);
        let events = reduce(&mut state, Input::Element(ElementEvent::CanPlay));
        assert!(events.is_empty());
        assert_eq!(state.lifecycle, Lifecycle::Error(ErrorKind::LoadTimeout));
    }

    #[test]
    fn exhaustion_keeps_non_error_lifecycle() {
        let mut ended = state_in(Lifecycle::Ended);
        reduce(&mut ended, Input::AttemptsExhausted { message: "3 attempts".into() });
        assert_eq!(ended.lifecycle, Lifecycle::Ended);
        assert_eq!(ended.last_error.as_ref().map(|e| e.kind), Some(ErrorKind::AttemptsExhausted));

        let mut failed = state_in(Lifecycle::Error(ErrorKind::LoadTimeout));
        reduce(&mut failed, Input::AttemptsExhausted { message: "3 attempts".into() });
        assert_eq!(failed.lifecycle, Lifecycle::Error(ErrorKind::AttemptsExhausted));
    }

    #[test]
    fn playing_is_reported_once() {
        let mut state = loaded();
        let first = reduce(&mut state, Input::Element(ElementEvent::Playing));
        let second = reduce(&mut state, Input::PlayStarted { muted_fallback: false });
        assert_eq!(
            first,
            vec![
                MediaEvent::StateChanged(Lifecycle::Playing),
                MediaEvent::Playing { muted: false }
            ]
        );
        assert!(second.is_empty());
    }

    #[test]
    fn muted_fallback_mutes() {
        let mut state = loaded();
        state.play_attempts = 2;
        let events = reduce(&mut state, Input::PlayStarted { muted_fallback: true });
        assert!(state.muted);
        assert!(state.played_muted);
        assert_eq!(state.play_attempts, 0);
        assert_eq!(state.lifecycle, Lifecycle::Playing);
        assert_eq!(events.last(), Some(&MediaEvent::Playing { muted: true }));
    }

    #[test]
    fn blocked_play_leaves_lifecycle() {
        let mut state = loaded();
        reduce(&mut state, Input::PlayBlocked { message: "NotAllowedError".into() });
        assert_eq!(state.lifecycle, Lifecycle::Ready);
        assert_eq!(state.last_error.as_ref().map(|e| e.kind), Some(ErrorKind::PlaybackBlocked));
    }

    #[test]
    fn pause_is_idempotent_and_keeps_ended() {
        let mut state = loaded();
        reduce(&mut state, Input::Element(ElementEvent::Playing));
        assert_eq!(reduce(&mut state, Input::PauseRequested).len(), 2);
        assert!(reduce(&mut state, Input::PauseRequested).is_empty());

        let mut ended = state_in(Lifecycle::Ended);
        reduce(&mut ended, Input::PauseRequested);
        assert_eq!(ended.lifecycle, Lifecycle::Ended);
    }

    #[test]
    fn ended_then_seek_back_pauses() {
        let mut state = loaded();
        reduce(&mut state, Input::Element(ElementEvent::Playing));
        reduce(&mut state, Input::Element(ElementEvent::Ended));
        assert_eq!(state.lifecycle, Lifecycle::Ended);
        assert_eq!(state.current_time_seconds, 30.0);

        reduce(&mut state, Input::SeekRequested(-4.0));
        assert_eq!(state.lifecycle, Lifecycle::Paused);
        assert_eq!(state.current_time_seconds, 0.0);
    }

    #[test]
    fn seek_is_clamped_to_duration() {
        let mut state = loaded();
        reduce(&mut state, Input::SeekRequested(99.0));
        assert_eq!(state.current_time_seconds, 30.0);
    }

    #[test]
    fn volume_zero_mutes_and_raise_unmutes() {
        let mut state = loaded();
        reduce(&mut state, Input::VolumeRequested(0));
        assert!(state.muted);
        assert_eq!(state.volume_percent, 0);

        reduce(&mut state, Input::MuteRequested(false));
        assert!(state.muted, "unmute at zero volume is ignored");

        reduce(&mut state, Input::VolumeRequested(65));
        assert!(!state.muted);
        assert_eq!(state.volume_percent, 65);

        assert!(reduce(&mut state, Input::VolumeRequested(65)).is_empty());
        assert_eq!(reduce(&mut state, Input::VolumeRequested(250)).len(), 1);
        assert_eq!(state.volume_percent, 100);
    }

    #[test]
    fn element_volume_zero_is_normalized() {
        let mut state = loaded();
        reduce(
            &mut state,
            Input::Element(ElementEvent::VolumeChange { volume: 0, muted: false }),
        );
        assert!(state.muted);
    }

    #[test]
    fn reset_clears_both_counters() {
        let mut state = state_in(Lifecycle::Error(ErrorKind::LoadTimeout));
        state.load_attempts = 3;
        state.play_attempts = 3;
        reduce(&mut state, Input::AttemptsReset);
        assert_eq!((state.load_attempts, state.play_attempts), (0, 0));
    }

    #[test]
    fn forced_reset_keeps_play_budget() {
        let mut state = state_in(Lifecycle::Error(ErrorKind::LoadTimeout));
        state.load_attempts = 3;
        state.play_attempts = 2;
        reduce(&mut state, Input::LoadAttemptsReset);
        assert_eq!((state.load_attempts, state.play_attempts), (0, 2));
    }

    #[test]
    fn repeated_position_is_not_reported() {
        let mut state = loaded();
        reduce(&mut state, Input::SeekRequested(5.0));
        let echo = reduce(
            &mut state,
            Input::Element(ElementEvent::TimeUpdate { current_time: 5.0 }),
        );
        assert!(echo.is_empty());
    }

    #[test]
    fn stale_probe_is_ignored() {
        let mut state = loaded();
        assert!(reduce(&mut state, Input::ProbeCompleted(ProbeResult::failed("x"))).is_empty());
        assert_eq!(state.lifecycle, Lifecycle::Ready);
    }

    #[test]
    fn labels() {
        assert_eq!(MediaEvent::Ended.as_label(), "ended");
        assert_eq!(MediaEvent::StateChanged(Lifecycle::Idle).as_label(), "state_changed");
    }
}
