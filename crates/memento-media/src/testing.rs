//! In-memory test doubles.
//!
//! [`ScriptedElement`] plays back a per-URL [`LoadScript`] instead of fetching
//! anything, and [`StaticProbe`] answers probes from a table. Both are useful
//! for exercising controllers and schedulers without a platform media stack.
//!
//! ```ignore
//! let factory = ScriptedFactory::new();
//! factory.script("https://cdn.example.com/broken.mp4", LoadScript::fail(MediaErrorKind::Decode));
//! let probe = StaticProbe::new();
//! let context = MediaContext::new(Arc::new(probe), Arc::new(factory.clone()));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use memento_core::Signal;
use memento_net::{ProbeResult, UrlProbe};
use parking_lot::Mutex;

use crate::element::{ElementEvent, ElementFactory, MediaElement, MediaHandle, PlayRejected, PreloadMode};
use crate::error::MediaErrorKind;
use crate::state::{NetworkState, ReadyLevel};

/// How a scripted element responds to `load`.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadScript {
    /// Reach metadata, then "can play" unless preloading metadata only.
    Ready { duration: f64, delay: Duration },
    /// Report a media error.
    Fail { kind: MediaErrorKind, delay: Duration },
    /// Start fetching and never progress.
    Hang,
}

impl LoadScript {
    /// Immediate success with the given duration.
    pub fn ready(duration: f64) -> Self {
        Self::Ready {
            duration,
            delay: Duration::ZERO,
        }
    }

    /// Immediate media error.
    pub fn fail(kind: MediaErrorKind) -> Self {
        Self::Fail {
            kind,
            delay: Duration::ZERO,
        }
    }

    /// Delay this script's outcome.
    pub fn after(self, delay: Duration) -> Self {
        match self {
            Self::Ready { duration, .. } => Self::Ready { duration, delay },
            Self::Fail { kind, .. } => Self::Fail { kind, delay },
            Self::Hang => Self::Hang,
        }
    }
}

/// How a scripted element responds to `play`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayScript {
    #[default]
    Allow,
    /// Autoplay policy: only muted playback is allowed.
    BlockUnmuted,
    /// Every play request is rejected.
    BlockAll,
}

/// A recorded call on a scripted element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementCall {
    Load { url: String, mode: PreloadMode },
    SetPreload(PreloadMode),
    Play { muted: bool },
    Pause,
    Seek(f64),
    SetVolume(u8),
    SetMuted(bool),
}

#[derive(Debug)]
struct ElementState {
    source: Option<String>,
    preload: PreloadMode,
    ready: ReadyLevel,
    network: NetworkState,
    duration: Option<f64>,
    volume: u8,
    muted: bool,
    paused: bool,
    // Bumped on every load so delayed outcomes of an older load are dropped.
    generation: u64,
}

#[derive(Default)]
struct Scripts {
    loads: HashMap<String, LoadScript>,
    play: PlayScript,
}

/// A media element driven by scripts.
pub struct ScriptedElement {
    this: Weak<ScriptedElement>,
    events: Arc<Signal<ElementEvent>>,
    state: Mutex<ElementState>,
    scripts: Arc<Mutex<Scripts>>,
    calls: Mutex<Vec<ElementCall>>,
}

impl ScriptedElement {
    /// A standalone element whose loads succeed with a 60 second duration.
    pub fn new() -> Arc<Self> {
        Self::with_scripts(Arc::new(Mutex::new(Scripts::default())))
    }

    fn with_scripts(scripts: Arc<Mutex<Scripts>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            events: Arc::new(Signal::new()),
            state: Mutex::new(ElementState {
                source: None,
                preload: PreloadMode::None,
                ready: ReadyLevel::HaveNothing,
                network: NetworkState::Empty,
                duration: None,
                volume: 100,
                muted: false,
                paused: true,
                generation: 0,
            }),
            scripts,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<ElementCall> {
        self.calls.lock().clone()
    }

    /// Number of `load` calls received.
    pub fn load_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ElementCall::Load { .. }))
            .count()
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    /// Play to the end.
    pub fn finish(&self) {
        let duration = {
            let mut state = self.state.lock();
            state.paused = true;
            state.duration
        };
        if let Some(duration) = duration {
            self.events.emit(ElementEvent::TimeUpdate {
                current_time: duration,
            });
        }
        self.events.emit(ElementEvent::Ended);
    }

    /// Report a media error now.
    pub fn fail(&self, kind: MediaErrorKind) {
        self.state.lock().network = NetworkState::NoSource;
        self.events.emit(ElementEvent::Error(kind));
    }

    /// Emit an arbitrary event.
    pub fn emit(&self, event: ElementEvent) {
        self.events.emit(event);
    }

    fn record(&self, call: ElementCall) {
        self.calls.lock().push(call);
    }

    fn run_script(&self, script: LoadScript, mode: PreloadMode, generation: u64) {
        let delay = match &script {
            LoadScript::Ready { delay, .. } | LoadScript::Fail { delay, .. } => *delay,
            LoadScript::Hang => return,
        };
        if delay.is_zero() {
            self.complete(script, mode, generation);
            return;
        }
        let this = self.this.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(element) = this.upgrade() {
                element.complete(script, mode, generation);
            }
        });
    }

    fn complete(&self, script: LoadScript, mode: PreloadMode, generation: u64) {
        let mut emitted = Vec::new();
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            match script {
                LoadScript::Ready { duration, .. } => {
                    state.duration = Some(duration);
                    state.ready = ReadyLevel::HaveMetadata;
                    emitted.push(ElementEvent::LoadedMetadata {
                        duration: Some(duration),
                    });
                    if mode == PreloadMode::Auto {
                        state.ready = ReadyLevel::HaveEnoughData;
                        state.network = NetworkState::Idle;
                        emitted.push(ElementEvent::CanPlay);
                        emitted.push(ElementEvent::Progress { buffered: duration });
                    } else {
                        state.network = NetworkState::Idle;
                    }
                }
                LoadScript::Fail { kind, .. } => {
                    state.network = NetworkState::NoSource;
                    emitted.push(ElementEvent::Error(kind));
                }
                LoadScript::Hang => {}
            }
        }
        for event in emitted {
            self.events.emit(event);
        }
    }
}

#[async_trait]
impl MediaElement for ScriptedElement {
    fn load(&self, url: &str, mode: PreloadMode) {
        self.record(ElementCall::Load {
            url: url.to_owned(),
            mode,
        });
        let generation = {
            let mut state = self.state.lock();
            state.source = Some(url.to_owned());
            state.preload = mode;
            state.ready = ReadyLevel::HaveNothing;
            state.network = NetworkState::Loading;
            state.duration = None;
            state.paused = true;
            state.generation += 1;
            state.generation
        };
        self.events.emit(ElementEvent::LoadStart);

        let script = self
            .scripts
            .lock()
            .loads
            .get(url)
            .cloned()
            .unwrap_or_else(|| LoadScript::ready(60.0));
        self.run_script(script, mode, generation);
    }

    fn set_preload(&self, mode: PreloadMode) {
        self.record(ElementCall::SetPreload(mode));
        let upgrade = {
            let mut state = self.state.lock();
            let was = state.preload;
            state.preload = mode;
            mode == PreloadMode::Auto
                && was != PreloadMode::Auto
                && state.ready == ReadyLevel::HaveMetadata
        };
        if upgrade {
            {
                let mut state = self.state.lock();
                state.ready = ReadyLevel::HaveEnoughData;
            }
            self.events.emit(ElementEvent::CanPlay);
        }
    }

    fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    async fn play(&self, muted: bool) -> Result<(), PlayRejected> {
        self.record(ElementCall::Play { muted });
        let policy = self.scripts.lock().play;
        let allowed = match policy {
            PlayScript::Allow => true,
            PlayScript::BlockUnmuted => muted,
            PlayScript::BlockAll => false,
        };
        if !allowed {
            return Err(PlayRejected::new("NotAllowedError"));
        }

        let (volume_changed, started, volume) = {
            let mut state = self.state.lock();
            if state.source.is_none() {
                return Err(PlayRejected::new("no source"));
            }
            let volume_changed = state.muted != muted;
            state.muted = muted;
            let started = state.paused;
            state.paused = false;
            (volume_changed, started, state.volume)
        };
        if volume_changed {
            self.events.emit(ElementEvent::VolumeChange { volume, muted });
        }
        if started {
            self.events.emit(ElementEvent::Playing);
        }
        Ok(())
    }

    fn pause(&self) {
        self.record(ElementCall::Pause);
        let was_playing = {
            let mut state = self.state.lock();
            let was_playing = !state.paused;
            state.paused = true;
            was_playing
        };
        if was_playing {
            self.events.emit(ElementEvent::Pause);
        }
    }

    fn seek(&self, seconds: f64) {
        self.record(ElementCall::Seek(seconds));
        self.events.emit(ElementEvent::TimeUpdate {
            current_time: seconds,
        });
    }

    fn set_volume(&self, percent: u8) {
        self.record(ElementCall::SetVolume(percent));
        let muted = {
            let mut state = self.state.lock();
            state.volume = percent;
            state.muted
        };
        self.events.emit(ElementEvent::VolumeChange {
            volume: percent,
            muted,
        });
    }

    fn set_muted(&self, muted: bool) {
        self.record(ElementCall::SetMuted(muted));
        let volume = {
            let mut state = self.state.lock();
            state.muted = muted;
            state.volume
        };
        self.events.emit(ElementEvent::VolumeChange { volume, muted });
    }

    fn ready_state(&self) -> ReadyLevel {
        self.state.lock().ready
    }

    fn network_state(&self) -> NetworkState {
        self.state.lock().network
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn events(&self) -> &Arc<Signal<ElementEvent>> {
        &self.events
    }
}

/// Factory of [`ScriptedElement`]s sharing one script table.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    scripts: Arc<Mutex<Scripts>>,
    created: Arc<Mutex<Vec<Arc<ScriptedElement>>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script loads of `url`. Unscripted URLs succeed with a 60 second duration.
    pub fn script(&self, url: impl Into<String>, script: LoadScript) {
        self.scripts.lock().loads.insert(url.into(), script);
    }

    /// Set the play policy of every element.
    pub fn set_play_script(&self, play: PlayScript) {
        self.scripts.lock().play = play;
    }

    /// Number of elements created.
    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    /// The most recently created element whose source is `url`.
    pub fn element_for(&self, url: &str) -> Option<Arc<ScriptedElement>> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|element| element.source().as_deref() == Some(url))
            .cloned()
    }
}

impl ElementFactory for ScriptedFactory {
    fn create(&self) -> MediaHandle {
        let element = ScriptedElement::with_scripts(Arc::clone(&self.scripts));
        self.created.lock().push(Arc::clone(&element));
        element
    }
}

/// A probe answering from a table. Unknown URLs are accessible.
#[derive(Clone, Default)]
pub struct StaticProbe {
    results: Arc<Mutex<HashMap<String, ProbeResult>>>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
    delay: Duration,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every probe only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the answer for `url`.
    pub fn set(&self, url: impl Into<String>, result: ProbeResult) {
        self.results.lock().insert(url.into(), result);
    }

    /// Make `url` fail as if DNS resolution failed.
    pub fn unreachable(&self, url: impl Into<String>) {
        let url = url.into();
        let message = format!("Connection error: failed to resolve {url}");
        self.set(url, ProbeResult::failed(message));
    }

    /// Number of probes of `url` so far.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl UrlProbe for StaticProbe {
    async fn check(&self, url: &str) -> ProbeResult {
        *self.calls.lock().entry(url.to_owned()).or_default() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.results
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| ProbeResult::accessible(200))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(element: &ScriptedElement) -> Arc<Mutex<Vec<ElementEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        element.events().connect(move |event| sink.lock().push(event.clone()));
        seen
    }

    #[tokio::test]
    async fn metadata_preload_stops_before_can_play() {
        let element = ScriptedElement::new();
        let seen = recorder(&element);

        element.load("https://cdn.example.com/a.mp4", PreloadMode::Metadata);
        assert_eq!(element.ready_state(), ReadyLevel::HaveMetadata);
        assert!(!seen.lock().contains(&ElementEvent::CanPlay));

        element.set_preload(PreloadMode::Auto);
        assert_eq!(element.ready_state(), ReadyLevel::HaveEnoughData);
        assert!(seen.lock().contains(&ElementEvent::CanPlay));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_outcome_of_replaced_load_is_dropped() {
        let factory = ScriptedFactory::new();
        factory.script(
            "https://cdn.example.com/slow.mp4",
            LoadScript::fail(MediaErrorKind::Network).after(Duration::from_secs(1)),
        );
        let element = factory.create();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        element.events().connect(move |event| sink.lock().push(event.clone()));

        element.load("https://cdn.example.com/slow.mp4", PreloadMode::Auto);
        element.load("https://cdn.example.com/fine.mp4", PreloadMode::Auto);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(!seen.lock().iter().any(|e| matches!(e, ElementEvent::Error(_))));
        assert_eq!(element.duration(), Some(60.0));
    }

    #[tokio::test]
    async fn autoplay_policy() {
        let factory = ScriptedFactory::new();
        factory.set_play_script(PlayScript::BlockUnmuted);
        let element = factory.create();
        element.load("https://cdn.example.com/a.mp4", PreloadMode::Auto);

        assert!(element.play(false).await.is_err());
        assert!(element.play(true).await.is_ok());
        let scripted = factory.element_for("https://cdn.example.com/a.mp4").unwrap();
        assert!(scripted.is_muted());
        assert!(!scripted.is_paused());
    }

    #[tokio::test]
    async fn static_probe_counts_calls() {
        let probe = StaticProbe::new();
        probe.unreachable("https://example.invalid/video.mp4");

        assert!(!probe.check("https://example.invalid/video.mp4").await.accessible);
        assert!(probe.check("https://cdn.example.com/ok.mp4").await.accessible);
        assert_eq!(probe.calls("https://example.invalid/video.mp4"), 1);
    }
}
