//! Per-asset resource controller.
//!
//! A [`ResourceController`] owns one asset's runtime state and its media
//! element. It probes the source before loading, bounds load and play
//! attempts, falls back to muted playback when autoplay is refused, and
//! publishes every change on its [`events`](ResourceController::events)
//! signal.
//!
//! State changes go through [`lifecycle::reduce`](crate::lifecycle::reduce)
//! under the state lock; events are emitted after the lock is released, so
//! handlers may call back into the controller.
//!
//! # Example
//!
//! ```ignore
//! let controller = ResourceController::new(asset, context);
//! controller.events().connect(|event| println!("{}", event.as_label()));
//!
//! if controller.request_load(false).await {
//!     match controller.play().await {
//!         PlayResult::Playing { muted_fallback } => println!("playing, muted: {muted_fallback}"),
//!         PlayResult::Failed(err) => eprintln!("{err}"),
//!         PlayResult::Superseded => {}
//!     }
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use memento_core::logging::{span_names, targets};
use memento_core::{ConnectionGuard, Signal};
use memento_net::ProbeResult;
use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};
use tracing::Instrument;

use crate::arbiter::PlaybackHolder;
use crate::asset::{Asset, AssetId};
use crate::context::MediaContext;
use crate::element::{ElementEvent, MediaHandle, PlayRejected, PreloadMode};
use crate::error::{AssetError, ErrorKind, MediaErrorKind};
use crate::lifecycle::{Input, MediaEvent, reduce};
use crate::state::{AssetRuntimeState, Lifecycle, ReadyLevel};

/// Outcome of [`ResourceController::play`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlayResult {
    /// Playback started.
    Playing {
        /// Unmuted playback was refused and muted playback succeeded.
        muted_fallback: bool,
    },
    /// Playback did not start; the error is also recorded as `last_error`.
    Failed(AssetError),
    /// A later `play` or `pause` overtook this call.
    Superseded,
}

impl PlayResult {
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }

    /// Whether playback only started muted.
    pub fn played_muted(&self) -> bool {
        matches!(self, Self::Playing { muted_fallback: true })
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&AssetError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

struct Attached {
    handle: MediaHandle,
    _subscription: ConnectionGuard<ElementEvent>,
}

struct PendingLoad {
    token: u64,
    settle: oneshot::Sender<Result<(), MediaErrorKind>>,
}

struct ControllerInner {
    this: Weak<ControllerInner>,
    asset: Asset,
    context: MediaContext,
    state: Mutex<AssetRuntimeState>,
    element: Mutex<Option<Attached>>,
    pending: Mutex<Option<PendingLoad>>,
    // Serializes load attempts.
    load_gate: tokio::sync::Mutex<()>,
    // Completed load attempts, used to join an attempt that was in flight.
    load_epoch: AtomicU64,
    // Forced loads waiting for the gate. The running attempt yields to them.
    forced_loads: AtomicUsize,
    load_superseded: Notify,
    load_token: AtomicU64,
    play_token: AtomicU64,
    // Set while volume commands are forwarded to the element, whose echoes are dropped.
    forwarding_volume: AtomicBool,
    events: Arc<Signal<MediaEvent>>,
}

/// Drives one asset through its lifecycle. Clones share the same asset.
#[derive(Clone)]
pub struct ResourceController {
    inner: Arc<ControllerInner>,
}

/// Non-owning controller handle, for slots on the controller's own signal.
#[derive(Clone)]
pub(crate) struct WeakController(Weak<ControllerInner>);

impl WeakController {
    pub(crate) fn upgrade(&self) -> Option<ResourceController> {
        self.0.upgrade().map(|inner| ResourceController { inner })
    }
}

impl ResourceController {
    /// Create a controller for `asset`, starting `Idle`.
    pub fn new(asset: Asset, context: MediaContext) -> Self {
        let inner = Arc::new_cyclic(|this| ControllerInner {
            this: this.clone(),
            asset,
            context,
            state: Mutex::new(AssetRuntimeState::new()),
            element: Mutex::new(None),
            pending: Mutex::new(None),
            load_gate: tokio::sync::Mutex::new(()),
            load_epoch: AtomicU64::new(0),
            forced_loads: AtomicUsize::new(0),
            load_superseded: Notify::new(),
            load_token: AtomicU64::new(0),
            play_token: AtomicU64::new(0),
            forwarding_volume: AtomicBool::new(false),
            events: Arc::new(Signal::new()),
        });
        Self { inner }
    }

    pub fn id(&self) -> &AssetId {
        &self.inner.asset.id
    }

    pub fn asset(&self) -> &Asset {
        &self.inner.asset
    }

    /// Copy of the current runtime state.
    pub fn snapshot(&self) -> AssetRuntimeState {
        self.inner.state.lock().clone()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.lock().lifecycle
    }

    /// Event signal. Handlers run on the thread that caused the event.
    pub fn events(&self) -> &Arc<Signal<MediaEvent>> {
        &self.inner.events
    }

    /// The attached media element, if any.
    pub fn element(&self) -> Option<MediaHandle> {
        self.inner.handle()
    }

    /// Whether `other` controls the same asset instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakController {
        WeakController(Arc::downgrade(&self.inner))
    }

    /// Load the asset, returning whether it ended up playable.
    ///
    /// Without `force` this is a no-op for an already loaded asset and fails
    /// with `AttemptsExhausted` once the attempt budget is spent. A forced
    /// call always attempts, starting a fresh budget if the old one is spent.
    /// An unforced call made while another attempt is in flight waits for it
    /// and reports its outcome instead of starting a new one. A forced call
    /// supersedes the attempt in flight: that attempt is abandoned without
    /// touching state and its caller reports the forced attempt's outcome.
    pub async fn request_load(&self, force: bool) -> bool {
        let inner = &self.inner;
        let epoch = inner.load_epoch.load(Ordering::SeqCst);
        if force {
            inner.forced_loads.fetch_add(1, Ordering::SeqCst);
            inner.load_superseded.notify_waiters();
        }

        let mut force = force;
        loop {
            let _gate = inner.load_gate.lock().await;
            if force {
                inner.forced_loads.fetch_sub(1, Ordering::SeqCst);
            }
            let superseded = inner.load_superseded.notified();
            if inner.forced_loads.load(Ordering::SeqCst) > 0 {
                // A later forced load is queued behind us; follow it.
                force = false;
                continue;
            }
            {
                let state = inner.state.lock();
                if !force && state.lifecycle.is_loaded() {
                    return true;
                }
                if !force && inner.load_epoch.load(Ordering::SeqCst) != epoch {
                    return state.lifecycle.is_loaded();
                }
            }

            tokio::select! {
                loaded = self.gated_load(force) => {
                    inner.load_epoch.fetch_add(1, Ordering::SeqCst);
                    return loaded;
                }
                () = superseded => {
                    tracing::debug!(target: targets::CONTROLLER, asset = %self.id(), "load superseded by a forced load");
                    inner.pending.lock().take();
                    force = false;
                }
            }
        }
    }

    /// One load attempt under the gate, with budget and backoff applied.
    async fn gated_load(&self, force: bool) -> bool {
        let inner = &self.inner;
        let (attempts, previous_failed) = {
            let state = inner.state.lock();
            (state.load_attempts, state.lifecycle.is_error())
        };

        let max_attempts = inner.context.config().max_attempts;
        let attempts = if attempts >= max_attempts {
            if !force {
                let message =
                    format!("{attempts} load attempts failed, an explicit retry is required");
                tracing::warn!(target: targets::CONTROLLER, asset = %self.id(), attempts, "load attempts exhausted");
                inner.apply(Input::AttemptsExhausted { message });
                return false;
            }
            inner.apply(Input::LoadAttemptsReset);
            0
        } else {
            attempts
        };

        if previous_failed && attempts > 0 {
            let delay = inner.context.config().retry_policy().delay(attempts - 1);
            if !delay.is_zero() {
                tracing::debug!(target: targets::CONTROLLER, asset = %self.id(), ?delay, "backing off before retry");
                tokio::time::sleep(delay).await;
            }
        }

        let span = tracing::debug_span!(
            target: targets::CONTROLLER,
            span_names::LOAD_ATTEMPT,
            asset = %self.id(),
            attempt = attempts + 1,
            force
        );
        self.load_attempt().instrument(span).await
    }

    async fn load_attempt(&self) -> bool {
        let inner = &self.inner;
        let url = inner.asset.source_url.as_str();
        let token = inner.load_token.fetch_add(1, Ordering::SeqCst) + 1;

        inner.apply(Input::AttemptStarted);
        let probe = inner.context.probe().check(url).await;
        let accessible = probe.accessible;
        inner.apply(Input::ProbeCompleted(probe));
        if !accessible {
            return false;
        }

        let (settle, settled) = oneshot::channel();
        *inner.pending.lock() = Some(PendingLoad { token, settle });

        let (handle, adopted) = inner.attach(url);
        if adopted {
            inner.adopt(&handle);
        } else {
            handle.load(url, PreloadMode::Auto);
        }

        let timeout = inner.context.config().load_timeout();
        match tokio::time::timeout(timeout, settled).await {
            Ok(Ok(Ok(()))) => {
                inner.apply(Input::Synced {
                    ready_level: handle.ready_state(),
                    network_state: handle.network_state(),
                    duration: handle.duration(),
                });
                let state = inner.state.lock();
                tracing::info!(
                    target: targets::CONTROLLER,
                    asset = %inner.asset.id,
                    duration = ?state.duration_seconds,
                    adopted,
                    "ready to play"
                );
                state.lifecycle.is_loaded()
            }
            Ok(Ok(Err(_))) | Ok(Err(_)) => false,
            Err(_) => {
                {
                    let mut pending = inner.pending.lock();
                    if pending.as_ref().is_some_and(|p| p.token == token) {
                        *pending = None;
                    }
                }
                tracing::warn!(target: targets::CONTROLLER, asset = %inner.asset.id, ?timeout, "load timed out");
                inner.apply(Input::LoadTimedOut);
                false
            }
        }
    }

    /// Start playback.
    ///
    /// An asset in `Error` gets exactly one implicit [`retry`](Self::retry)
    /// first; an asset that is not loaded yet is loaded first. If the
    /// platform refuses unmuted playback, muted playback is tried. If that is
    /// refused too the lifecycle is left as is and a forced reload runs in
    /// the background.
    pub async fn play(&self) -> PlayResult {
        let token = self.inner.play_token.fetch_add(1, Ordering::SeqCst) + 1;
        let span = tracing::debug_span!(target: targets::CONTROLLER, span_names::PLAY_ATTEMPT, asset = %self.id());
        self.play_inner(token).instrument(span).await
    }

    async fn play_inner(&self, token: u64) -> PlayResult {
        let inner = &self.inner;

        let lifecycle = self.lifecycle();
        if lifecycle.is_error() {
            tracing::debug!(target: targets::CONTROLLER, asset = %self.id(), "implicit retry before play");
            if !self.retry().await {
                return PlayResult::Failed(inner.last_error_or(ErrorKind::LoadTimeout));
            }
        } else if !lifecycle.is_loaded() && lifecycle != Lifecycle::Ended && !self.request_load(false).await {
            return PlayResult::Failed(inner.last_error_or(ErrorKind::LoadTimeout));
        }
        if inner.superseded(token) {
            return PlayResult::Superseded;
        }

        let (play_attempts, muted, ended) = {
            let state = inner.state.lock();
            (state.play_attempts, state.muted, state.lifecycle == Lifecycle::Ended)
        };
        let max_attempts = inner.context.config().max_attempts;
        if play_attempts >= max_attempts {
            let message = format!("{play_attempts} play attempts failed, an explicit retry is required");
            inner.apply(Input::AttemptsExhausted {
                message: message.clone(),
            });
            return PlayResult::Failed(AssetError::new(ErrorKind::AttemptsExhausted, message));
        }

        let Some(handle) = inner.handle() else {
            return PlayResult::Failed(inner.last_error_or(ErrorKind::PlaybackBlocked));
        };
        if ended {
            inner.apply(Input::SeekRequested(0.0));
            handle.seek(0.0);
        }

        inner.claim_playback();
        inner.apply(Input::PlayAttempted);

        let outcome = match handle.play(muted).await {
            Ok(()) => Ok(false),
            Err(rejected) if !muted => {
                tracing::debug!(
                    target: targets::CONTROLLER,
                    asset = %self.id(),
                    reason = %rejected.reason,
                    "unmuted playback refused, retrying muted"
                );
                handle.play(true).await.map(|()| true)
            }
            Err(rejected) => Err(rejected),
        };

        match outcome {
            Ok(muted_fallback) => {
                if inner.superseded(token) {
                    handle.pause();
                    return PlayResult::Superseded;
                }
                inner.apply(Input::PlayStarted { muted_fallback });
                tracing::info!(target: targets::CONTROLLER, asset = %self.id(), muted_fallback, "playing");
                PlayResult::Playing { muted_fallback }
            }
            Err(rejected) => self.playback_blocked(rejected),
        }
    }

    fn playback_blocked(&self, rejected: PlayRejected) -> PlayResult {
        let inner = &self.inner;
        let message = format!("playback refused even when muted: {}", rejected.reason);
        tracing::warn!(target: targets::CONTROLLER, asset = %self.id(), reason = %rejected.reason, "playback blocked");
        inner.apply(Input::PlayBlocked {
            message: message.clone(),
        });
        inner.context.arbiter().release(&inner.asset.id);

        let controller = self.clone();
        tokio::spawn(async move {
            controller.request_load(true).await;
        });
        PlayResult::Failed(AssetError::new(ErrorKind::PlaybackBlocked, message))
    }

    /// Pause playback. Pausing an ended asset leaves it ended.
    pub async fn pause(&self) {
        self.inner.pause_now();
        self.inner.context.arbiter().release(&self.inner.asset.id);
    }

    /// Move the playback position, clamped to `[0, duration]`.
    pub async fn seek(&self, seconds: f64) {
        self.inner.apply(Input::SeekRequested(seconds));
        let position = self.inner.state.lock().current_time_seconds;
        if let Some(handle) = self.inner.handle() {
            handle.seek(position);
        }
    }

    /// Set volume percent. Zero mutes; any positive volume unmutes.
    pub async fn set_volume(&self, percent: u8) {
        self.inner.apply(Input::VolumeRequested(percent));
        self.inner.forward_volume();
    }

    /// Set the mute flag. Unmuting at zero volume has no effect.
    pub async fn set_muted(&self, muted: bool) {
        self.inner.apply(Input::MuteRequested(muted));
        self.inner.forward_volume();
    }

    /// Reset both attempt counters and force a load.
    pub async fn retry(&self) -> bool {
        tracing::info!(target: targets::CONTROLLER, asset = %self.id(), "retry requested");
        self.inner.apply(Input::AttemptsReset);
        self.request_load(true).await
    }

    /// Probe the source again without touching the lifecycle.
    pub async fn forced_probe(&self) -> ProbeResult {
        let result = self.inner.context.probe().check(&self.inner.asset.source_url).await;
        tracing::debug!(
            target: targets::CONTROLLER,
            asset = %self.id(),
            accessible = result.accessible,
            status = ?result.http_status,
            "forced probe"
        );
        result
    }

    /// Pause and drop the media element. Used when the asset leaves the
    /// working set.
    pub fn dispose(&self) {
        let inner = &self.inner;
        inner.pause_now();
        inner.context.arbiter().release(&inner.asset.id);
        inner.pending.lock().take();
        let detached = inner.element.lock().take();
        drop(detached);
    }
}

impl fmt::Debug for ResourceController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceController")
            .field("id", &self.inner.asset.id)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

impl ControllerInner {
    fn apply(&self, input: Input) {
        let events = {
            let mut state = self.state.lock();
            reduce(&mut state, input)
        };
        for event in events {
            match &event {
                MediaEvent::StateChanged(lifecycle) => {
                    tracing::debug!(target: targets::CONTROLLER, asset = %self.asset.id, %lifecycle, "state changed");
                }
                MediaEvent::Error(error) => {
                    tracing::warn!(target: targets::CONTROLLER, asset = %self.asset.id, %error, "asset error");
                }
                other => {
                    tracing::trace!(target: targets::CONTROLLER, asset = %self.asset.id, event = other.as_label());
                }
            }
            self.events.emit(event);
        }
    }

    fn handle(&self) -> Option<MediaHandle> {
        self.element.lock().as_ref().map(|attached| Arc::clone(&attached.handle))
    }

    /// The element to load into: a cached handle for `url` if the cache has
    /// one, else the current element, else a new one. An adopted handle
    /// leaves the cache.
    fn attach(&self, url: &str) -> (MediaHandle, bool) {
        let cached = self.context.cache().and_then(|cache| cache.take(url));
        let mut slot = self.element.lock();

        if let Some(cached) = cached {
            *slot = Some(self.subscribe(Arc::clone(&cached)));
            return (cached, true);
        }
        if let Some(attached) = slot.as_ref() {
            return (Arc::clone(&attached.handle), false);
        }
        let handle = self.context.factory().create();
        *slot = Some(self.subscribe(Arc::clone(&handle)));
        (handle, false)
    }

    fn subscribe(&self, handle: MediaHandle) -> Attached {
        let this = self.this.clone();
        let subscription = handle.events().connect_scoped(move |event| {
            if let Some(inner) = this.upgrade() {
                inner.on_element_event(event);
            }
        });
        Attached {
            handle,
            _subscription: subscription,
        }
    }

    /// Take over a handle that the preload cache already initialized.
    fn adopt(&self, handle: &MediaHandle) {
        tracing::debug!(target: targets::CONTROLLER, asset = %self.asset.id, "adopting preloaded handle");
        self.forward_volume_to(handle);

        let ready = handle.ready_state();
        if ready >= ReadyLevel::HaveMetadata {
            self.on_element_event(&ElementEvent::LoadedMetadata {
                duration: handle.duration(),
            });
        }
        if ready >= ReadyLevel::HaveFutureData {
            self.on_element_event(&ElementEvent::CanPlay);
        } else {
            handle.set_preload(PreloadMode::Auto);
        }
    }

    fn on_element_event(&self, event: &ElementEvent) {
        if matches!(event, ElementEvent::VolumeChange { .. })
            && self.forwarding_volume.load(Ordering::SeqCst)
        {
            return;
        }

        self.apply(Input::Element(event.clone()));

        match event {
            ElementEvent::CanPlay => self.settle_pending(Ok(())),
            ElementEvent::Error(kind) => self.settle_pending(Err(*kind)),
            ElementEvent::Playing if self.state.lock().lifecycle == Lifecycle::Playing => {
                self.claim_playback();
            }
            ElementEvent::Ended => self.context.arbiter().release(&self.asset.id),
            _ => {}
        }
    }

    fn settle_pending(&self, result: Result<(), MediaErrorKind>) {
        let pending = self.pending.lock().take();
        if let Some(pending) = pending {
            let _ = pending.settle.send(result);
        }
    }

    fn claim_playback(&self) {
        let holder: Weak<dyn PlaybackHolder> = self.this.clone();
        self.context.arbiter().claim(&self.asset.id, holder);
    }

    fn pause_now(&self) {
        self.play_token.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.handle() {
            handle.pause();
        }
        self.apply(Input::PauseRequested);
    }

    fn forward_volume(&self) {
        if let Some(handle) = self.handle() {
            self.forward_volume_to(&handle);
        }
    }

    fn forward_volume_to(&self, handle: &MediaHandle) {
        let (volume, muted) = {
            let state = self.state.lock();
            (state.volume_percent, state.muted)
        };
        self.forwarding_volume.store(true, Ordering::SeqCst);
        handle.set_volume(volume);
        handle.set_muted(muted);
        self.forwarding_volume.store(false, Ordering::SeqCst);
    }

    fn superseded(&self, token: u64) -> bool {
        self.play_token.load(Ordering::SeqCst) != token
    }

    fn last_error_or(&self, kind: ErrorKind) -> AssetError {
        self.state
            .lock()
            .last_error
            .clone()
            .unwrap_or_else(|| AssetError::new(kind, "asset could not be loaded"))
    }
}

impl PlaybackHolder for ControllerInner {
    fn yield_playback(&self) {
        tracing::debug!(target: targets::CONTROLLER, asset = %self.asset.id, "yielding playback");
        self.pause_now();
    }
}
