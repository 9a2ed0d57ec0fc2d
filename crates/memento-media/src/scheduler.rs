//! Visibility scheduler.
//!
//! Keeps an ordered sequence of controllers and decides which one is
//! *current*: the sole target of user playback commands. An asset becomes
//! current when more than the configured fraction of it is visible, or by
//! explicit navigation. Leaving visibility never pauses; explicit navigation
//! pauses the outgoing asset before acting on the incoming one.

use std::fmt;
use std::sync::{Arc, Weak};

use memento_core::logging::targets;
use memento_core::{ConnectionGuard, Signal};
use memento_net::ConnectivityMonitor;
use parking_lot::Mutex;

use crate::asset::{Asset, AssetId};
use crate::context::MediaContext;
use crate::controller::{PlayResult, ResourceController};
use crate::error::{MediaError, Result};
use crate::lifecycle::MediaEvent;

/// What happens when advancing past the last asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvancePolicy {
    /// The sequence is terminal; the last asset stays ended.
    #[default]
    Stop,
    /// Wrap around to the first asset.
    Loop,
}

/// Notifications published by a [`VisibilityScheduler`].
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    CurrentChanged {
        previous: Option<AssetId>,
        current: AssetId,
    },
    /// A tracked asset played to its end.
    AssetEnded(AssetId),
    /// Advancing was requested past the last asset under [`AdvancePolicy::Stop`].
    SequenceFinished { last: AssetId },
    /// The persistent offline indicator changed.
    OfflineChanged { offline: bool },
}

struct Tracked {
    controller: ResourceController,
    _ended: ConnectionGuard<MediaEvent>,
}

#[derive(Default)]
struct SchedulerState {
    order: Vec<Tracked>,
    current: Option<usize>,
    offline: bool,
}

impl SchedulerState {
    fn position(&self, id: &AssetId) -> Option<usize> {
        self.order.iter().position(|t| t.controller.id() == id)
    }

    fn current_controller(&self) -> Option<ResourceController> {
        self.current
            .and_then(|index| self.order.get(index))
            .map(|t| t.controller.clone())
    }
}

struct SchedulerInner {
    context: MediaContext,
    policy: AdvancePolicy,
    state: Mutex<SchedulerState>,
    events: Arc<Signal<SchedulerEvent>>,
}

/// Ordered set of assets with a single current one. Clones share the sequence.
#[derive(Clone)]
pub struct VisibilityScheduler {
    inner: Arc<SchedulerInner>,
}

/// Non-owning handle to a scheduler, for subscribers that must not keep it alive.
#[derive(Clone)]
pub(crate) struct WeakScheduler(Weak<SchedulerInner>);

impl WeakScheduler {
    pub(crate) fn upgrade(&self) -> Option<VisibilityScheduler> {
        self.0.upgrade().map(|inner| VisibilityScheduler { inner })
    }
}

enum Step {
    Forward,
    Backward,
}

impl VisibilityScheduler {
    /// An empty scheduler whose controllers share `context`.
    pub fn new(context: MediaContext, policy: AdvancePolicy) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                context,
                policy,
                state: Mutex::new(SchedulerState::default()),
                events: Arc::new(Signal::new()),
            }),
        }
    }

    /// A scheduler tracking `assets` in order.
    pub fn with_assets(
        context: MediaContext,
        policy: AdvancePolicy,
        assets: impl IntoIterator<Item = Asset>,
    ) -> Result<Self> {
        let scheduler = Self::new(context, policy);
        for asset in assets {
            scheduler.track(asset)?;
        }
        Ok(scheduler)
    }

    pub(crate) fn downgrade(&self) -> WeakScheduler {
        WeakScheduler(Arc::downgrade(&self.inner))
    }

    pub fn context(&self) -> &MediaContext {
        &self.inner.context
    }

    pub fn policy(&self) -> AdvancePolicy {
        self.inner.policy
    }

    pub fn events(&self) -> &Arc<Signal<SchedulerEvent>> {
        &self.inner.events
    }

    /// Append `asset` to the sequence.
    pub fn track(&self, asset: Asset) -> Result<ResourceController> {
        let mut state = self.inner.state.lock();
        if state.position(&asset.id).is_some() {
            return Err(MediaError::AlreadyTracked(asset.id.to_string()));
        }

        let controller = ResourceController::new(asset, self.inner.context.clone());
        let events = Arc::downgrade(&self.inner.events);
        let id = controller.id().clone();
        let ended = controller.events().connect_scoped(move |event| {
            if matches!(event, MediaEvent::Ended) {
                if let Some(events) = events.upgrade() {
                    events.emit(SchedulerEvent::AssetEnded(id.clone()));
                }
            }
        });

        tracing::debug!(target: targets::SCHEDULER, asset = %controller.id(), index = state.order.len(), "tracking asset");
        state.order.push(Tracked {
            controller: controller.clone(),
            _ended: ended,
        });
        Ok(controller)
    }

    /// Remove `id` from the sequence, pausing it and dropping its element.
    pub fn untrack(&self, id: &AssetId) -> Result<ResourceController> {
        let tracked = {
            let mut state = self.inner.state.lock();
            let index = state
                .position(id)
                .ok_or_else(|| MediaError::UnknownAsset(id.to_string()))?;
            state.current = match state.current {
                Some(current) if current == index => None,
                Some(current) if current > index => Some(current - 1),
                other => other,
            };
            state.order.remove(index)
        };

        tracing::debug!(target: targets::SCHEDULER, asset = %id, "untracked asset");
        tracked.controller.dispose();
        Ok(tracked.controller)
    }

    /// Controllers in sequence order.
    pub fn controllers(&self) -> Vec<ResourceController> {
        self.inner
            .state
            .lock()
            .order
            .iter()
            .map(|t| t.controller.clone())
            .collect()
    }

    pub fn controller(&self, id: &AssetId) -> Option<ResourceController> {
        let state = self.inner.state.lock();
        state.position(id).map(|index| state.order[index].controller.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().order.is_empty()
    }

    /// The current asset's controller.
    pub fn current(&self) -> Option<ResourceController> {
        self.inner.state.lock().current_controller()
    }

    pub fn current_id(&self) -> Option<AssetId> {
        self.current().map(|controller| controller.id().clone())
    }

    pub fn current_index(&self) -> Option<usize> {
        self.inner.state.lock().current
    }

    /// Whether the offline indicator is raised.
    pub fn is_offline(&self) -> bool {
        self.inner.state.lock().offline
    }

    /// Report the visible fraction of `id`.
    ///
    /// Crossing the visibility threshold makes the asset current and loads
    /// it if no load was ever attempted. Returns whether the asset is current
    /// afterwards.
    pub async fn on_visibility(&self, id: &AssetId, ratio: f64) -> bool {
        let threshold = self.inner.context.config().visibility_threshold;
        if ratio.is_nan() || ratio <= threshold {
            tracing::trace!(target: targets::SCHEDULER, asset = %id, ratio, "below visibility threshold");
            return self.current_id().as_ref() == Some(id);
        }

        let Some((controller, _)) = self.make_current(id) else {
            tracing::debug!(target: targets::SCHEDULER, asset = %id, "visibility report for untracked asset");
            return false;
        };
        if !controller.snapshot().load_attempted() {
            controller.request_load(false).await;
        }
        true
    }

    /// Make `id` current by explicit navigation, pausing the outgoing asset,
    /// and load it. Returns whether the asset is playable.
    pub async fn select(&self, id: &AssetId) -> Result<bool> {
        let (controller, previous) = self
            .make_current(id)
            .ok_or_else(|| MediaError::UnknownAsset(id.to_string()))?;
        if let Some(previous) = previous {
            previous.pause().await;
        }
        Ok(controller.request_load(false).await)
    }

    /// Move to the next asset and play it.
    ///
    /// Returns `None` when the sequence is finished or empty.
    pub async fn advance_to_next(&self) -> Option<PlayResult> {
        self.step(Step::Forward).await
    }

    /// Move to the previous asset and play it.
    pub async fn previous(&self) -> Option<PlayResult> {
        self.step(Step::Backward).await
    }

    async fn step(&self, step: Step) -> Option<PlayResult> {
        let policy = self.inner.policy;
        let target = {
            let state = self.inner.state.lock();
            let len = state.order.len();
            if len == 0 {
                return None;
            }
            let next = match (&step, state.current) {
                (Step::Forward, None) => Some(0),
                (Step::Forward, Some(i)) if i + 1 < len => Some(i + 1),
                (Step::Forward, Some(_)) => (policy == AdvancePolicy::Loop).then_some(0),
                (Step::Backward, None) => Some(len - 1),
                (Step::Backward, Some(i)) if i > 0 => Some(i - 1),
                (Step::Backward, Some(_)) => (policy == AdvancePolicy::Loop).then_some(len - 1),
            };
            match next {
                Some(index) => Ok(state.order[index].controller.id().clone()),
                None => Err(state.current_controller().map(|c| c.id().clone())),
            }
        };

        let id = match (target, step) {
            (Ok(id), _) => id,
            (Err(Some(last)), Step::Forward) => {
                tracing::info!(target: targets::SCHEDULER, last = %last, "sequence finished");
                self.inner.events.emit(SchedulerEvent::SequenceFinished { last });
                return None;
            }
            (Err(_), _) => return None,
        };

        let (controller, previous) = self.make_current(&id)?;
        if let Some(previous) = previous {
            previous.pause().await;
        }
        Some(controller.play().await)
    }

    /// Play the current asset.
    pub async fn play(&self) -> Option<PlayResult> {
        let controller = self.current()?;
        Some(controller.play().await)
    }

    /// Pause the current asset.
    pub async fn pause(&self) {
        if let Some(controller) = self.current() {
            controller.pause().await;
        }
    }

    pub async fn seek(&self, seconds: f64) {
        if let Some(controller) = self.current() {
            controller.seek(seconds).await;
        }
    }

    pub async fn set_volume(&self, percent: u8) {
        if let Some(controller) = self.current() {
            controller.set_volume(percent).await;
        }
    }

    pub async fn set_muted(&self, muted: bool) {
        if let Some(controller) = self.current() {
            controller.set_muted(muted).await;
        }
    }

    /// Update the offline indicator.
    ///
    /// On reconnect only the current asset is retried, and only if it is in
    /// `Error`. Returns the outcome of that retry.
    pub async fn set_online(&self, online: bool) -> Option<bool> {
        let controller = self.update_online(online)?;
        tracing::info!(target: targets::SCHEDULER, asset = %controller.id(), "retrying current asset after reconnect");
        Some(controller.retry().await)
    }

    /// Raise the offline indicator; returns the controller to retry when
    /// coming back online.
    fn update_online(&self, online: bool) -> Option<ResourceController> {
        let (changed, current) = {
            let mut state = self.inner.state.lock();
            let changed = state.offline == online;
            state.offline = !online;
            (changed, state.current_controller())
        };
        if changed {
            tracing::info!(target: targets::SCHEDULER, online, "connectivity changed");
            self.inner
                .events
                .emit(SchedulerEvent::OfflineChanged { offline: !online });
        }
        if !(changed && online) {
            return None;
        }
        current.filter(|controller| controller.lifecycle().is_error())
    }

    /// Follow `monitor`'s online state until the returned guard is dropped.
    ///
    /// Retries run on the tokio runtime current at the time of this call.
    /// Without a runtime only the offline indicator follows the monitor.
    pub fn watch_connectivity(&self, monitor: &ConnectivityMonitor) -> ConnectionGuard<bool> {
        let runtime = tokio::runtime::Handle::try_current().ok();
        if runtime.is_none() {
            tracing::warn!(target: targets::SCHEDULER, "no tokio runtime, reconnect retries disabled");
        }
        let scheduler = self.downgrade();
        monitor.online_state_changed.connect_scoped(move |&online| {
            let Some(scheduler) = scheduler.upgrade() else {
                return;
            };
            let Some(controller) = scheduler.update_online(online) else {
                return;
            };
            if let Some(runtime) = &runtime {
                runtime.spawn(async move {
                    controller.retry().await;
                });
            }
        })
    }

    /// Set `id` as current. Returns its controller and the outgoing one.
    fn make_current(&self, id: &AssetId) -> Option<(ResourceController, Option<ResourceController>)> {
        let (controller, previous) = {
            let mut state = self.inner.state.lock();
            let index = state.position(id)?;
            let controller = state.order[index].controller.clone();
            if state.current == Some(index) {
                return Some((controller, None));
            }
            let previous = state.current_controller();
            state.current = Some(index);
            (controller, previous)
        };

        tracing::debug!(
            target: targets::SCHEDULER,
            from = ?previous.as_ref().map(|c| c.id().as_str()),
            to = %id,
            "current asset changed"
        );
        self.inner.events.emit(SchedulerEvent::CurrentChanged {
            previous: previous.as_ref().map(|c| c.id().clone()),
            current: id.clone(),
        });
        Some((controller, previous))
    }
}

impl fmt::Debug for VisibilityScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("VisibilityScheduler")
            .field("len", &state.order.len())
            .field("current", &state.current)
            .field("offline", &state.offline)
            .field("policy", &self.inner.policy)
            .finish()
    }
}
