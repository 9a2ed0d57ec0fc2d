//! Advance to the next asset when the current one ends.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use memento_core::ConnectionGuard;
use memento_core::logging::targets;

use crate::asset::AssetId;
use crate::scheduler::{SchedulerEvent, VisibilityScheduler, WeakScheduler};
use crate::state::Lifecycle;

/// Subscriber that advances a [`VisibilityScheduler`] after the current
/// asset ends.
///
/// Advancing waits a short debounce first; a later `ended` restarts the
/// wait. Nothing happens if the ended asset is no longer current or no
/// longer ended when the wait elapses. Dropping the subscriber stops it.
pub struct AutoAdvance {
    debounce: Duration,
    _subscription: ConnectionGuard<SchedulerEvent>,
}

impl AutoAdvance {
    /// Attach with the debounce from the scheduler's configuration.
    pub fn attach(scheduler: &VisibilityScheduler) -> Self {
        let debounce = scheduler.context().config().advance_debounce();
        Self::with_debounce(scheduler, debounce)
    }

    pub fn with_debounce(scheduler: &VisibilityScheduler, debounce: Duration) -> Self {
        let weak = scheduler.downgrade();
        let generation = Arc::new(AtomicU64::new(0));
        let subscription = scheduler.events().connect_scoped(move |event| {
            if let SchedulerEvent::AssetEnded(id) = event {
                schedule(&weak, &generation, id, debounce);
            }
        });
        Self {
            debounce,
            _subscription: subscription,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}

fn schedule(weak: &WeakScheduler, generation: &Arc<AtomicU64>, id: &AssetId, debounce: Duration) {
    let Some(scheduler) = weak.upgrade() else {
        return;
    };
    if scheduler.current_id().as_ref() != Some(id) {
        tracing::trace!(target: targets::SCHEDULER, asset = %id, "ended asset is not current");
        return;
    }
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::warn!(target: targets::SCHEDULER, asset = %id, "no tokio runtime, cannot auto-advance");
        return;
    };

    let ticket = generation.fetch_add(1, Ordering::SeqCst) + 1;
    let generation = Arc::clone(generation);
    let weak = weak.clone();
    let id = id.clone();
    runtime.spawn(async move {
        tokio::time::sleep(debounce).await;
        if generation.load(Ordering::SeqCst) != ticket {
            return;
        }
        let Some(scheduler) = weak.upgrade() else {
            return;
        };
        let still_ended = scheduler
            .current()
            .is_some_and(|current| current.id() == &id && current.lifecycle() == Lifecycle::Ended);
        if !still_ended {
            return;
        }
        tracing::debug!(target: targets::SCHEDULER, asset = %id, "auto-advancing");
        scheduler.advance_to_next().await;
    });
}

impl fmt::Debug for AutoAdvance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoAdvance")
            .field("debounce", &self.debounce)
            .finish()
    }
}
