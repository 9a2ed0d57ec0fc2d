//! Exclusive playback slot.
//!
//! At most one asset plays at a time. A controller claims the slot before it
//! starts its element; the claim pauses whoever held the slot before.

use std::fmt;
use std::sync::{Arc, Weak};

use memento_core::logging::targets;
use parking_lot::Mutex;

use crate::asset::AssetId;

/// Something that can be asked to stop playing.
pub trait PlaybackHolder: Send + Sync {
    /// Pause playback because another asset claimed the slot.
    fn yield_playback(&self);
}

struct Holder {
    id: AssetId,
    handle: Weak<dyn PlaybackHolder>,
}

/// Shared exclusive-playback slot. Clones share the slot.
#[derive(Clone, Default)]
pub struct PlaybackArbiter {
    holder: Arc<Mutex<Option<Holder>>>,
}

impl PlaybackArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot for `id`, pausing the previous holder.
    ///
    /// Claiming a slot already held by `id` does nothing.
    pub fn claim(&self, id: &AssetId, handle: Weak<dyn PlaybackHolder>) {
        let previous = {
            let mut slot = self.holder.lock();
            if slot.as_ref().is_some_and(|holder| &holder.id == id) {
                return;
            }
            slot.replace(Holder {
                id: id.clone(),
                handle,
            })
        };

        if let Some(previous) = previous {
            tracing::debug!(
                target: targets::CONTROLLER,
                from = %previous.id,
                to = %id,
                "playback slot handed over"
            );
            // Called without the slot lock: the holder's pause re-enters controllers.
            if let Some(handle) = previous.handle.upgrade() {
                handle.yield_playback();
            }
        }
    }

    /// Give up the slot if `id` holds it.
    pub fn release(&self, id: &AssetId) {
        let mut slot = self.holder.lock();
        if slot.as_ref().is_some_and(|holder| &holder.id == id) {
            *slot = None;
        }
    }

    /// The current holder.
    pub fn holder(&self) -> Option<AssetId> {
        self.holder.lock().as_ref().map(|holder| holder.id.clone())
    }
}

impl fmt::Debug for PlaybackArbiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackArbiter")
            .field("holder", &self.holder())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl PlaybackHolder for Counter {
        fn yield_playback(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn weak(counter: &Arc<Counter>) -> Weak<dyn PlaybackHolder> {
        let weak: Weak<Counter> = Arc::downgrade(counter);
        weak
    }

    #[test]
    fn claim_pauses_previous_holder() {
        let arbiter = PlaybackArbiter::new();
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());

        arbiter.claim(&AssetId::new("a"), weak(&a));
        arbiter.claim(&AssetId::new("a"), weak(&a));
        assert_eq!(a.0.load(Ordering::SeqCst), 0);

        arbiter.claim(&AssetId::new("b"), weak(&b));
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 0);
        assert_eq!(arbiter.holder(), Some(AssetId::new("b")));
    }

    #[test]
    fn release_only_by_holder() {
        let arbiter = PlaybackArbiter::new();
        let a = Arc::new(Counter::default());
        arbiter.claim(&AssetId::new("a"), weak(&a));

        arbiter.release(&AssetId::new("b"));
        assert_eq!(arbiter.holder(), Some(AssetId::new("a")));
        arbiter.release(&AssetId::new("a"));
        assert_eq!(arbiter.holder(), None);
    }

    #[test]
    fn dropped_holder_is_skipped() {
        let arbiter = PlaybackArbiter::new();
        {
            let a = Arc::new(Counter::default());
            arbiter.claim(&AssetId::new("a"), weak(&a));
        }
        let b = Arc::new(Counter::default());
        arbiter.claim(&AssetId::new("b"), weak(&b));
        assert_eq!(arbiter.holder(), Some(AssetId::new("b")));
    }
}
