//! Online/offline connectivity monitoring.

use std::sync::Arc;

use memento_core::Signal;
use memento_core::logging::targets;
use parking_lot::Mutex;

use crate::error::{NetworkError, Result};

/// Tracks whether the host is online and emits a signal on every change.
///
/// The initial state comes from interface enumeration. [`start`](Self::start)
/// watches platform interface changes; [`set_online`](Self::set_online) lets
/// an embedder forward its own online/offline notifications.
///
/// # Example
///
/// ```ignore
/// use memento_net::network::ConnectivityMonitor;
///
/// let monitor = ConnectivityMonitor::new();
/// monitor.online_state_changed.connect(|online| {
///     println!("online: {online}");
/// });
/// monitor.start()?;
/// ```
pub struct ConnectivityMonitor {
    /// Signal emitted when the online state changes.
    pub online_state_changed: Arc<Signal<bool>>,

    inner: Arc<Mutex<MonitorInner>>,
}

struct MonitorInner {
    is_online: bool,
    // Dropping the handle stops the watcher.
    watcher: Option<netwatcher::WatchHandle>,
}

impl ConnectivityMonitor {
    /// Create a monitor seeded from the host's network interfaces.
    pub fn new() -> Self {
        Self::with_initial_state(check_online_state())
    }

    /// Create a monitor with a known initial state and no platform lookup.
    pub fn with_initial_state(is_online: bool) -> Self {
        Self {
            online_state_changed: Arc::new(Signal::new()),
            inner: Arc::new(Mutex::new(MonitorInner {
                is_online,
                watcher: None,
            })),
        }
    }

    /// Whether the host is currently considered online.
    pub fn is_online(&self) -> bool {
        self.inner.lock().is_online
    }

    /// Start watching platform interface changes. Idempotent.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.watcher.is_some() {
            return Ok(());
        }

        let signal = Arc::clone(&self.online_state_changed);
        let state = Arc::clone(&self.inner);
        let handle = netwatcher::watch_interfaces(move |_update| {
            apply(&state, &signal, check_online_state());
        })
        .map_err(|e| NetworkError::Io(e.to_string()))?;

        inner.watcher = Some(handle);
        tracing::debug!(target: targets::NETWORK, "connectivity watcher started");
        Ok(())
    }

    /// Stop watching platform changes. The last known state is kept.
    pub fn stop(&self) {
        self.inner.lock().watcher = None;
    }

    /// Whether the platform watcher is running.
    pub fn is_running(&self) -> bool {
        self.inner.lock().watcher.is_some()
    }

    /// Force the online state. Emits only when the state changes.
    pub fn set_online(&self, online: bool) {
        apply(&self.inner, &self.online_state_changed, online);
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("is_online", &self.is_online())
            .field("is_running", &self.is_running())
            .finish()
    }
}

fn apply(state: &Mutex<MonitorInner>, signal: &Signal<bool>, online: bool) {
    let changed = {
        let mut guard = state.lock();
        let changed = guard.is_online != online;
        guard.is_online = online;
        changed
    };
    if changed {
        tracing::info!(target: targets::NETWORK, online, "online state changed");
        signal.emit(online);
    }
}

/// Whether any non-loopback interface is up with an address assigned.
pub fn check_online_state() -> bool {
    netdev::get_interfaces().iter().any(|iface| {
        iface.is_up() && !iface.is_loopback() && (!iface.ipv4.is_empty() || !iface.ipv6.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn set_online_emits_on_change_only() {
        let monitor = ConnectivityMonitor::with_initial_state(true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        monitor
            .online_state_changed
            .connect(move |online| seen_clone.lock().push(*online));

        monitor.set_online(true);
        monitor.set_online(false);
        monitor.set_online(false);
        monitor.set_online(true);

        assert_eq!(*seen.lock(), vec![false, true]);
        assert!(monitor.is_online());
    }

    #[test]
    fn slot_can_read_state() {
        let monitor = Arc::new(ConnectivityMonitor::with_initial_state(true));
        let observed = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&monitor);
        let observed_clone = Arc::clone(&observed);
        monitor.online_state_changed.connect(move |online| {
            if let Some(monitor) = weak.upgrade() {
                assert_eq!(monitor.is_online(), *online);
                observed_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        monitor.set_online(false);
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn not_running_until_started() {
        let monitor = ConnectivityMonitor::with_initial_state(false);
        assert!(!monitor.is_running());
        monitor.stop();
        assert!(!monitor.is_running());
    }
}
