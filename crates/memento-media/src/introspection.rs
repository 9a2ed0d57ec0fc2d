//! Read-only debug view over controllers.
//!
//! [`DebugIntrospection`] keeps one [`AssetDebugEntry`] per watched asset,
//! refreshed from the controller's event stream. Apart from the
//! pass-through [`retry`](DebugIntrospection::retry) and
//! [`forced_probe`](DebugIntrospection::forced_probe) it never acts on a
//! controller. Rendering a debug panel is left to the consumer; this module
//! produces a plain-text report and a JSON export.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use futures_util::future::join_all;
use memento_core::ConnectionGuard;
use memento_core::logging::targets;
use memento_net::ProbeResult;
use parking_lot::Mutex;
use serde::Serialize;

use crate::asset::AssetId;
use crate::controller::ResourceController;
use crate::error::{AssetError, MediaError, Result};
use crate::lifecycle::MediaEvent;
use crate::scheduler::VisibilityScheduler;
use crate::state::{AssetRuntimeState, Lifecycle};

/// Debug view of one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetDebugEntry {
    pub id: AssetId,
    pub url: String,
    pub last_error: Option<AssetError>,
    pub load_attempts: u32,
    pub play_attempts: u32,
    /// Label of the most recent controller event.
    pub last_event: Option<&'static str>,
    pub state: AssetRuntimeState,
}

impl AssetDebugEntry {
    fn capture(controller: &ResourceController, last_event: Option<&'static str>) -> Self {
        let state = controller.snapshot();
        Self {
            id: controller.id().clone(),
            url: controller.asset().source_url.clone(),
            last_error: state.last_error.clone(),
            load_attempts: state.load_attempts,
            play_attempts: state.play_attempts,
            last_event,
            state,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle
    }
}

struct Watched {
    controller: ResourceController,
    entry: Arc<Mutex<AssetDebugEntry>>,
    _subscription: ConnectionGuard<MediaEvent>,
}

/// Debug entries for a set of controllers, in watch order.
#[derive(Default)]
pub struct DebugIntrospection {
    watched: Mutex<Vec<Watched>>,
}

impl DebugIntrospection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch every asset `scheduler` currently tracks.
    pub fn for_scheduler(scheduler: &VisibilityScheduler) -> Self {
        let introspection = Self::new();
        for controller in scheduler.controllers() {
            introspection.watch(&controller);
        }
        introspection
    }

    /// Start keeping an entry for `controller`. Watching twice is a no-op.
    pub fn watch(&self, controller: &ResourceController) {
        let mut watched = self.watched.lock();
        if watched.iter().any(|w| w.controller.id() == controller.id()) {
            return;
        }

        let entry = Arc::new(Mutex::new(AssetDebugEntry::capture(controller, None)));
        let sink = Arc::clone(&entry);
        let weak = controller.downgrade();
        let subscription = controller.events().connect_scoped(move |event| {
            if let Some(controller) = weak.upgrade() {
                *sink.lock() = AssetDebugEntry::capture(&controller, Some(event.as_label()));
            }
        });

        tracing::trace!(target: targets::INTROSPECTION, asset = %controller.id(), "watching asset");
        watched.push(Watched {
            controller: controller.clone(),
            entry,
            _subscription: subscription,
        });
    }

    /// Stop watching `id`. Returns whether it was watched.
    pub fn unwatch(&self, id: &AssetId) -> bool {
        let mut watched = self.watched.lock();
        let before = watched.len();
        watched.retain(|w| w.controller.id() != id);
        watched.len() != before
    }

    pub fn len(&self) -> usize {
        self.watched.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.lock().is_empty()
    }

    pub fn entries(&self) -> Vec<AssetDebugEntry> {
        self.watched.lock().iter().map(|w| w.entry.lock().clone()).collect()
    }

    pub fn entry(&self, id: &AssetId) -> Option<AssetDebugEntry> {
        self.watched
            .lock()
            .iter()
            .find(|w| w.controller.id() == id)
            .map(|w| w.entry.lock().clone())
    }

    /// Explicit retry of `id`, resetting its attempt counters.
    pub async fn retry(&self, id: &AssetId) -> Result<bool> {
        let controller = self.controller(id)?;
        tracing::info!(target: targets::INTROSPECTION, asset = %id, "retry from debug view");
        Ok(controller.retry().await)
    }

    /// Probe `id` again without changing its state.
    pub async fn forced_probe(&self, id: &AssetId) -> Result<ProbeResult> {
        let controller = self.controller(id)?;
        Ok(controller.forced_probe().await)
    }

    /// Probe every watched asset concurrently.
    pub async fn probe_all(&self) -> Vec<(AssetId, ProbeResult)> {
        let controllers: Vec<ResourceController> =
            self.watched.lock().iter().map(|w| w.controller.clone()).collect();
        join_all(controllers.iter().map(|controller| async move {
            (controller.id().clone(), controller.forced_probe().await)
        }))
        .await
    }

    /// One line per asset.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for entry in self.entries() {
            let _ = write!(
                out,
                "{} [{}] load={} play={} url={}",
                entry.id,
                entry.state.lifecycle,
                entry.load_attempts,
                entry.play_attempts,
                entry.url
            );
            if let Some(probe) = &entry.state.url_probe_result {
                match probe.http_status {
                    Some(status) => {
                        let _ = write!(out, " probe={status}");
                    }
                    None if !probe.accessible => out.push_str(" probe=failed"),
                    None => {}
                }
            }
            if let Some(error) = &entry.last_error {
                let _ = write!(out, " error=\"{error}\"");
            }
            out.push('\n');
        }
        out
    }

    /// Entries as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries())?)
    }

    fn controller(&self, id: &AssetId) -> Result<ResourceController> {
        self.watched
            .lock()
            .iter()
            .find(|w| w.controller.id() == id)
            .map(|w| w.controller.clone())
            .ok_or_else(|| MediaError::UnknownAsset(id.to_string()))
    }
}

impl fmt::Debug for DebugIntrospection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugIntrospection")
            .field("watched", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::context::MediaContext;
    use crate::error::ErrorKind;
    use crate::testing::{ScriptedFactory, StaticProbe};

    fn context(probe: &StaticProbe) -> MediaContext {
        MediaContext::new(Arc::new(probe.clone()), Arc::new(ScriptedFactory::new()))
    }

    #[tokio::test]
    async fn entries_follow_controller_events() {
        let probe = StaticProbe::new();
        probe.unreachable("https://example.invalid/a.mp4");
        let context = context(&probe);
        let bad = ResourceController::new(Asset::video("a", "https://example.invalid/a.mp4"), context.clone());
        let good = ResourceController::new(Asset::video("b", "https://cdn.example.com/b.mp4"), context);

        let introspection = DebugIntrospection::new();
        introspection.watch(&bad);
        introspection.watch(&good);
        introspection.watch(&good);
        assert_eq!(introspection.len(), 2);

        bad.request_load(false).await;
        good.request_load(false).await;

        let entry = introspection.entry(&AssetId::new("a")).unwrap();
        assert_eq!(entry.lifecycle(), Lifecycle::Error(ErrorKind::UrlUnreachable));
        assert_eq!(entry.load_attempts, 1);
        assert_eq!(entry.last_error.unwrap().kind, ErrorKind::UrlUnreachable);
        assert_eq!(entry.last_event, Some("error"));

        let entry = introspection.entry(&AssetId::new("b")).unwrap();
        assert_eq!(entry.lifecycle(), Lifecycle::Ready);
        assert_eq!(entry.state.duration_seconds, Some(60.0));

        let report = introspection.report();
        assert!(report.contains("a [error (url unreachable)] load=1 play=0"));
        assert!(report.contains("probe=failed"));
        assert!(report.contains("b [ready] load=1 play=0"));
    }

    #[tokio::test]
    async fn retry_passes_through() {
        let probe = StaticProbe::new();
        let url = "https://cdn.example.com/a.mp4";
        probe.unreachable(url);
        let controller = ResourceController::new(Asset::video("a", url), context(&probe));
        let introspection = DebugIntrospection::new();
        introspection.watch(&controller);
        controller.request_load(false).await;

        probe.set(url, ProbeResult::accessible(200));
        assert!(introspection.retry(&AssetId::new("a")).await.unwrap());
        assert_eq!(introspection.entry(&AssetId::new("a")).unwrap().lifecycle(), Lifecycle::Ready);

        let missing = introspection.retry(&AssetId::new("zz")).await;
        assert!(matches!(missing, Err(MediaError::UnknownAsset(_))));
    }

    #[tokio::test]
    async fn forced_probes_do_not_touch_state() {
        let probe = StaticProbe::new();
        let context = context(&probe);
        let introspection = DebugIntrospection::new();
        for id in ["a", "b"] {
            let controller = ResourceController::new(
                Asset::video(id, format!("https://cdn.example.com/{id}.mp4")),
                context.clone(),
            );
            introspection.watch(&controller);
        }
        probe.set("https://cdn.example.com/b.mp4", ProbeResult::status(404));

        let results = introspection.probe_all().await;

        assert_eq!(results.len(), 2);
        assert!(results[0].1.accessible);
        assert_eq!(results[1].1.http_status, Some(404));
        assert!(introspection.entries().iter().all(|e| e.lifecycle() == Lifecycle::Idle));
    }

    #[tokio::test]
    async fn exports_json() {
        let probe = StaticProbe::new();
        let controller = ResourceController::new(
            Asset::video("hero", "https://cdn.example.com/hero.mp4"),
            context(&probe),
        );
        let introspection = DebugIntrospection::new();
        introspection.watch(&controller);
        controller.request_load(false).await;

        let json: serde_json::Value = serde_json::from_str(&introspection.to_json().unwrap()).unwrap();

        assert_eq!(json[0]["id"], "hero");
        assert_eq!(json[0]["load_attempts"], 1);
        assert_eq!(json[0]["state"]["lifecycle"]["state"], "ready");
        assert!(introspection.unwatch(&AssetId::new("hero")));
        assert!(introspection.is_empty());
    }
}
