//! Logging facilities for Memento.
//!
//! Memento uses the `tracing` crate for instrumentation. Libraries never
//! install a subscriber; to see logs, install one in the host application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("memento_media=debug,memento_net=info")
//!         .init();
//! }
//! ```
//!
//! Every crate logs under the stable targets below so hosts can filter per
//! subsystem.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "memento_core::signal";
    /// HTTP client target.
    pub const HTTP: &str = "memento_net::http";
    /// URL accessibility probe target.
    pub const PROBE: &str = "memento_net::probe";
    /// Network quality and connectivity target.
    pub const NETWORK: &str = "memento_net::network";
    /// Asset registry target.
    pub const REGISTRY: &str = "memento_media::registry";
    /// Per-asset resource controller target.
    pub const CONTROLLER: &str = "memento_media::controller";
    /// Preload cache target.
    pub const CACHE: &str = "memento_media::cache";
    /// Visibility scheduler target.
    pub const SCHEDULER: &str = "memento_media::scheduler";
    /// Debug introspection target.
    pub const INTROSPECTION: &str = "memento_media::introspection";
}

/// Span names used throughout Memento for tracing.
pub mod span_names {
    /// A single load attempt of one asset.
    pub const LOAD_ATTEMPT: &str = "memento::load_attempt";
    /// A single play attempt of one asset.
    pub const PLAY_ATTEMPT: &str = "memento::play_attempt";
    /// A preload of one URL.
    pub const PRELOAD: &str = "memento::preload";
}
