//! Network quality and connectivity.
//!
//! - [`NetworkQualityDetector`] classifies the link as fast, slow or offline so
//!   the preload layer can pick between full and metadata-only preloads.
//! - [`ConnectivityMonitor`] is the global online/offline signal.

mod monitor;
mod quality;

pub use monitor::{ConnectivityMonitor, check_online_state};
pub use quality::{ConnectionHint, DEFAULT_FAST_THRESHOLD, NetworkQuality, NetworkQualityDetector};
