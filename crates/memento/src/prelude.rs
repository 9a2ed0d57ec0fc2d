//! Prelude module for Memento.
//!
//! ```ignore
//! use memento::prelude::*;
//! ```

// ============================================================================
// Signal/Slot
// ============================================================================

pub use crate::{ConnectionGuard, ConnectionId, Signal};

// ============================================================================
// Networking
// ============================================================================

#[cfg(feature = "net")]
pub use crate::net::{
    ConnectivityMonitor, HttpClient, HttpProbe, NetworkQuality, NetworkQualityDetector,
    ProbeResult, UrlProbe,
};

// ============================================================================
// Media
// ============================================================================

#[cfg(feature = "media")]
pub use crate::media::{
    AdvancePolicy, Asset, AssetId, AssetRegistry, AutoAdvance, Category, DebugIntrospection,
    ElementEvent, ElementFactory, ErrorKind, Lifecycle, MediaConfig, MediaContext, MediaElement,
    MediaEvent, MediaHandle, PlayResult, PreloadCache, PreloadPriority, ResourceController,
    SchedulerEvent, VisibilityScheduler,
};
