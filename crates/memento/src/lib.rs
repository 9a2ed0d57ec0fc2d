//! Memento - media asset lifecycle engine for commemorative pages.
//!
//! This is the umbrella crate that re-exports the public APIs of the
//! workspace crates.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use memento::prelude::*;
//!
//! let context = MediaContext::new(
//!     Arc::new(HttpProbe::new(HttpClient::new())),
//!     Arc::new(my_element_factory),
//! );
//! let gallery = VisibilityScheduler::with_assets(
//!     context,
//!     AdvancePolicy::Stop,
//!     registry.assets(Category::Videos),
//! )?;
//! let _advance = AutoAdvance::attach(&gallery);
//! ```

pub use memento_core::*;

/// Networking module: HTTP client, accessibility probe, connectivity.
#[cfg(feature = "net")]
pub mod net {
    pub use memento_net::*;
}

/// Media module: controllers, scheduler, preload cache, introspection.
#[cfg(feature = "media")]
pub mod media {
    pub use memento_media::*;
}

pub mod prelude;
