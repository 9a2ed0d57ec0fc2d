//! Media module for Memento.
//!
//! This crate drives the audio and video assets of a commemorative page
//! through their lifecycle:
//!
//! - **Resource control**: per-asset state machine with probing, bounded
//!   load and play attempts, and muted autoplay fallback ([`ResourceController`])
//! - **Scheduling**: visibility-driven current asset, explicit navigation and
//!   auto-advance ([`VisibilityScheduler`], [`AutoAdvance`])
//! - **Preloading**: shared cache of initialized media handles ([`PreloadCache`])
//! - **Introspection**: read-only debug view with JSON export ([`DebugIntrospection`])
//! - **Registry**: the page's asset catalogue loaded from TOML ([`AssetRegistry`])
//!
//! Media playback itself is delegated to a [`MediaElement`] implementation
//! supplied by the embedder; [`testing`] ships a scripted one.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use memento_media::{AdvancePolicy, AssetRegistry, AutoAdvance, Category, MediaContext, VisibilityScheduler};
//! use memento_net::{HttpClient, HttpProbe};
//!
//! let registry = AssetRegistry::from_toml(&std::fs::read_to_string("assets.toml")?)?;
//! let context = MediaContext::new(
//!     Arc::new(HttpProbe::new(HttpClient::new())),
//!     Arc::new(my_element_factory),
//! );
//!
//! let scheduler = VisibilityScheduler::with_assets(
//!     context,
//!     AdvancePolicy::Stop,
//!     registry.assets(Category::Videos),
//! )?;
//! let _advance = AutoAdvance::attach(&scheduler);
//!
//! // From the page's intersection observer:
//! scheduler.on_visibility(&"tribute".into(), 0.8).await;
//! scheduler.play().await;
//! ```

mod arbiter;
mod asset;
mod auto_advance;
mod cache;
mod config;
mod context;
mod controller;
mod element;
mod error;
mod introspection;
pub mod lifecycle;
mod registry;
mod retry;
mod scheduler;
mod state;
pub mod testing;

pub use arbiter::{PlaybackArbiter, PlaybackHolder};
pub use asset::{Asset, AssetId, AssetKind};
pub use auto_advance::AutoAdvance;
pub use cache::{PreloadCache, PreloadError, PreloadPriority, preload_mode};
pub use config::{MediaConfig, RetrySettings};
pub use context::MediaContext;
pub use controller::{PlayResult, ResourceController};
pub use element::{ElementEvent, ElementFactory, MediaElement, MediaHandle, PlayRejected, PreloadMode};
pub use error::{AssetError, ConfigError, ErrorKind, MediaError, MediaErrorKind, Result};
pub use introspection::{AssetDebugEntry, DebugIntrospection};
pub use lifecycle::MediaEvent;
pub use registry::{AssetRegistry, Category, RegistryEntry};
pub use retry::{JitterPolicy, RetryPolicy};
pub use scheduler::{AdvancePolicy, SchedulerEvent, VisibilityScheduler};
pub use state::{AssetRuntimeState, Lifecycle, NetworkState, ProbeSnapshot, ReadyLevel};
