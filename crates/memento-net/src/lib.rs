//! Networking module for Memento.
//!
//! This crate provides the network-facing half of the media engine:
//!
//! - **HTTP Client**: a thin, cloneable wrapper over `reqwest` ([`http`])
//! - **Accessibility Probe**: body-less reachability checks ([`probe`])
//! - **Network Quality**: fast/slow/offline classification and the global
//!   online/offline signal ([`network`])
//!
//! # Probing a URL
//!
//! ```ignore
//! use memento_net::probe::{HttpProbe, UrlProbe};
//!
//! let probe = HttpProbe::default();
//! let result = probe.check("https://cdn.example.com/clip.mp4").await;
//! if !result.accessible {
//!     eprintln!("unreachable: {:?}", result.error_message);
//! }
//! ```
//!
//! # Watching Connectivity
//!
//! ```ignore
//! use memento_net::network::ConnectivityMonitor;
//!
//! let monitor = ConnectivityMonitor::new();
//! monitor.online_state_changed.connect(|online| {
//!     println!("online: {online}");
//! });
//! monitor.start()?;
//! ```

pub mod error;
pub mod http;
pub mod network;
pub mod probe;

pub use error::{NetworkError, Result};
pub use http::{HttpClient, HttpClientBuilder, HttpClientConfig, HttpResponse};
pub use network::{ConnectionHint, ConnectivityMonitor, NetworkQuality, NetworkQualityDetector};
pub use probe::{HttpProbe, ProbeResult, UrlProbe};
