//! Core primitives for Memento.
//!
//! This crate provides the foundational pieces shared by the networking and
//! media crates:
//!
//! - **Signal/Slot System**: Type-safe observer notifications ([`Signal`])
//! - **Logging**: Stable `tracing` targets and span names ([`logging`])
//!
//! # Signal/Slot Example
//!
//! ```
//! use memento_core::Signal;
//!
//! let volume_changed = Signal::<u8>::new();
//!
//! let conn_id = volume_changed.connect(|percent| {
//!     println!("Volume changed to: {}%", percent);
//! });
//!
//! volume_changed.emit(80);
//! volume_changed.disconnect(conn_id);
//! ```

pub mod logging;
pub mod signal;

pub use signal::{ConnectionGuard, ConnectionId, Signal};
