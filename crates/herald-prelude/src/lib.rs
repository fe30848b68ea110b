//! Unified prelude for the Herald event subsystem.
//!
//! This crate provides a single import to bring in all commonly used types
//! from across Herald.
//!
//! # Usage
//!
//! ```rust
//! use herald_prelude::*;
//!
//! // Now you have access to types from:
//! // - herald-core (keys, errors, diagnostics, scheduler)
//! // - herald-events (emitters, targets, signals, async bridges)
//! // - herald-config (configuration loading)
//! // - herald-telemetry (logging setup)
//! let emitter = EventEmitter::new();
//! assert_eq!(emitter.max_listeners(), MaxListeners::Limited(DEFAULT_MAX_LISTENERS));
//! ```
//!
//! # Per-Crate Preludes
//!
//! If you only need types from specific crates, use their individual preludes:
//!
//! ```rust
//! use herald_core::prelude::*;
//! use herald_events::prelude::*;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

// Re-export all crate preludes
pub use herald_core::prelude::*;
pub use herald_events::prelude::*;
pub use herald_telemetry::prelude::*;

// Configuration
pub use herald_config::{Config, ConfigError, ConfigResult};
