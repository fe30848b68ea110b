//! Herald Test - Shared test utilities for the Herald event subsystem.
//!
//! This crate provides recorders, mock collaborators and logging setup that
//! can be used across Herald crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! herald-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust
//! use herald_events::EventEmitter;
//! use herald_test::CallLog;
//! use serde_json::json;
//!
//! let log = CallLog::new();
//! let emitter = EventEmitter::new();
//! emitter.on("x", &log.listener("L1")).unwrap();
//! emitter.prepend_listener("x", &log.listener("L2")).unwrap();
//! emitter.emit("x", &[json!(7)]).unwrap();
//! assert_eq!(log.entries(), ["L2(7)", "L1(7)"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod calls;
pub mod logging;
pub mod mocks;

pub use calls::{CallLog, render_args};
pub use logging::init_test_logging;
pub use mocks::{ManualScheduler, RecordingDiagnostics};
