//! Prelude module - commonly used test utilities.
//!
//! Use `use herald_test::prelude::*;` in test modules.

pub use crate::{CallLog, ManualScheduler, RecordingDiagnostics, init_test_logging, render_args};
