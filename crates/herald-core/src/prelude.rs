//! Prelude module - commonly used types for convenient import.
//!
//! Use `use herald_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{EventsError, EventsResult, ListenerError};

// Keys and identities
pub use crate::{DEFAULT_MAX_LISTENERS, EventArgs, EventKey, ListenerId, MaxListeners};

// Collaborators
pub use crate::{Diagnostics, MaxListenersWarning, Scheduler, TokioScheduler, TracingDiagnostics};

// Completion primitive
pub use crate::{Completion, Resolver};
