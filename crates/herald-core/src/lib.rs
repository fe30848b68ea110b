//! Herald Core - Foundation types and traits for the Herald event subsystem.
//!
//! This crate provides:
//! - Event keys, listener identities and max-listener thresholds
//! - The error taxonomy shared by every dispatcher
//! - The diagnostics collaborator that receives warnings and fatal escalations
//! - The scheduler capability used to drive pending listener computations
//! - A pending-completion primitive for bridging push notifications into
//!   suspendable pull consumers

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod completion;
pub mod diagnostics;
pub mod error;
pub mod scheduler;
pub mod types;

pub use completion::{Completion, Resolver};
pub use diagnostics::{Diagnostics, MaxListenersWarning, TracingDiagnostics};
pub use error::{EventsError, EventsResult, ListenerError};
pub use scheduler::{Scheduler, TokioScheduler};
pub use types::{DEFAULT_MAX_LISTENERS, EventArgs, EventKey, ListenerId, MaxListeners};
