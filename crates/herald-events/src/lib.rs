//! Herald Events - Event emitters, event targets and async bridges.
//!
//! This crate provides:
//! - [`EventEmitter`]: synchronous named-event dispatch with `once`/prepend
//!   registration, `newListener`/`removeListener` notifications, max-listener
//!   warnings and the fatal unhandled-`error` contract
//! - [`EventTarget`] and [`Event`]: structured-event dispatch with capture
//!   identity, `once` and signal-bound listeners, and
//!   [`NodeEventTarget`] for an emitter-style surface over a target
//! - [`AbortController`] / [`AbortSignal`] and [`add_abort_listener`] for
//!   cooperative cancellation
//! - [`once()`] and [`on()`]: push-to-pull bridges awaiting one emission or
//!   streaming every emission of a key
//!
//! # Reentrancy
//!
//! Dispatch iterates a snapshot of the listener list taken when it starts.
//! Listeners receive the dispatcher and may register, remove or emit from
//! inside a callback; no lock is held while a callback runs.
//!
//! # Example
//!
//! ```rust
//! use herald_events::{EventEmitter, Listener};
//! use serde_json::json;
//!
//! let emitter = EventEmitter::new();
//! emitter
//!     .on("ping", &Listener::new(|_, args| assert_eq!(args, [json!(7)])))
//!     .unwrap();
//! assert!(emitter.emit("ping", &[json!(7)]).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod abort;
mod bridge;
pub mod defaults;
pub mod dispatcher;
mod emitter;
mod event;
mod iter;
mod listener;
mod node_target;
mod once;
mod registry;
mod target;

pub use abort::{AbortController, AbortSignal, SubscriptionHandle, add_abort_listener};
pub use defaults::EventDefaults;
pub use dispatcher::{
    Dispatcher, ListenerLimit, get_event_listeners, get_max_listeners, listener_count,
    set_max_listeners,
};
pub use emitter::{
    EmitterOptions, EventEmitter, ListenerMode, RawListener, RejectionHandler, WeakEmitter,
};
pub use event::{Event, EventInit};
pub use iter::{EventIterator, OnOptions, on};
pub use listener::{EventListener, Listener, ListenerReturn, PendingListener};
pub use node_target::{NodeEventTarget, NodeListener};
pub use once::{OnceAwaiter, OnceOptions, once};
pub use target::{EventTarget, ListenerOptions};

pub use herald_core::{
    DEFAULT_MAX_LISTENERS, EventArgs, EventKey, EventsError, EventsResult, ListenerError,
    ListenerId, MaxListeners,
};
