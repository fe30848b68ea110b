//! Prelude module - commonly used types for convenient import.
//!
//! Use `use herald_events::prelude::*;` to import all essential types.

// Emitter
pub use crate::{EmitterOptions, EventEmitter, Listener, ListenerMode, RawListener};

// Target
pub use crate::{
    Event, EventInit, EventListener, EventTarget, ListenerOptions, NodeEventTarget, NodeListener,
};

// Cancellation
pub use crate::{AbortController, AbortSignal, SubscriptionHandle, add_abort_listener};

// Async bridges
pub use crate::{EventIterator, OnOptions, OnceAwaiter, OnceOptions, on, once};

// Utilities
pub use crate::{
    Dispatcher, ListenerLimit, get_event_listeners, get_max_listeners, listener_count,
    set_max_listeners,
};

// Core types
pub use crate::{EventKey, EventsError, EventsResult, ListenerError, MaxListeners};
