//! Emitter-style surface over an [`EventTarget`].
//!
//! Listeners receive the dispatched event's detail rather than the event
//! record; `emit` dispatches a custom event carrying its argument.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use herald_core::{Diagnostics, EventsResult, ListenerError, ListenerId};
use serde_json::Value;
use tracing::trace;

use crate::event::Event;
use crate::listener::EventListener;
use crate::target::{EventTarget, ListenerOptions};

/// Listener for a [`NodeEventTarget`], called with the event detail.
///
/// Events without a detail pass [`Value::Null`].
#[derive(Clone, PartialEq, Eq)]
pub struct NodeListener {
    inner: EventListener,
}

impl NodeListener {
    /// Wrap an infallible callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self::fallible(move |detail| {
            f(detail);
            Ok(())
        })
    }

    /// Wrap a callback whose error propagates out of `emit`.
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        Self {
            inner: EventListener::fallible(move |_, event: &Event| {
                f(event.detail().unwrap_or(&Value::Null))
            }),
        }
    }

    /// Identity of this listener.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.inner.id()
    }

    /// The target-level listener this wraps.
    #[must_use]
    pub fn as_event_listener(&self) -> &EventListener {
        &self.inner
    }
}

impl fmt::Debug for NodeListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeListener")
            .field("id", &self.id())
            .finish()
    }
}

/// [`EventTarget`] with `on`/`once`/`off`/`emit`.
///
/// Dereferences to the underlying target for everything else.
#[derive(Debug, Clone, Default)]
pub struct NodeEventTarget {
    target: EventTarget,
}

impl NodeEventTarget {
    /// Create a target configured from the process defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a target reporting to `diagnostics`.
    #[must_use]
    pub fn with_diagnostics(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            target: EventTarget::with_diagnostics(diagnostics),
        }
    }

    /// The underlying target.
    #[must_use]
    pub fn target(&self) -> &EventTarget {
        &self.target
    }

    /// Register a persistent listener.
    pub fn on(&self, event_type: &str, listener: &NodeListener) -> &Self {
        self.target
            .add_event_listener(event_type, &listener.inner, ListenerOptions::new());
        self
    }

    /// Alias for [`on`](Self::on).
    pub fn add_listener(&self, event_type: &str, listener: &NodeListener) -> &Self {
        self.on(event_type, listener)
    }

    /// Register a listener removed before its first invocation.
    pub fn once(&self, event_type: &str, listener: &NodeListener) -> &Self {
        self.target.add_event_listener(
            event_type,
            &listener.inner,
            ListenerOptions::new().once(true),
        );
        self
    }

    /// Remove a listener registered with `on`/`once`.
    pub fn off(&self, event_type: &str, listener: &NodeListener) -> &Self {
        self.target
            .remove_event_listener(event_type, &listener.inner, false);
        self
    }

    /// Alias for [`off`](Self::off).
    pub fn remove_listener(&self, event_type: &str, listener: &NodeListener) -> &Self {
        self.off(event_type, listener)
    }

    /// Remove the listeners of `event_type`, or of every type when `None`.
    pub fn remove_all_listeners(&self, event_type: Option<&str>) -> &Self {
        self.target
            .remove_all(event_type.map(herald_core::EventKey::from).as_ref());
        self
    }

    /// Dispatch a custom event whose detail is `arg`.
    ///
    /// Returns whether any listener was registered for `event_type`.
    ///
    /// # Errors
    ///
    /// Returns [`herald_core::EventsError::Listener`] if a listener fails.
    pub fn emit(&self, event_type: &str, arg: Value) -> EventsResult<bool> {
        let had_listeners = self.target.listener_count(event_type) > 0;
        trace!(event_type, had_listeners, "Node-style emit");
        self.target.dispatch_event(&Event::custom(event_type, arg))?;
        Ok(had_listeners)
    }
}

impl Deref for NodeEventTarget {
    type Target = EventTarget;

    fn deref(&self) -> &Self::Target {
        &self.target
    }
}
