//! Utilities that work across every dispatcher kind.

use herald_core::{EventKey, EventsResult, MaxListeners};
use tracing::debug;

use crate::abort::AbortSignal;
use crate::defaults;
use crate::emitter::EventEmitter;
use crate::listener::{EventListener, Listener};
use crate::node_target::NodeEventTarget;
use crate::target::EventTarget;

/// Read access to a dispatcher's listener lists.
pub trait Dispatcher {
    /// Listener type stored by this dispatcher.
    type Listener: Clone;

    /// Number of listeners registered for `key`.
    fn listener_count(&self, key: &EventKey) -> usize;

    /// Keys with at least one listener.
    fn event_names(&self) -> Vec<EventKey>;

    /// Copies of the listeners registered for `key`.
    fn listeners_for(&self, key: &EventKey) -> Vec<Self::Listener>;
}

/// Per-instance listener threshold.
pub trait ListenerLimit {
    /// Current threshold.
    fn max_listeners(&self) -> MaxListeners;

    /// Replace the threshold.
    fn set_max_listeners(&self, max: MaxListeners);
}

impl Dispatcher for EventEmitter {
    type Listener = Listener;

    fn listener_count(&self, key: &EventKey) -> usize {
        EventEmitter::listener_count(self, key)
    }

    fn event_names(&self) -> Vec<EventKey> {
        EventEmitter::event_names(self)
    }

    fn listeners_for(&self, key: &EventKey) -> Vec<Listener> {
        self.listeners(key)
    }
}

impl Dispatcher for EventTarget {
    type Listener = EventListener;

    fn listener_count(&self, key: &EventKey) -> usize {
        key.as_name()
            .map_or(0, |name| EventTarget::listener_count(self, name))
    }

    fn event_names(&self) -> Vec<EventKey> {
        EventTarget::event_names(self)
    }

    fn listeners_for(&self, key: &EventKey) -> Vec<EventListener> {
        key.as_name()
            .map(|name| self.event_listeners(name))
            .unwrap_or_default()
    }
}

impl Dispatcher for NodeEventTarget {
    type Listener = EventListener;

    fn listener_count(&self, key: &EventKey) -> usize {
        Dispatcher::listener_count(self.target(), key)
    }

    fn event_names(&self) -> Vec<EventKey> {
        Dispatcher::event_names(self.target())
    }

    fn listeners_for(&self, key: &EventKey) -> Vec<EventListener> {
        self.target().listeners_for(key)
    }
}

impl Dispatcher for AbortSignal {
    type Listener = EventListener;

    fn listener_count(&self, key: &EventKey) -> usize {
        Dispatcher::listener_count(self.target(), key)
    }

    fn event_names(&self) -> Vec<EventKey> {
        Dispatcher::event_names(self.target())
    }

    fn listeners_for(&self, key: &EventKey) -> Vec<EventListener> {
        self.target().listeners_for(key)
    }
}

impl ListenerLimit for EventEmitter {
    fn max_listeners(&self) -> MaxListeners {
        EventEmitter::max_listeners(self)
    }

    fn set_max_listeners(&self, max: MaxListeners) {
        EventEmitter::set_max_listeners(self, max);
    }
}

impl ListenerLimit for EventTarget {
    fn max_listeners(&self) -> MaxListeners {
        EventTarget::max_listeners(self)
    }

    fn set_max_listeners(&self, max: MaxListeners) {
        EventTarget::set_max_listeners(self, max);
    }
}

impl ListenerLimit for NodeEventTarget {
    fn max_listeners(&self) -> MaxListeners {
        self.target().max_listeners()
    }

    fn set_max_listeners(&self, max: MaxListeners) {
        self.target().set_max_listeners(max);
    }
}

impl ListenerLimit for AbortSignal {
    fn max_listeners(&self) -> MaxListeners {
        self.target().max_listeners()
    }

    fn set_max_listeners(&self, max: MaxListeners) {
        self.target().set_max_listeners(max);
    }
}

/// Number of listeners `dispatcher` holds for `key`.
pub fn listener_count<D>(dispatcher: &D, key: impl Into<EventKey>) -> usize
where
    D: Dispatcher + ?Sized,
{
    dispatcher.listener_count(&key.into())
}

/// Copies of the listeners `dispatcher` holds for `key`.
pub fn get_event_listeners<D>(dispatcher: &D, key: impl Into<EventKey>) -> Vec<D::Listener>
where
    D: Dispatcher + ?Sized,
{
    dispatcher.listeners_for(&key.into())
}

/// Current threshold of `dispatcher`.
pub fn get_max_listeners(dispatcher: &dyn ListenerLimit) -> MaxListeners {
    dispatcher.max_listeners()
}

/// Set the threshold of each of `targets` to `n`.
///
/// `0` means unbounded. With no targets the process-wide default changes,
/// affecting dispatchers constructed afterwards.
///
/// # Errors
///
/// Returns [`herald_core::EventsError::InvalidArgument`] for a negative `n`;
/// nothing is changed.
pub fn set_max_listeners(n: i64, targets: &[&dyn ListenerLimit]) -> EventsResult<()> {
    let max = MaxListeners::try_from(n)?;
    if targets.is_empty() {
        defaults::set_default_max_listeners(max);
        return Ok(());
    }
    for target in targets {
        target.set_max_listeners(max);
    }
    debug!(max_listeners = %max, targets = targets.len(), "Max listeners set");
    Ok(())
}
