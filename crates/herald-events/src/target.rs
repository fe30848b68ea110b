//! Structured-event dispatcher.
//!
//! Listeners are keyed by event type. Identity is the triple
//! (type, listener, capture), so the same listener may be registered once
//! with `capture = false` and once with `capture = true`. Dispatch runs in
//! registration order over a snapshot; entries removed during a dispatch are
//! skipped if not yet reached.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use herald_core::{
    Diagnostics, EventKey, EventsError, EventsResult, MaxListeners, MaxListenersWarning,
    TracingDiagnostics,
};
use tracing::trace;

use crate::abort::{ABORT_EVENT, AbortSignal};
use crate::defaults;
use crate::event::Event;
use crate::listener::EventListener;
use crate::registry::{ListenerRegistry, Placement};

/// Options for [`EventTarget::add_event_listener`].
#[derive(Debug, Clone, Default)]
pub struct ListenerOptions {
    /// Capture flag. Part of the listener's identity.
    pub capture: bool,
    /// Remove the listener right before its first invocation.
    pub once: bool,
    /// Remove the listener when this signal aborts.
    pub signal: Option<AbortSignal>,
}

impl ListenerOptions {
    /// Default options: bubble phase, persistent, no signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capture flag.
    #[must_use]
    pub fn capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }

    /// Set the once flag.
    #[must_use]
    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Bind the registration to `signal`.
    #[must_use]
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

impl From<bool> for ListenerOptions {
    fn from(capture: bool) -> Self {
        Self::new().capture(capture)
    }
}

/// Observer that unregisters an entry when its signal aborts.
#[derive(Clone)]
struct AbortBinding {
    signal: AbortSignal,
    observer: EventListener,
}

#[derive(Clone)]
struct TargetEntry {
    listener: EventListener,
    capture: bool,
    once: bool,
    removed: Arc<AtomicBool>,
    abort: Option<AbortBinding>,
}

impl TargetEntry {
    /// Flag the entry as removed and drop its abort observer.
    fn retire(self) {
        self.removed.store(true, Ordering::SeqCst);
        if let Some(binding) = self.abort {
            binding
                .signal
                .target()
                .remove_event_listener(ABORT_EVENT, &binding.observer, false);
        }
    }
}

struct TargetState {
    registry: ListenerRegistry<TargetEntry>,
    max_listeners: MaxListeners,
}

struct TargetInner {
    state: Mutex<TargetState>,
    diagnostics: Arc<dyn Diagnostics>,
}

/// Single-target structured-event dispatcher.
///
/// Cloning yields another handle to the same target.
#[derive(Clone)]
pub struct EventTarget {
    inner: Arc<TargetInner>,
}

impl Default for EventTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("EventTarget")
            .field("event_types", &state.registry.key_count())
            .field("max_listeners", &state.max_listeners)
            .finish()
    }
}

/// Releases the record's dispatch claim even if a listener panics.
struct DispatchGuard<'a>(&'a Event);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.end_dispatch();
    }
}

impl EventTarget {
    /// Create a target configured from the process defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::with_diagnostics(Arc::new(TracingDiagnostics))
    }

    /// Create a target reporting to `diagnostics`.
    #[must_use]
    pub fn with_diagnostics(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            inner: Arc::new(TargetInner {
                state: Mutex::new(TargetState {
                    registry: ListenerRegistry::new(),
                    max_listeners: defaults::default_max_listeners(),
                }),
                diagnostics,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TargetState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn downgrade(&self) -> Weak<TargetInner> {
        Arc::downgrade(&self.inner)
    }

    /// Register `listener` for `event_type`.
    ///
    /// A no-op if the same (type, listener, capture) is already registered or
    /// if `options.signal` has already aborted.
    pub fn add_event_listener(
        &self,
        event_type: &str,
        listener: &EventListener,
        options: impl Into<ListenerOptions>,
    ) {
        let options = options.into();
        if options.signal.as_ref().is_some_and(AbortSignal::aborted) {
            trace!(event_type, "Signal already aborted, listener not added");
            return;
        }

        let key = EventKey::from(event_type);
        let removed = Arc::new(AtomicBool::new(false));
        let abort = options.signal.clone().map(|signal| {
            let weak = self.downgrade();
            let key = key.clone();
            let flag = Arc::clone(&removed);
            let observer = EventListener::new(move |_, _| {
                if let Some(inner) = weak.upgrade() {
                    EventTarget { inner }.remove_entry(&key, &flag);
                }
            });
            AbortBinding { signal, observer }
        });

        let warning = {
            let mut state = self.lock();
            let duplicate = state
                .registry
                .any(&key, |e| e.listener == *listener && e.capture == options.capture);
            if duplicate {
                return;
            }
            let count = state.registry.insert(
                &key,
                TargetEntry {
                    listener: listener.clone(),
                    capture: options.capture,
                    once: options.once,
                    removed: Arc::clone(&removed),
                    abort: abort.clone(),
                },
                Placement::Append,
            );
            let max = state.max_listeners;
            match max.limit() {
                Some(limit) if max.is_exceeded_by(count) && state.registry.mark_warned(&key) => {
                    Some(MaxListenersWarning {
                        dispatcher: "EventTarget",
                        key: key.clone(),
                        count,
                        max: limit,
                    })
                },
                _ => None,
            }
        };

        trace!(
            event_type,
            listener = %listener.id(),
            capture = options.capture,
            once = options.once,
            "Event listener added"
        );
        if let Some(warning) = warning {
            self.inner.diagnostics.max_listeners_exceeded(&warning);
        }

        if let Some(binding) = abort {
            binding.signal.target().add_event_listener(
                ABORT_EVENT,
                &binding.observer,
                ListenerOptions::new().once(true),
            );
            // The signal may have aborted between the check above and now.
            if binding.signal.aborted() {
                self.remove_entry(&key, &removed);
            }
        }
    }

    /// Remove the registration matching (type, listener, capture).
    ///
    /// Returns whether a registration was removed.
    pub fn remove_event_listener(
        &self,
        event_type: &str,
        listener: &EventListener,
        capture: bool,
    ) -> bool {
        let key = EventKey::from(event_type);
        let removed = self
            .lock()
            .registry
            .remove_first(&key, |e| e.listener == *listener && e.capture == capture);
        match removed {
            Some(entry) => {
                entry.retire();
                trace!(event_type, listener = %listener.id(), capture, "Event listener removed");
                true
            },
            None => false,
        }
    }

    fn remove_entry(&self, key: &EventKey, flag: &Arc<AtomicBool>) -> bool {
        let removed = self
            .lock()
            .registry
            .remove_first(key, |e| Arc::ptr_eq(&e.removed, flag));
        match removed {
            Some(entry) => {
                entry.retire();
                true
            },
            None => false,
        }
    }

    /// Remove every listener of `key`, or of every key when `None`.
    pub(crate) fn remove_all(&self, key: Option<&EventKey>) {
        let entries: Vec<TargetEntry> = {
            let mut state = self.lock();
            match key {
                Some(key) => state.registry.take(key),
                None => {
                    let keys = state.registry.keys();
                    keys.iter()
                        .flat_map(|k| state.registry.take(k))
                        .collect()
                },
            }
        };
        for entry in entries {
            entry.retire();
        }
    }

    /// Invoke the listeners registered for `event`'s type.
    ///
    /// Returns `false` if a listener prevented the default action.
    ///
    /// # Errors
    ///
    /// - [`EventsError::InvalidState`] if `event` is already being dispatched.
    /// - [`EventsError::Listener`] when a listener fails; later listeners do
    ///   not run.
    pub fn dispatch_event(&self, event: &Event) -> EventsResult<bool> {
        if !event.begin_dispatch() {
            return Err(EventsError::InvalidState(format!(
                "event '{}' is already being dispatched",
                event.event_type()
            )));
        }
        let _guard = DispatchGuard(event);

        let key = EventKey::from(event.event_type());
        let snapshot = self.lock().registry.snapshot(&key);
        trace!(event_type = event.event_type(), listeners = snapshot.len(), "Dispatching event");

        for entry in snapshot {
            if entry.removed.load(Ordering::SeqCst) {
                continue;
            }
            if entry.once {
                self.remove_entry(&key, &entry.removed);
            }
            entry
                .listener
                .call(self, event)
                .map_err(|source| EventsError::Listener {
                    key: key.clone(),
                    source,
                })?;
            if event.is_halted() {
                break;
            }
        }

        Ok(!event.default_prevented())
    }

    /// Number of registrations for `event_type`, counting both capture
    /// values.
    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.lock().registry.count(&EventKey::from(event_type))
    }

    /// Types with at least one listener, in first-registration order.
    #[must_use]
    pub fn event_names(&self) -> Vec<EventKey> {
        self.lock().registry.keys()
    }

    /// Copies of the listeners registered for `event_type`.
    #[must_use]
    pub fn event_listeners(&self, event_type: &str) -> Vec<EventListener> {
        self.lock()
            .registry
            .snapshot(&EventKey::from(event_type))
            .into_iter()
            .map(|e| e.listener)
            .collect()
    }

    /// Current per-type listener threshold.
    #[must_use]
    pub fn max_listeners(&self) -> MaxListeners {
        self.lock().max_listeners
    }

    /// Change the per-type listener threshold for this target.
    pub fn set_max_listeners(&self, max: MaxListeners) {
        self.lock().max_listeners = max;
    }
}
