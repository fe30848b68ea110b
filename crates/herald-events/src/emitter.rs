//! Named-event emitter.
//!
//! [`EventEmitter`] dispatches synchronously over a snapshot of the key's
//! listener list taken when `emit` is entered. Listeners may add or remove
//! listeners (including themselves) and may emit reentrantly; the internal
//! lock is never held while a callback runs.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use herald_core::{
    Diagnostics, EventKey, EventsError, EventsResult, ListenerError, MaxListeners,
    MaxListenersWarning, Scheduler, TokioScheduler, TracingDiagnostics,
};
use serde_json::{Value, json};
use tracing::{debug, trace, warn};

use crate::defaults;
use crate::listener::{Listener, PendingListener};
use crate::registry::{ListenerRegistry, Placement};

/// Handler for captured failures of pending listener computations.
///
/// Receives the emitter, the failure, the key and the emission arguments.
pub type RejectionHandler =
    Arc<dyn Fn(&EventEmitter, &ListenerError, &EventKey, &[Value]) + Send + Sync>;

/// How a registration behaves when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerMode {
    /// Stays registered until removed.
    Persistent,
    /// Removed right before its first invocation.
    Once,
}

/// A registered listener as reported by [`EventEmitter::raw_listeners`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListener {
    /// The listener as it was passed to the registering call.
    pub listener: Listener,
    /// Its registration mode.
    pub mode: ListenerMode,
}

#[derive(Clone)]
struct Registration {
    listener: Listener,
    mode: ListenerMode,
    fired: Arc<AtomicBool>,
}

impl Registration {
    fn new(listener: Listener, mode: ListenerMode) -> Self {
        Self {
            listener,
            mode,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    fn is(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.fired, &other.fired)
    }
}

struct EmitterState {
    registry: ListenerRegistry<Registration>,
    max_listeners: MaxListeners,
    disposed: bool,
}

struct EmitterInner {
    state: Mutex<EmitterState>,
    capture_rejections: bool,
    diagnostics: Arc<dyn Diagnostics>,
    scheduler: Arc<dyn Scheduler>,
    rejection_handler: Option<RejectionHandler>,
}

/// Construction options for [`EventEmitter`].
///
/// Unset values come from [`defaults::current`] at construction time.
#[derive(Clone, Default)]
pub struct EmitterOptions {
    capture_rejections: Option<bool>,
    max_listeners: Option<MaxListeners>,
    diagnostics: Option<Arc<dyn Diagnostics>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    rejection_handler: Option<RejectionHandler>,
}

impl EmitterOptions {
    /// Options that take every value from the process defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture failures of pending listener computations.
    #[must_use]
    pub fn with_capture_rejections(mut self, enabled: bool) -> Self {
        self.capture_rejections = Some(enabled);
        self
    }

    /// Initial per-key listener threshold.
    #[must_use]
    pub fn with_max_listeners(mut self, max: MaxListeners) -> Self {
        self.max_listeners = Some(max);
        self
    }

    /// Diagnostics collaborator. Defaults to [`TracingDiagnostics`].
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Scheduler for pending listener computations. Defaults to
    /// [`TokioScheduler`].
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Handler for captured rejections. Without one, a captured rejection is
    /// re-emitted as `error` with `{"message": ...}`.
    #[must_use]
    pub fn with_rejection_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&EventEmitter, &ListenerError, &EventKey, &[Value]) + Send + Sync + 'static,
    {
        self.rejection_handler = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for EmitterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitterOptions")
            .field("capture_rejections", &self.capture_rejections)
            .field("max_listeners", &self.max_listeners)
            .field("has_diagnostics", &self.diagnostics.is_some())
            .field("has_scheduler", &self.scheduler.is_some())
            .field("has_rejection_handler", &self.rejection_handler.is_some())
            .finish()
    }
}

/// Synchronous named-event dispatcher.
///
/// Cloning yields another handle to the same emitter.
#[derive(Clone)]
pub struct EventEmitter {
    inner: Arc<EmitterInner>,
}

/// Non-owning handle to an [`EventEmitter`].
#[derive(Clone)]
pub struct WeakEmitter {
    inner: Weak<EmitterInner>,
}

impl WeakEmitter {
    /// The emitter, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<EventEmitter> {
        self.inner.upgrade().map(|inner| EventEmitter { inner })
    }
}

impl fmt::Debug for WeakEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEmitter")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("EventEmitter")
            .field("event_count", &state.registry.key_count())
            .field("max_listeners", &state.max_listeners)
            .field("capture_rejections", &self.inner.capture_rejections)
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl EventEmitter {
    /// Create an emitter configured from the process defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(EmitterOptions::default())
    }

    /// Create an emitter with explicit options.
    #[must_use]
    pub fn with_options(options: EmitterOptions) -> Self {
        let process = defaults::current();
        Self {
            inner: Arc::new(EmitterInner {
                state: Mutex::new(EmitterState {
                    registry: ListenerRegistry::new(),
                    max_listeners: options.max_listeners.unwrap_or(process.max_listeners),
                    disposed: false,
                }),
                capture_rejections: options
                    .capture_rejections
                    .unwrap_or(process.capture_rejections),
                diagnostics: options
                    .diagnostics
                    .unwrap_or_else(|| Arc::new(TracingDiagnostics)),
                scheduler: options
                    .scheduler
                    .unwrap_or_else(|| Arc::new(TokioScheduler)),
                rejection_handler: options.rejection_handler,
            }),
        }
    }

    /// A non-owning handle to this emitter.
    #[must_use]
    pub fn downgrade(&self) -> WeakEmitter {
        WeakEmitter {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same emitter.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, EmitterState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ----- registration -----

    /// Append `listener` to `key`'s list.
    ///
    /// `newListener` observers are notified before the insertion.
    ///
    /// # Errors
    ///
    /// [`EventsError::Disposed`] after [`dispose`](Self::dispose), or the
    /// failure of a `newListener` observer.
    pub fn on(&self, key: impl Into<EventKey>, listener: &Listener) -> EventsResult<()> {
        self.register(key.into(), listener, Placement::Append, ListenerMode::Persistent)
    }

    /// Alias of [`on`](Self::on).
    ///
    /// # Errors
    ///
    /// See [`on`](Self::on).
    pub fn add_listener(&self, key: impl Into<EventKey>, listener: &Listener) -> EventsResult<()> {
        self.on(key, listener)
    }

    /// Insert `listener` at the head of `key`'s list.
    ///
    /// # Errors
    ///
    /// See [`on`](Self::on).
    pub fn prepend_listener(
        &self,
        key: impl Into<EventKey>,
        listener: &Listener,
    ) -> EventsResult<()> {
        self.register(key.into(), listener, Placement::Prepend, ListenerMode::Persistent)
    }

    /// Append a listener that is removed right before its first invocation.
    ///
    /// # Errors
    ///
    /// See [`on`](Self::on).
    pub fn once(&self, key: impl Into<EventKey>, listener: &Listener) -> EventsResult<()> {
        self.register(key.into(), listener, Placement::Append, ListenerMode::Once)
    }

    /// Prepend a listener that is removed right before its first invocation.
    ///
    /// # Errors
    ///
    /// See [`on`](Self::on).
    pub fn prepend_once_listener(
        &self,
        key: impl Into<EventKey>,
        listener: &Listener,
    ) -> EventsResult<()> {
        self.register(key.into(), listener, Placement::Prepend, ListenerMode::Once)
    }

    fn register(
        &self,
        key: EventKey,
        listener: &Listener,
        placement: Placement,
        mode: ListenerMode,
    ) -> EventsResult<()> {
        if self.is_disposed() {
            return Err(EventsError::Disposed);
        }

        self.dispatch(
            &EventKey::new_listener(),
            &[key.to_value(), listener.id().to_value()],
        )?;

        let warning = {
            let mut state = self.lock();
            if state.disposed {
                return Err(EventsError::Disposed);
            }
            let count = state.registry.insert(
                &key,
                Registration::new(listener.clone(), mode),
                placement,
            );
            let max = state.max_listeners;
            match max.limit() {
                Some(limit) if max.is_exceeded_by(count) && state.registry.mark_warned(&key) => {
                    Some(MaxListenersWarning {
                        dispatcher: "EventEmitter",
                        key: key.clone(),
                        count,
                        max: limit,
                    })
                },
                _ => None,
            }
        };

        trace!(key = %key, listener = %listener.id(), ?mode, ?placement, "Listener added");
        if let Some(warning) = warning {
            self.inner.diagnostics.max_listeners_exceeded(&warning);
        }
        Ok(())
    }

    // ----- removal -----

    /// Remove the first registration of `listener` under `key`.
    ///
    /// Returns whether a registration was removed. `removeListener`
    /// observers are notified after the removal.
    ///
    /// # Errors
    ///
    /// The failure of a `removeListener` observer.
    pub fn off(&self, key: impl Into<EventKey>, listener: &Listener) -> EventsResult<bool> {
        let key = key.into();
        let removed = self
            .lock()
            .registry
            .remove_first(&key, |r| r.listener == *listener);
        match removed {
            Some(registration) => {
                self.notify_removed(&key, &registration)?;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// Alias of [`off`](Self::off).
    ///
    /// # Errors
    ///
    /// See [`off`](Self::off).
    pub fn remove_listener(
        &self,
        key: impl Into<EventKey>,
        listener: &Listener,
    ) -> EventsResult<bool> {
        self.off(key, listener)
    }

    /// Remove every listener of `key`, in registration order, notifying
    /// `removeListener` once per entry.
    ///
    /// # Errors
    ///
    /// The failure of a `removeListener` observer. Entries not yet removed
    /// stay registered.
    pub fn remove_all_listeners_for(&self, key: impl Into<EventKey>) -> EventsResult<()> {
        let key = key.into();
        let entries = self.lock().registry.snapshot(&key);
        for entry in &entries {
            let removed = self
                .lock()
                .registry
                .remove_first(&key, |r| r.is(entry));
            if let Some(registration) = removed {
                self.notify_removed(&key, &registration)?;
            }
        }
        Ok(())
    }

    /// Remove every listener of every key.
    ///
    /// Keys are taken from a snapshot before any removal, and the
    /// `removeListener` key is processed last so its observers see every
    /// other removal.
    ///
    /// # Errors
    ///
    /// The failure of a `removeListener` observer.
    pub fn remove_all_listeners(&self) -> EventsResult<()> {
        let keys = self.lock().registry.keys();
        for key in keys.iter().filter(|k| !k.is_remove_listener()) {
            self.remove_all_listeners_for(key)?;
        }
        self.remove_all_listeners_for(EventKey::remove_listener())?;

        // Registrations made by observers during the sweep are dropped silently.
        let mut state = self.lock();
        if state.registry.key_count() > 0 {
            debug!(
                remaining = state.registry.key_count(),
                "Clearing listeners added during removal sweep"
            );
            state.registry.clear();
        }
        Ok(())
    }

    fn notify_removed(&self, key: &EventKey, registration: &Registration) -> EventsResult<()> {
        trace!(key = %key, listener = %registration.listener.id(), "Listener removed");
        self.dispatch(
            &EventKey::remove_listener(),
            &[key.to_value(), registration.listener.id().to_value()],
        )
        .map(|_| ())
    }

    // ----- dispatch -----

    /// Invoke every listener registered for `key` with `args`.
    ///
    /// Returns whether any listener existed. On a disposed emitter this is a
    /// no-op returning `false`.
    ///
    /// # Errors
    ///
    /// - [`EventsError::UnhandledError`] when `key` is `error` and no `error`
    ///   listener exists, even if error monitors ran.
    /// - [`EventsError::Listener`] when a listener fails; later listeners do
    ///   not run.
    pub fn emit(&self, key: impl Into<EventKey>, args: &[Value]) -> EventsResult<bool> {
        if self.is_disposed() {
            return Ok(false);
        }
        self.dispatch(&key.into(), args)
    }

    fn dispatch(&self, key: &EventKey, args: &[Value]) -> EventsResult<bool> {
        if key.is_error() {
            let monitors = self.lock().registry.snapshot(&EventKey::ErrorMonitor);
            if !monitors.is_empty() {
                self.invoke(&EventKey::ErrorMonitor, &monitors, args)?;
            }

            let handlers = self.lock().registry.snapshot(key);
            if handlers.is_empty() {
                let payload = args.first().cloned();
                self.inner.diagnostics.unhandled_error(key, payload.as_ref());
                return Err(EventsError::UnhandledError {
                    key: key.clone(),
                    payload,
                });
            }
            self.invoke(key, &handlers, args)?;
            return Ok(true);
        }

        let snapshot = self.lock().registry.snapshot(key);
        if snapshot.is_empty() {
            return Ok(false);
        }
        self.invoke(key, &snapshot, args)?;
        Ok(true)
    }

    fn invoke(&self, key: &EventKey, snapshot: &[Registration], args: &[Value]) -> EventsResult<()> {
        trace!(key = %key, listeners = snapshot.len(), "Emitting");
        for registration in snapshot {
            if registration.mode == ListenerMode::Once {
                if registration.fired.swap(true, Ordering::SeqCst) {
                    continue;
                }
                let removed = self
                    .lock()
                    .registry
                    .remove_first(key, |r| r.is(registration));
                if let Some(removed) = removed {
                    self.notify_removed(key, &removed)?;
                }
            }

            match registration.listener.call(self, args) {
                Ok(None) => {},
                Ok(Some(pending)) => self.schedule(key, args, pending),
                Err(source) => {
                    return Err(EventsError::Listener {
                        key: key.clone(),
                        source,
                    });
                },
            }
        }
        Ok(())
    }

    fn schedule(&self, key: &EventKey, args: &[Value], pending: PendingListener) {
        let emitter = self.downgrade();
        let diagnostics = Arc::clone(&self.inner.diagnostics);
        let capture = self.inner.capture_rejections;
        let key = key.clone();
        let args = args.to_vec();

        self.inner.scheduler.spawn(Box::pin(async move {
            let Err(error) = pending.await else {
                return;
            };
            match emitter.upgrade() {
                Some(emitter) if capture => emitter.handle_rejection(&error, &key, &args),
                _ => diagnostics.unhandled_rejection(&key, error.as_ref()),
            }
        }));
    }

    fn handle_rejection(&self, error: &ListenerError, key: &EventKey, args: &[Value]) {
        debug!(key = %key, error = %error, "Captured listener rejection");
        if let Some(handler) = &self.inner.rejection_handler {
            handler(self, error, key, args);
            return;
        }
        let payload = json!({ "message": error.to_string() });
        if let Err(e) = self.emit(EventKey::error(), &[payload]) {
            warn!(key = %key, error = %e, "Captured rejection could not be delivered");
        }
    }

    // ----- inspection -----

    /// Number of listeners registered for `key`.
    #[must_use]
    pub fn listener_count(&self, key: impl Into<EventKey>) -> usize {
        self.lock().registry.count(&key.into())
    }

    /// Keys with at least one listener, in first-registration order.
    #[must_use]
    pub fn event_names(&self) -> Vec<EventKey> {
        self.lock().registry.keys()
    }

    /// Copies of the listeners registered for `key`, as originally passed.
    #[must_use]
    pub fn listeners(&self, key: impl Into<EventKey>) -> Vec<Listener> {
        self.lock()
            .registry
            .snapshot(&key.into())
            .into_iter()
            .map(|r| r.listener)
            .collect()
    }

    /// Copies of the registrations for `key`, with their modes.
    #[must_use]
    pub fn raw_listeners(&self, key: impl Into<EventKey>) -> Vec<RawListener> {
        self.lock()
            .registry
            .snapshot(&key.into())
            .into_iter()
            .map(|r| RawListener {
                listener: r.listener,
                mode: r.mode,
            })
            .collect()
    }

    /// Current per-key listener threshold.
    #[must_use]
    pub fn max_listeners(&self) -> MaxListeners {
        self.lock().max_listeners
    }

    /// Change the per-key listener threshold for this emitter.
    pub fn set_max_listeners(&self, max: MaxListeners) {
        self.lock().max_listeners = max;
    }

    /// Whether this emitter captures failures of pending listener
    /// computations. Fixed at construction.
    #[must_use]
    pub fn capture_rejections(&self) -> bool {
        self.inner.capture_rejections
    }

    // ----- disposal -----

    /// Release every listener and reject further registration.
    ///
    /// Equivalent to [`remove_all_listeners`](Self::remove_all_listeners)
    /// followed by a permanent registration ban. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// The failure of a `removeListener` observer. The emitter is disposed
    /// regardless and every listener is released.
    pub fn dispose(&self) -> EventsResult<()> {
        {
            let mut state = self.lock();
            if state.disposed {
                return Ok(());
            }
            state.disposed = true;
        }
        debug!("Disposing emitter");
        let result = self.remove_all_listeners();
        self.lock().registry.clear();
        result
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Listener) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let calls = Arc::clone(&calls);
            move |name: &str| {
                let calls = Arc::clone(&calls);
                let name = name.to_owned();
                Listener::new(move |_, args| {
                    let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
                    calls
                        .lock()
                        .unwrap()
                        .push(format!("{name}({})", rendered.join(",")));
                })
            }
        };
        (calls, make)
    }

    #[test]
    fn test_prepend_runs_first() {
        let emitter = EventEmitter::new();
        let (calls, make) = recorder();
        emitter.on("x", &make("L1")).unwrap();
        emitter.prepend_listener("x", &make("L2")).unwrap();

        assert!(emitter.emit("x", &[json!(7)]).unwrap());
        assert_eq!(*calls.lock().unwrap(), vec!["L2(7)", "L1(7)"]);
    }

    #[test]
    fn test_emit_without_listeners_returns_false() {
        let emitter = EventEmitter::new();
        assert!(!emitter.emit("nothing", &[]).unwrap());
    }

    #[test]
    fn test_once_fires_once_under_reentrancy() {
        let emitter = EventEmitter::new();
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let once = Listener::new(move |emitter, _| {
            *counter.lock().unwrap() += 1;
            emitter.emit("tick", &[]).unwrap();
        });
        emitter.once("tick", &once).unwrap();

        emitter.emit("tick", &[]).unwrap();
        emitter.emit("tick", &[]).unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(emitter.listener_count("tick"), 0);
    }

    #[test]
    fn test_off_matches_original_of_once() {
        let emitter = EventEmitter::new();
        let (calls, make) = recorder();
        let listener = make("L");
        emitter.once("x", &listener).unwrap();

        assert_eq!(emitter.raw_listeners("x")[0].mode, ListenerMode::Once);
        assert_eq!(emitter.raw_listeners("x")[0].listener, listener);
        assert!(emitter.off("x", &listener).unwrap());
        emitter.emit("x", &[]).unwrap();
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_removal_during_emit_keeps_snapshot() {
        let emitter = EventEmitter::new();
        let (calls, make) = recorder();
        let second = make("second");
        let second_copy = second.clone();
        let first = Listener::new(move |emitter, _| {
            emitter.off("x", &second_copy).unwrap();
        });
        emitter.on("x", &first).unwrap();
        emitter.on("x", &second).unwrap();

        emitter.emit("x", &[json!(1)]).unwrap();
        emitter.emit("x", &[json!(2)]).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["second(1)"]);
    }

    #[test]
    fn test_added_during_emit_waits_for_next_emit() {
        let emitter = EventEmitter::new();
        let (calls, make) = recorder();
        let late = make("late");
        let adder = Listener::new(move |emitter, _| {
            emitter.on("x", &late).unwrap();
        });
        emitter.once("x", &adder).unwrap();

        emitter.emit("x", &[json!(1)]).unwrap();
        assert!(calls.lock().unwrap().is_empty());
        emitter.emit("x", &[json!(2)]).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["late(2)"]);
    }

    #[test]
    fn test_new_and_remove_listener_counts() {
        let emitter = EventEmitter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let added = Arc::clone(&seen);
        emitter
            .on(
                EventKey::NEW_LISTENER,
                &Listener::new(move |emitter, args| {
                    if args[0] == json!("data") {
                        added
                            .lock()
                            .unwrap()
                            .push(("new", emitter.listener_count("data")));
                    }
                }),
            )
            .unwrap();
        let removed = Arc::clone(&seen);
        emitter
            .on(
                EventKey::REMOVE_LISTENER,
                &Listener::new(move |emitter, args| {
                    removed
                        .lock()
                        .unwrap()
                        .push(("remove", emitter.listener_count(args[0].as_str().unwrap())));
                }),
            )
            .unwrap();

        let listener = Listener::new(|_, _| {});
        emitter.on("data", &listener).unwrap();
        emitter.off("data", &listener).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![("new", 0), ("remove", 0)]);
    }

    #[test]
    fn test_remove_all_for_key_notifies_in_order() {
        let emitter = EventEmitter::new();
        let a = Listener::new(|_, _| {});
        let b = Listener::new(|_, _| {});
        emitter.on("x", &a).unwrap();
        emitter.on("x", &b).unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&order);
        emitter
            .on(
                EventKey::REMOVE_LISTENER,
                &Listener::new(move |_, args| {
                    sink.lock().unwrap().push(args[1].as_str().unwrap().to_owned());
                }),
            )
            .unwrap();

        emitter.remove_all_listeners_for("x").unwrap();
        assert_eq!(
            *order.lock().unwrap(),
            vec![a.id().to_string(), b.id().to_string()]
        );
        assert_eq!(emitter.event_names(), vec![EventKey::remove_listener()]);
    }

    #[test]
    fn test_remove_all_processes_remove_listener_last() {
        let emitter = EventEmitter::new();
        let keys = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&keys);
        emitter
            .on(
                EventKey::REMOVE_LISTENER,
                &Listener::new(move |_, args| {
                    sink.lock().unwrap().push(args[0].as_str().unwrap().to_owned());
                }),
            )
            .unwrap();
        emitter.on("a", &Listener::new(|_, _| {})).unwrap();
        emitter.on("b", &Listener::new(|_, _| {})).unwrap();

        emitter.remove_all_listeners().unwrap();
        assert_eq!(*keys.lock().unwrap(), vec!["a", "b"]);
        assert!(emitter.event_names().is_empty());
    }

    #[test]
    fn test_error_without_listener_is_fatal_even_with_monitor() {
        let emitter = EventEmitter::new();
        let monitored = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&monitored);
        emitter
            .on(
                EventKey::ErrorMonitor,
                &Listener::new(move |_, _| *counter.lock().unwrap() += 1),
            )
            .unwrap();

        let err = emitter.emit("error", &[json!("boom")]).unwrap_err();
        assert!(matches!(err, EventsError::UnhandledError { .. }));
        assert_eq!(*monitored.lock().unwrap(), 1);
    }

    #[test]
    fn test_error_with_listener_is_handled() {
        let emitter = EventEmitter::new();
        let (calls, make) = recorder();
        emitter.on(EventKey::ErrorMonitor, &make("monitor")).unwrap();
        emitter.on("error", &make("handler")).unwrap();

        assert!(emitter.emit("error", &[json!("boom")]).unwrap());
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["monitor(\"boom\")", "handler(\"boom\")"]
        );
    }

    #[test]
    fn test_listener_error_propagates() {
        let emitter = EventEmitter::new();
        let (calls, make) = recorder();
        emitter
            .on("x", &Listener::fallible(|_, _| Err("listener failed".into())))
            .unwrap();
        emitter.on("x", &make("after")).unwrap();

        let err = emitter.emit("x", &[]).unwrap_err();
        assert_eq!(err.to_string(), "listener for 'x' failed: listener failed");
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_listener_count_tracks_mutations() {
        let emitter = EventEmitter::new();
        let a = Listener::new(|_, _| {});
        let b = Listener::new(|_, _| {});
        emitter.on("x", &a).unwrap();
        emitter.once("x", &b).unwrap();
        emitter.prepend_listener("x", &a).unwrap();
        assert_eq!(emitter.listener_count("x"), 3);

        emitter.off("x", &a).unwrap();
        assert_eq!(emitter.listener_count("x"), 2);
        emitter.emit("x", &[]).unwrap();
        assert_eq!(emitter.listener_count("x"), 1);
        assert_eq!(emitter.listeners("x"), vec![a]);
    }

    #[test]
    fn test_dispose_releases_and_rejects() {
        let emitter = EventEmitter::new();
        emitter.on("x", &Listener::new(|_, _| {})).unwrap();
        emitter.dispose().unwrap();

        assert!(emitter.is_disposed());
        assert!(emitter.event_names().is_empty());
        assert!(!emitter.emit("x", &[]).unwrap());
        assert!(!emitter.emit("error", &[]).unwrap());
        assert!(matches!(
            emitter.on("x", &Listener::new(|_, _| {})),
            Err(EventsError::Disposed)
        ));
        assert!(!emitter.off("x", &Listener::new(|_, _| {})).unwrap());
        emitter.dispose().unwrap();
    }

    #[test]
    fn test_capture_rejections_is_fixed_at_construction() {
        let emitter = EventEmitter::with_options(EmitterOptions::new().with_capture_rejections(true));
        assert!(emitter.capture_rejections());
        assert!(!EventEmitter::new().capture_rejections());
    }

    #[tokio::test]
    async fn test_captured_rejection_reaches_handler() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let emitter = EventEmitter::with_options(
            EmitterOptions::new()
                .with_capture_rejections(true)
                .with_rejection_handler(move |_, error, key, args| {
                    if let Some(tx) = tx.lock().unwrap().take() {
                        let _ = tx.send((error.to_string(), key.clone(), args.to_vec()));
                    }
                }),
        );
        emitter
            .on("job", &Listener::future(|_, _| async {
                    Err::<(), ListenerError>("async failure".into())
                }))
            .unwrap();

        emitter.emit("job", &[json!(1)]).unwrap();
        let (message, key, args) = rx.await.unwrap();
        assert_eq!(message, "async failure");
        assert_eq!(key, "job");
        assert_eq!(args, vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_captured_rejection_defaults_to_error_event() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let emitter = EventEmitter::with_options(EmitterOptions::new().with_capture_rejections(true));
        emitter
            .on(
                "error",
                &Listener::new(move |_, args| {
                    if let Some(tx) = tx.lock().unwrap().take() {
                        let _ = tx.send(args.to_vec());
                    }
                }),
            )
            .unwrap();
        emitter
            .on("job", &Listener::future(|_, _| async { Err::<(), ListenerError>("late".into()) }))
            .unwrap();

        emitter.emit("job", &[]).unwrap();
        assert_eq!(rx.await.unwrap(), vec![json!({ "message": "late" })]);
    }

    #[test]
    fn test_weak_emitter() {
        let emitter = EventEmitter::new();
        let weak = emitter.downgrade();
        assert!(weak.upgrade().unwrap().ptr_eq(&emitter));
        drop(emitter);
        assert!(weak.upgrade().is_none());
    }
}
