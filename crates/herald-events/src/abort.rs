//! Cooperative cancellation: abort controllers, signals and abort-linked
//! subscriptions.
//!
//! An [`AbortSignal`] aborts at most once. Its notification is an `abort`
//! event dispatched on the signal's own [`EventTarget`], so anything that can
//! listen to a target can observe cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use herald_core::{EventsError, EventsResult};
use serde_json::{Value, json};
use tracing::debug;

use crate::event::{Event, EventInit};
use crate::listener::EventListener;
use crate::target::{EventTarget, ListenerOptions};

/// Event type dispatched on a signal's target when it aborts.
pub const ABORT_EVENT: &str = "abort";

/// Reason recorded when `abort` is called without one.
#[must_use]
pub fn default_abort_reason() -> Value {
    json!({
        "name": "AbortError",
        "message": "This operation was aborted",
    })
}

#[derive(Default)]
struct SignalState {
    aborted: bool,
    reason: Option<Value>,
}

struct SignalInner {
    state: Mutex<SignalState>,
    target: EventTarget,
}

/// One-shot cancellation flag with an `abort` notification.
///
/// Cloning yields another handle to the same signal.
#[derive(Clone)]
pub struct AbortSignal {
    inner: Arc<SignalInner>,
}

impl AbortSignal {
    fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                state: Mutex::new(SignalState::default()),
                target: EventTarget::new(),
            }),
        }
    }

    /// A signal that is already aborted with `reason` (or the default reason).
    #[must_use]
    pub fn already_aborted(reason: Option<Value>) -> Self {
        let signal = Self::new();
        signal.mark_aborted(reason);
        signal
    }

    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn downgrade(&self) -> Weak<SignalInner> {
        Arc::downgrade(&self.inner)
    }

    /// Record the abort. `false` if the signal had already aborted.
    fn mark_aborted(&self, reason: Option<Value>) -> bool {
        let mut state = self.lock();
        if state.aborted {
            return false;
        }
        state.aborted = true;
        state.reason = Some(reason.unwrap_or_else(default_abort_reason));
        true
    }

    /// Whether the signal has aborted.
    #[must_use]
    pub fn aborted(&self) -> bool {
        self.lock().aborted
    }

    /// The abort reason, once aborted.
    #[must_use]
    pub fn reason(&self) -> Option<Value> {
        self.lock().reason.clone()
    }

    /// Fail with [`EventsError::Aborted`] if the signal has aborted.
    ///
    /// # Errors
    ///
    /// Returns [`EventsError::Aborted`] carrying the abort reason.
    pub fn throw_if_aborted(&self) -> EventsResult<()> {
        let state = self.lock();
        if state.aborted {
            return Err(EventsError::Aborted {
                reason: state.reason.clone(),
            });
        }
        Ok(())
    }

    /// Target on which the `abort` event is dispatched.
    #[must_use]
    pub fn target(&self) -> &EventTarget {
        &self.inner.target
    }

    /// Whether both handles refer to the same signal.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("AbortSignal")
            .field("aborted", &state.aborted)
            .field("reason", &state.reason)
            .finish()
    }
}

/// Owner of an [`AbortSignal`]; the only way to abort it.
#[derive(Debug, Clone)]
pub struct AbortController {
    signal: AbortSignal,
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortController {
    /// Create a controller with a fresh, unaborted signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signal: AbortSignal::new(),
        }
    }

    /// Handle to the controlled signal.
    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Abort the signal and notify its `abort` listeners.
    ///
    /// Aborting twice is a no-op; the first reason sticks.
    ///
    /// # Errors
    ///
    /// Returns [`EventsError::Listener`] if an `abort` listener fails.
    pub fn abort(&self, reason: Option<Value>) -> EventsResult<()> {
        if !self.signal.mark_aborted(reason) {
            return Ok(());
        }
        debug!(reason = ?self.signal.reason(), "Signal aborted");
        self.signal
            .target()
            .dispatch_event(&Event::new(ABORT_EVENT, EventInit::default()))
            .map(|_| ())
    }
}

type AbortCallback = Box<dyn FnOnce(&AbortSignal) + Send>;

/// Revocable token for a callback bound to a signal's abort.
///
/// Dropping the handle does not release the subscription; call
/// [`release`](Self::release).
#[derive(Debug)]
pub struct SubscriptionHandle {
    signal: AbortSignal,
    listener: Option<EventListener>,
    released: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    /// Stop the callback from ever firing. Idempotent; a no-op once fired.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(listener) = &self.listener {
            self.signal
                .target()
                .remove_event_listener(ABORT_EVENT, listener, false);
        }
    }

    /// Whether the handle is spent, by release or by firing.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Run `callback` once when `signal` aborts.
///
/// If the signal has already aborted the callback runs before this returns
/// and the handle is already spent.
pub fn add_abort_listener<F>(signal: &AbortSignal, callback: F) -> SubscriptionHandle
where
    F: FnOnce(&AbortSignal) + Send + 'static,
{
    if signal.aborted() {
        callback(signal);
        return SubscriptionHandle {
            signal: signal.clone(),
            listener: None,
            released: Arc::new(AtomicBool::new(true)),
        };
    }

    let released = Arc::new(AtomicBool::new(false));
    let pending: Mutex<Option<AbortCallback>> = Mutex::new(Some(Box::new(callback)));
    let weak = signal.downgrade();
    let flag = Arc::clone(&released);
    let listener = EventListener::new(move |_, _| {
        if flag.swap(true, Ordering::SeqCst) {
            return;
        }
        let callback = pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let (Some(callback), Some(inner)) = (callback, weak.upgrade()) {
            callback(&AbortSignal { inner });
        }
    });

    signal
        .target()
        .add_event_listener(ABORT_EVENT, &listener, ListenerOptions::new().once(true));

    let handle = SubscriptionHandle {
        signal: signal.clone(),
        listener: Some(listener.clone()),
        released,
    };

    // Aborted between the check and the registration: the event is gone.
    if signal.aborted() && !handle.is_released() {
        signal
            .target()
            .remove_event_listener(ABORT_EVENT, &listener, false);
        // Infallible by construction.
        let _ = listener.call(
            signal.target(),
            &Event::new(ABORT_EVENT, EventInit::default()),
        );
    }
    handle
}
