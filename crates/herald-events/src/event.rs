//! Structured event record dispatched through an [`EventTarget`](crate::EventTarget).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Construction flags for an [`Event`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventInit {
    /// Whether the event bubbles. Recorded only; no propagation tree exists.
    pub bubbles: bool,
    /// Whether [`Event::prevent_default`] has any effect.
    pub cancelable: bool,
    /// Whether the event crosses shadow boundaries. Recorded only.
    pub composed: bool,
}

impl EventInit {
    /// All flags off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `bubbles`.
    #[must_use]
    pub fn bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    /// Set `cancelable`.
    #[must_use]
    pub fn cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    /// Set `composed`.
    #[must_use]
    pub fn composed(mut self, composed: bool) -> Self {
        self.composed = composed;
        self
    }
}

/// An event record.
///
/// Flags set by listeners persist on the record and are not reset when the
/// same record is dispatched again. Only the halt caused by
/// [`stop_immediate_propagation`](Self::stop_immediate_propagation) is
/// scoped to a single dispatch call.
pub struct Event {
    event_type: String,
    init: EventInit,
    detail: Option<Value>,
    time_stamp: DateTime<Utc>,
    default_prevented: AtomicBool,
    propagation_stopped: AtomicBool,
    immediate_propagation_stopped: AtomicBool,
    halted: AtomicBool,
    dispatching: AtomicBool,
}

impl Event {
    /// A plain event of `event_type`.
    pub fn new(event_type: impl Into<String>, init: EventInit) -> Self {
        Self::build(event_type.into(), init, None)
    }

    /// A custom event carrying `detail`, fixed at construction.
    pub fn custom(event_type: impl Into<String>, detail: Value) -> Self {
        Self::custom_with(event_type, detail, EventInit::default())
    }

    /// A custom event carrying `detail`, with explicit flags.
    pub fn custom_with(event_type: impl Into<String>, detail: Value, init: EventInit) -> Self {
        Self::build(event_type.into(), init, Some(detail))
    }

    fn build(event_type: String, init: EventInit, detail: Option<Value>) -> Self {
        Self {
            event_type,
            init,
            detail,
            time_stamp: Utc::now(),
            default_prevented: AtomicBool::new(false),
            propagation_stopped: AtomicBool::new(false),
            immediate_propagation_stopped: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            dispatching: AtomicBool::new(false),
        }
    }

    /// The event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Whether the event bubbles.
    #[must_use]
    pub fn bubbles(&self) -> bool {
        self.init.bubbles
    }

    /// Whether the default action can be prevented.
    #[must_use]
    pub fn cancelable(&self) -> bool {
        self.init.cancelable
    }

    /// Whether the event is composed.
    #[must_use]
    pub fn composed(&self) -> bool {
        self.init.composed
    }

    /// Custom-event payload, if this is a custom event.
    #[must_use]
    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }

    /// Whether this record was built as a custom event.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.detail.is_some()
    }

    /// Creation time.
    #[must_use]
    pub fn time_stamp(&self) -> DateTime<Utc> {
        self.time_stamp
    }

    /// Mark the default action as prevented. Ignored unless cancelable.
    pub fn prevent_default(&self) {
        if self.init.cancelable {
            self.default_prevented.store(true, Ordering::SeqCst);
        }
    }

    /// Whether [`prevent_default`](Self::prevent_default) took effect.
    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::SeqCst)
    }

    /// `false` once the default action was prevented.
    #[must_use]
    pub fn return_value(&self) -> bool {
        !self.default_prevented()
    }

    /// Record a propagation stop. Observational at a single target.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.store(true, Ordering::SeqCst);
    }

    /// Whether propagation was stopped.
    #[must_use]
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.load(Ordering::SeqCst)
    }

    /// Skip the remaining listeners of the current dispatch.
    pub fn stop_immediate_propagation(&self) {
        self.propagation_stopped.store(true, Ordering::SeqCst);
        self.immediate_propagation_stopped
            .store(true, Ordering::SeqCst);
        self.halted.store(true, Ordering::SeqCst);
    }

    /// Whether immediate propagation was ever stopped on this record.
    #[must_use]
    pub fn immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped.load(Ordering::SeqCst)
    }

    /// Whether a dispatch of this record is in progress.
    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.dispatching.load(Ordering::SeqCst)
    }

    /// Claim the record for a dispatch. `false` if one is already running.
    pub(crate) fn begin_dispatch(&self) -> bool {
        if self.dispatching.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.halted.store(false, Ordering::SeqCst);
        true
    }

    pub(crate) fn end_dispatch(&self) {
        self.dispatching.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type)
            .field("bubbles", &self.init.bubbles)
            .field("cancelable", &self.init.cancelable)
            .field("composed", &self.init.composed)
            .field("detail", &self.detail)
            .field("default_prevented", &self.default_prevented())
            .field("propagation_stopped", &self.propagation_stopped())
            .field(
                "immediate_propagation_stopped",
                &self.immediate_propagation_stopped(),
            )
            .finish_non_exhaustive()
    }
}
