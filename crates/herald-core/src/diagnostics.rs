//! Diagnostics collaborator for non-fatal warnings and fatal escalations.

use std::fmt;

use serde_json::Value;
use tracing::{error, warn};

use crate::types::EventKey;

/// Warning raised when one key holds more listeners than the threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxListenersWarning {
    /// Kind of dispatcher that raised the warning (`EventEmitter`, `EventTarget`).
    pub dispatcher: &'static str,
    /// The key whose list grew past the threshold.
    pub key: EventKey,
    /// Listener count after the registration that crossed the threshold.
    pub count: usize,
    /// The threshold in effect.
    pub max: usize,
}

impl fmt::Display for MaxListenersWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Possible {} memory leak detected. {} {} listeners added. MaxListeners is {}. \
             Use set_max_listeners() to increase limit",
            self.dispatcher, self.count, self.key, self.max
        )
    }
}

/// Receives max-listener warnings and fatal unhandled-error escalations.
///
/// Implementations must not call back into the dispatcher that reported.
pub trait Diagnostics: Send + Sync {
    /// A key exceeded its dispatcher's max-listener threshold.
    fn max_listeners_exceeded(&self, warning: &MaxListenersWarning);

    /// `error` was emitted with no real listener. The caller of `emit` also
    /// receives the error.
    fn unhandled_error(&self, key: &EventKey, payload: Option<&Value>);

    /// A pending listener computation failed and nothing captured it.
    fn unhandled_rejection(&self, key: &EventKey, error: &(dyn std::error::Error + Send + Sync));
}

/// Default diagnostics: reports through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn max_listeners_exceeded(&self, warning: &MaxListenersWarning) {
        warn!(
            dispatcher = warning.dispatcher,
            key = %warning.key,
            count = warning.count,
            max = warning.max,
            "MaxListenersExceededWarning: {warning}"
        );
    }

    fn unhandled_error(&self, key: &EventKey, payload: Option<&Value>) {
        error!(key = %key, payload = ?payload, "Unhandled error event");
    }

    fn unhandled_rejection(&self, key: &EventKey, error: &(dyn std::error::Error + Send + Sync)) {
        error!(key = %key, error = %error, "Unhandled rejection from listener");
    }
}
