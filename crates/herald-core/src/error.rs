//! Error types shared by every Herald dispatcher.

use serde_json::Value;
use thiserror::Error;

use crate::types::EventKey;

/// Error returned by a listener callback.
///
/// Any `std::error::Error` converts into it with `?`, as do `&str` and
/// `String` messages.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by dispatchers and the async bridges built on them.
#[derive(Debug, Error)]
pub enum EventsError {
    /// An argument was rejected at the call site. Dispatcher state is unchanged.
    #[error("invalid argument '{argument}': {message}")]
    InvalidArgument {
        /// Name of the rejected argument.
        argument: &'static str,
        /// Why it was rejected.
        message: String,
    },

    /// `error` was emitted without any real `error` listener.
    ///
    /// This is fatal: it is also reported to the host diagnostics collaborator.
    #[error("unhandled '{key}' event: {}", describe(.payload.as_ref()))]
    UnhandledError {
        /// The key that was emitted.
        key: EventKey,
        /// First argument of the emission, if any.
        payload: Option<Value>,
    },

    /// An `error` emission observed by a waiter registered on another key.
    #[error("error event emitted: {}", describe(.payload.as_ref()))]
    ErrorEvent {
        /// First argument of the `error` emission, if any.
        payload: Option<Value>,
    },

    /// The wait was cancelled through an abort signal.
    #[error("the operation was aborted")]
    Aborted {
        /// Abort reason carried by the signal.
        reason: Option<Value>,
    },

    /// Registration was attempted on a disposed dispatcher.
    #[error("dispatcher has been disposed")]
    Disposed,

    /// The operation is not valid in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A listener callback failed synchronously.
    #[error("listener for '{key}' failed: {source}")]
    Listener {
        /// The key being dispatched.
        key: EventKey,
        /// The listener's error.
        #[source]
        source: ListenerError,
    },

    /// A pending completion was dropped before it settled.
    #[error("pending completion was abandoned before it settled")]
    Abandoned,
}

impl EventsError {
    /// Build an [`EventsError::InvalidArgument`].
    pub fn invalid_argument(argument: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            message: message.into(),
        }
    }

    /// Whether this error is an abort.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

fn describe(payload: Option<&Value>) -> String {
    match payload {
        None => "no error payload".to_string(),
        Some(Value::String(message)) => message.clone(),
        Some(Value::Object(map)) => match map.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => Value::Object(map.clone()).to_string(),
        },
        Some(other) => other.to_string(),
    }
}

/// Result type for dispatcher operations.
pub type EventsResult<T> = Result<T, EventsError>;
