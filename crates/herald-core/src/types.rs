//! Keys, identities and thresholds shared by every dispatcher.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EventsError;

/// Arguments of a single emission.
pub type EventArgs = Vec<Value>;

/// Default per-instance listener threshold before a leak warning.
pub const DEFAULT_MAX_LISTENERS: usize = 10;

/// Key under which listeners are registered.
///
/// Named keys cover ordinary events as well as the reserved `newListener`,
/// `removeListener` and `error` names. [`EventKey::ErrorMonitor`] is a
/// distinct key that can never collide with a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// A named event.
    Name(Arc<str>),
    /// The monitor channel for `error` emissions.
    ErrorMonitor,
}

impl EventKey {
    /// Reserved name notified before a listener is added.
    pub const NEW_LISTENER: &'static str = "newListener";
    /// Reserved name notified after a listener is removed.
    pub const REMOVE_LISTENER: &'static str = "removeListener";
    /// Reserved name with fatal no-listener semantics.
    pub const ERROR: &'static str = "error";

    /// The `error` key.
    #[must_use]
    pub fn error() -> Self {
        Self::from(Self::ERROR)
    }

    /// The `newListener` key.
    #[must_use]
    pub fn new_listener() -> Self {
        Self::from(Self::NEW_LISTENER)
    }

    /// The `removeListener` key.
    #[must_use]
    pub fn remove_listener() -> Self {
        Self::from(Self::REMOVE_LISTENER)
    }

    /// The name of this key, if it is a named key.
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::ErrorMonitor => None,
        }
    }

    /// Whether this is the `error` key.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.as_name() == Some(Self::ERROR)
    }

    /// Whether this is the `removeListener` key.
    #[must_use]
    pub fn is_remove_listener(&self) -> bool {
        self.as_name() == Some(Self::REMOVE_LISTENER)
    }

    /// JSON rendering used when a key travels as an emission argument.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::ErrorMonitor => f.write_str("Symbol(events.errorMonitor)"),
        }
    }
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        Self::Name(Arc::from(name))
    }
}

impl From<String> for EventKey {
    fn from(name: String) -> Self {
        Self::Name(Arc::from(name))
    }
}

impl From<&String> for EventKey {
    fn from(name: &String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<&EventKey> for EventKey {
    fn from(key: &EventKey) -> Self {
        key.clone()
    }
}

impl PartialEq<str> for EventKey {
    fn eq(&self, other: &str) -> bool {
        self.as_name() == Some(other)
    }
}

impl PartialEq<&str> for EventKey {
    fn eq(&self, other: &&str) -> bool {
        self.as_name() == Some(*other)
    }
}

/// Identity of a listener callback.
///
/// Two listener handles are the same listener exactly when their ids match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Create a fresh listener ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// JSON rendering used in `newListener`/`removeListener` notifications.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::String(self.0.to_string())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-key listener threshold above which a leak warning is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxListeners {
    /// Warn once a key holds more than this many listeners. `Limited(0)`
    /// behaves like [`Unbounded`](Self::Unbounded).
    Limited(usize),
    /// Never warn.
    Unbounded,
}

impl MaxListeners {
    /// Whether `count` listeners on one key exceeds this threshold.
    #[must_use]
    pub fn is_exceeded_by(self, count: usize) -> bool {
        self.limit().is_some_and(|max| count > max)
    }

    /// The numeric limit, if any.
    #[must_use]
    pub fn limit(self) -> Option<usize> {
        match self {
            Self::Limited(0) | Self::Unbounded => None,
            Self::Limited(max) => Some(max),
        }
    }
}

impl Default for MaxListeners {
    fn default() -> Self {
        Self::Limited(DEFAULT_MAX_LISTENERS)
    }
}

impl TryFrom<i64> for MaxListeners {
    type Error = EventsError;

    /// Negative values are rejected; zero means unbounded.
    fn try_from(n: i64) -> Result<Self, Self::Error> {
        if n == 0 {
            return Ok(Self::Unbounded);
        }
        usize::try_from(n).map(Self::Limited).map_err(|_| {
            EventsError::invalid_argument(
                "n",
                format!("must be a non-negative integer or unbounded, received {n}"),
            )
        })
    }
}

impl FromStr for MaxListeners {
    type Err = EventsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("unbounded") || trimmed.eq_ignore_ascii_case("infinity") {
            return Ok(Self::Unbounded);
        }
        let n: i64 = trimmed.parse().map_err(|_| {
            EventsError::invalid_argument(
                "n",
                format!("must be a non-negative integer or unbounded, received '{trimmed}'"),
            )
        })?;
        Self::try_from(n)
    }
}

impl fmt::Display for MaxListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(max) => write!(f, "{max}"),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}
