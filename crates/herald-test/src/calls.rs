//! Invocation recorder for listener ordering tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use herald_events::{EventListener, Listener, NodeListener};
use serde_json::Value;

/// Render listener arguments as `a,b,c`. Strings are rendered without quotes.
#[must_use]
pub fn render_args(args: &[Value]) -> String {
    args.iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Shared, ordered log of listener invocations.
///
/// Clones share the same log, so listeners built from a clone record into
/// the original.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a raw entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    /// Emitter listener recording `name(args)`, e.g. `L2(7)`.
    #[must_use]
    pub fn listener(&self, name: &str) -> Listener {
        let log = self.clone();
        let name = name.to_owned();
        Listener::new(move |_, args| log.record(format!("{name}({})", render_args(args))))
    }

    /// Target listener recording `name:type`.
    #[must_use]
    pub fn event_listener(&self, name: &str) -> EventListener {
        let log = self.clone();
        let name = name.to_owned();
        EventListener::new(move |_, event| log.record(format!("{name}:{}", event.event_type())))
    }

    /// Node-style listener recording `name:detail`.
    #[must_use]
    pub fn node_listener(&self, name: &str) -> NodeListener {
        let log = self.clone();
        let name = name.to_owned();
        NodeListener::new(move |detail| {
            log.record(format!("{name}:{}", render_args(std::slice::from_ref(detail))));
        })
    }

    /// Snapshot of every entry so far.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_events::EventEmitter;
    use serde_json::json;

    #[test]
    fn test_render_args() {
        assert_eq!(render_args(&[json!(7), json!("a"), json!(null)]), "7,a,null");
        assert_eq!(render_args(&[]), "");
    }

    #[test]
    fn test_clones_share_entries() {
        let log = CallLog::new();
        let emitter = EventEmitter::new();
        emitter.on("x", &log.clone().listener("L")).unwrap();
        emitter.emit("x", &[json!(1), json!(2)]).unwrap();
        assert_eq!(log.entries(), vec!["L(1,2)"]);
        log.clear();
        assert!(log.is_empty());
    }
}
