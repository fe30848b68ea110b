//! Listener callbacks for emitters and targets.
//!
//! A listener is a cloneable handle around a callback plus a [`ListenerId`].
//! Clones share the id, so passing a clone to `off`/`remove_event_listener`
//! identifies the same registration.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use herald_core::{ListenerError, ListenerId};
use serde_json::Value;

use crate::emitter::EventEmitter;
use crate::event::Event;
use crate::target::EventTarget;

/// A listener computation still running after its callback returned.
pub type PendingListener = BoxFuture<'static, Result<(), ListenerError>>;

/// What an emitter callback hands back.
///
/// `Ok(Some(_))` is a pending computation that the emitter schedules and
/// whose failure is routed by the capture-rejections policy.
pub type ListenerReturn = Result<Option<PendingListener>, ListenerError>;

type EmitterCallback = dyn Fn(&EventEmitter, &[Value]) -> ListenerReturn + Send + Sync;
type TargetCallback = dyn Fn(&EventTarget, &Event) -> Result<(), ListenerError> + Send + Sync;

/// Callback registered on an [`EventEmitter`].
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    callback: Arc<EmitterCallback>,
}

impl Listener {
    /// Wrap an infallible callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&EventEmitter, &[Value]) + Send + Sync + 'static,
    {
        Self::from_callback(Arc::new(
            move |emitter: &EventEmitter, args: &[Value]| -> ListenerReturn {
                f(emitter, args);
                Ok(None)
            },
        ))
    }

    /// Wrap a callback whose error propagates to the caller of `emit`.
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(&EventEmitter, &[Value]) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        Self::from_callback(Arc::new(
            move |emitter: &EventEmitter, args: &[Value]| -> ListenerReturn {
                f(emitter, args).map(|()| None)
            },
        ))
    }

    /// Wrap a callback that starts an asynchronous computation.
    ///
    /// The returned future is run by the emitter's scheduler; emission does
    /// not wait for it.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(&EventEmitter, &[Value]) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        Self::from_callback(Arc::new(
            move |emitter: &EventEmitter, args: &[Value]| -> ListenerReturn {
                Ok(Some(f(emitter, args).boxed()))
            },
        ))
    }

    fn from_callback(callback: Arc<EmitterCallback>) -> Self {
        Self {
            id: ListenerId::new(),
            callback,
        }
    }

    /// Identity of this listener.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn call(&self, emitter: &EventEmitter, args: &[Value]) -> ListenerReturn {
        (self.callback)(emitter, args)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

/// Callback registered on an [`EventTarget`].
#[derive(Clone)]
pub struct EventListener {
    id: ListenerId,
    callback: Arc<TargetCallback>,
}

impl EventListener {
    /// Wrap an infallible callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&EventTarget, &Event) + Send + Sync + 'static,
    {
        Self::fallible(move |target, event| {
            f(target, event);
            Ok(())
        })
    }

    /// Wrap a callback whose error propagates to the caller of
    /// `dispatch_event`.
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(&EventTarget, &Event) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        Self {
            id: ListenerId::new(),
            callback: Arc::new(f),
        }
    }

    /// Identity of this listener.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn call(&self, target: &EventTarget, event: &Event) -> Result<(), ListenerError> {
        (self.callback)(target, event)
    }
}

impl PartialEq for EventListener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventListener {}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListener").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_identity() {
        let listener = Listener::new(|_, _| {});
        let copy = listener.clone();
        assert_eq!(listener, copy);
        assert_ne!(listener, Listener::new(|_, _| {}));
    }

    #[test]
    fn test_fallible_listener_reports_error() {
        let emitter = EventEmitter::new();
        let listener = Listener::fallible(|_, args| {
            if args.is_empty() {
                Err("no arguments".into())
            } else {
                Ok(())
            }
        });
        assert!(listener.call(&emitter, &[Value::from(1)]).unwrap().is_none());
        assert_eq!(
            listener.call(&emitter, &[]).err().unwrap().to_string(),
            "no arguments"
        );
    }

    #[test]
    fn test_future_listener_returns_pending() {
        let emitter = EventEmitter::new();
        let listener = Listener::future(|_, _| async { Ok::<(), ListenerError>(()) });
        assert!(listener.call(&emitter, &[]).unwrap().is_some());
    }

    #[test]
    fn test_event_listener_identity() {
        let listener = EventListener::new(|_, _| {});
        assert_eq!(listener.clone(), listener);
        assert!(format!("{listener:?}").starts_with("EventListener"));
    }
}
