//! Await the next emission of a key.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use herald_core::completion::pair;
use herald_core::{Completion, EventArgs, EventKey, EventsError, EventsResult, Resolver};
use tracing::trace;

use crate::abort::{AbortSignal, add_abort_listener};
use crate::bridge::Detachment;
use crate::emitter::EventEmitter;
use crate::listener::Listener;

/// Options for [`once`].
#[derive(Debug, Clone, Default)]
pub struct OnceOptions {
    /// Cancels the wait when aborted.
    pub signal: Option<AbortSignal>,
}

impl OnceOptions {
    /// No signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the wait when `signal` aborts.
    #[must_use]
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Future resolving with the argument tuple of the first matching emission.
///
/// Fails with [`EventsError::ErrorEvent`] if `error` is emitted first (when
/// waiting on another key) and with [`EventsError::Aborted`] when the signal
/// aborts first. Its listeners are detached once it settles or is dropped.
#[must_use = "the awaiter does nothing unless awaited"]
#[derive(Debug)]
pub struct OnceAwaiter {
    completion: Completion<EventArgs>,
    detachment: Arc<Detachment>,
}

impl OnceAwaiter {
    /// Whether listeners are still registered on the emitter.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.detachment.is_attached()
    }
}

impl Future for OnceAwaiter {
    type Output = EventsResult<EventArgs>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.completion).poll(cx)
    }
}

impl Drop for OnceAwaiter {
    fn drop(&mut self) {
        self.detachment.detach();
    }
}

/// Wait for the next emission of `key` on `emitter`.
///
/// Registration failures and an already-aborted signal surface when the
/// returned future is awaited.
pub fn once(
    emitter: &EventEmitter,
    key: impl Into<EventKey>,
    options: OnceOptions,
) -> OnceAwaiter {
    let key = key.into();
    let (resolver, completion) = pair();
    let resolver = Arc::new(resolver);
    let detachment = Arc::new(Detachment::default());
    let awaiter = OnceAwaiter {
        completion,
        detachment: Arc::clone(&detachment),
    };

    if let Some(signal) = options.signal.as_ref().filter(|s| s.aborted()) {
        resolver.cancel(signal.reason());
        return awaiter;
    }

    let mut listeners = vec![(key.clone(), settle_on(&resolver, &detachment, Ok))];
    if !key.is_error() {
        listeners.push((
            EventKey::error(),
            settle_on(&resolver, &detachment, |args: EventArgs| {
                Err(EventsError::ErrorEvent {
                    payload: args.into_iter().next(),
                })
            }),
        ));
    }

    if let Err(err) = detachment.register(emitter, listeners, |emitter, key, listener| {
        emitter.once(key, listener)
    }) {
        resolver.fail(err);
        return awaiter;
    }

    if let Some(signal) = &options.signal {
        let resolver = Arc::clone(&resolver);
        let detach = Arc::clone(&detachment);
        let handle = add_abort_listener(signal, move |signal| {
            if resolver.cancel(signal.reason()) {
                detach.detach();
            }
        });
        detachment.hold_abort(handle);
    }

    // Settled while registering: the listener that fired found nothing to
    // detach yet.
    if resolver.is_settled() {
        detachment.detach();
    }
    trace!(key = %key, "Awaiting next emission");
    awaiter
}

fn settle_on<F>(
    resolver: &Arc<Resolver<EventArgs>>,
    detachment: &Arc<Detachment>,
    outcome: F,
) -> Listener
where
    F: Fn(EventArgs) -> EventsResult<EventArgs> + Send + Sync + 'static,
{
    let resolver = Arc::clone(resolver);
    let detachment = Arc::clone(detachment);
    Listener::new(move |_, args| {
        let settled = match outcome(args.to_vec()) {
            Ok(args) => resolver.resolve(args),
            Err(err) => resolver.fail(err),
        };
        if settled {
            detachment.detach();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::AbortController;
    use serde_json::json;

    #[tokio::test]
    async fn test_resolves_with_first_emission() {
        let emitter = EventEmitter::new();
        let awaiter = once(&emitter, "ready", OnceOptions::new());
        assert_eq!(emitter.listener_count("ready"), 1);
        assert_eq!(emitter.listener_count("error"), 1);

        emitter
            .emit("ready", &[json!("a"), json!("b"), json!("c")])
            .unwrap();
        assert!(!emitter.emit("ready", &[json!("late")]).unwrap());

        assert_eq!(
            awaiter.await.unwrap(),
            vec![json!("a"), json!("b"), json!("c")]
        );
        assert_eq!(emitter.listener_count("ready"), 0);
        assert_eq!(emitter.listener_count("error"), 0);
    }

    #[tokio::test]
    async fn test_error_emission_fails_waiter() {
        let emitter = EventEmitter::new();
        let awaiter = once(&emitter, "ready", OnceOptions::new());

        assert!(emitter.emit("error", &[json!("boom")]).unwrap());
        let err = awaiter.await.unwrap_err();
        assert!(matches!(
            err,
            EventsError::ErrorEvent { payload: Some(ref p) } if *p == json!("boom")
        ));
        assert_eq!(emitter.listener_count("ready"), 0);
    }

    #[tokio::test]
    async fn test_waiting_on_error_resolves() {
        let emitter = EventEmitter::new();
        let awaiter = once(&emitter, "error", OnceOptions::new());
        assert_eq!(emitter.listener_count("error"), 1);

        assert!(emitter.emit("error", &[json!("boom")]).unwrap());
        assert_eq!(awaiter.await.unwrap(), vec![json!("boom")]);
    }

    #[tokio::test]
    async fn test_abort_before_emission() {
        let emitter = EventEmitter::new();
        let controller = AbortController::new();
        let awaiter = once(
            &emitter,
            "ready",
            OnceOptions::new().signal(controller.signal()),
        );

        controller.abort(Some(json!("cancelled"))).unwrap();
        assert!(!awaiter.is_pending());
        assert_eq!(emitter.listener_count("ready"), 0);

        let err = awaiter.await.unwrap_err();
        assert!(matches!(
            err,
            EventsError::Aborted { reason: Some(ref r) } if *r == json!("cancelled")
        ));
    }

    #[tokio::test]
    async fn test_abort_after_resolution_is_noop() {
        let emitter = EventEmitter::new();
        let controller = AbortController::new();
        let awaiter = once(
            &emitter,
            "ready",
            OnceOptions::new().signal(controller.signal()),
        );
        emitter.emit("ready", &[json!(1)]).unwrap();
        assert_eq!(
            controller.signal().target().listener_count(crate::abort::ABORT_EVENT),
            0
        );
        controller.abort(None).unwrap();
        assert_eq!(awaiter.await.unwrap(), vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_already_aborted_signal() {
        let emitter = EventEmitter::new();
        let signal = AbortSignal::already_aborted(None);
        let awaiter = once(&emitter, "ready", OnceOptions::new().signal(signal));
        assert_eq!(emitter.listener_count("ready"), 0);
        assert!(awaiter.await.unwrap_err().is_abort());
    }

    #[tokio::test]
    async fn test_drop_detaches() {
        let emitter = EventEmitter::new();
        drop(once(&emitter, "ready", OnceOptions::new()));
        assert!(emitter.event_names().is_empty());
    }

    #[tokio::test]
    async fn test_disposed_emitter_fails_on_await() {
        let emitter = EventEmitter::new();
        emitter.dispose().unwrap();
        let err = once(&emitter, "ready", OnceOptions::new()).await.unwrap_err();
        assert!(matches!(err, EventsError::Disposed));
    }
}
