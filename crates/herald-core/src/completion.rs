//! Pending-completion primitive.
//!
//! A [`Resolver`] is the push side and a [`Completion`] the pull side of a
//! single-shot result. Exactly one of resolve, fail or cancel takes effect;
//! later calls report `false` and change nothing.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{EventsError, EventsResult};

/// Create a connected resolver/completion pair.
#[must_use]
pub fn pair<T>() -> (Resolver<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Resolver {
            sender: Mutex::new(Some(tx)),
        },
        Completion { receiver: rx },
    )
}

/// Settling side of a pending completion.
pub struct Resolver<T> {
    sender: Mutex<Option<oneshot::Sender<EventsResult<T>>>>,
}

impl<T> Resolver<T> {
    /// Settle with a value. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settle with an error. Returns `false` if already settled.
    pub fn fail(&self, error: EventsError) -> bool {
        self.settle(Err(error))
    }

    /// Settle as aborted. Returns `false` if already settled.
    pub fn cancel(&self, reason: Option<Value>) -> bool {
        self.settle(Err(EventsError::Aborted { reason }))
    }

    /// Whether a settle call has already taken effect.
    pub fn is_settled(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn settle(&self, result: EventsResult<T>) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => {
                // The receiving side may be gone; the settle still counts.
                let _ = tx.send(result);
                true
            },
            None => false,
        }
    }
}

impl<T> std::fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Awaitable side of a pending completion.
///
/// Yields [`EventsError::Abandoned`] if the resolver is dropped unsettled.
#[derive(Debug)]
pub struct Completion<T> {
    receiver: oneshot::Receiver<EventsResult<T>>,
}

impl<T> Completion<T> {
    /// Non-blocking check for a settled result.
    ///
    /// Returns `None` while still pending.
    pub fn try_take(&mut self) -> Option<EventsResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(EventsError::Abandoned)),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = EventsResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(EventsError::Abandoned)))
    }
}
