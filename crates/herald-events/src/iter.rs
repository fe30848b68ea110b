//! Pull-based iteration over emissions.
//!
//! [`on`] registers one persistent listener on the key and one per close
//! key, and buffers every emission in an unbounded queue. The returned
//! [`EventIterator`] is a [`Stream`] draining that queue in emission order.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use herald_core::{EventArgs, EventKey, EventsError, EventsResult};
use tokio::sync::mpsc;
use tracing::trace;

use crate::abort::{AbortSignal, add_abort_listener};
use crate::bridge::Detachment;
use crate::emitter::EventEmitter;
use crate::listener::Listener;

/// Options for [`on`].
#[derive(Debug, Clone, Default)]
pub struct OnOptions {
    /// Keys whose emission ends the iteration.
    pub close: Vec<EventKey>,
    /// Fails the iteration when aborted.
    pub signal: Option<AbortSignal>,
}

impl OnOptions {
    /// No close keys and no signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// End the iteration when `key` is emitted.
    #[must_use]
    pub fn close_on(mut self, key: impl Into<EventKey>) -> Self {
        self.close.push(key.into());
        self
    }

    /// Fail the iteration when `signal` aborts.
    #[must_use]
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

type Message = EventsResult<EventArgs>;

/// Push side of the queue. Closing drops the sender so the stream ends once
/// drained.
#[derive(Debug)]
struct Feed {
    sender: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl Feed {
    fn lock(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Message>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, args: EventArgs) {
        if let Some(sender) = self.lock().as_ref() {
            // The receiver outlives the registrations; a failed send means
            // the iterator is already gone.
            let _ = sender.send(Ok(args));
        }
    }

    fn fail(&self, error: EventsError) {
        if let Some(sender) = self.lock().take() {
            let _ = sender.send(Err(error));
        }
    }

    fn close(&self) {
        self.lock().take();
    }

    fn is_closed(&self) -> bool {
        self.lock().is_none()
    }
}

/// Buffered stream of emissions of one key.
///
/// Yields each emission's argument tuple. Ends after a close key is emitted
/// and everything buffered before it has been yielded. An `error` emission
/// (when iterating another key) or an abort yields one `Err` after the
/// buffered items, then ends.
#[must_use = "streams do nothing unless polled"]
#[derive(Debug)]
pub struct EventIterator {
    receiver: mpsc::UnboundedReceiver<Message>,
    feed: Arc<Feed>,
    detachment: Arc<Detachment>,
}

impl EventIterator {
    /// Stop production now. Items already buffered are still yielded.
    pub fn close(&mut self) {
        self.feed.close();
        self.detachment.detach();
    }

    /// Whether listeners are still registered on the emitter.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.detachment.is_attached()
    }

    /// Number of emissions buffered and not yet yielded.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }
}

impl Stream for EventIterator {
    type Item = EventsResult<EventArgs>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.receiver.poll_recv(cx);
        if let Poll::Ready(None) = polled {
            self.detachment.detach();
        }
        polled
    }
}

impl Drop for EventIterator {
    fn drop(&mut self) {
        self.close();
    }
}

/// Iterate over emissions of `key` on `emitter`.
///
/// # Errors
///
/// - [`EventsError::Aborted`] if `options.signal` has already aborted.
/// - Any error raised while registering the listeners, such as
///   [`EventsError::Disposed`].
pub fn on(
    emitter: &EventEmitter,
    key: impl Into<EventKey>,
    options: OnOptions,
) -> EventsResult<EventIterator> {
    let key = key.into();
    if let Some(signal) = &options.signal {
        signal.throw_if_aborted()?;
    }

    let (sender, receiver) = mpsc::unbounded_channel();
    let feed = Arc::new(Feed {
        sender: Mutex::new(Some(sender)),
    });
    let detachment = Arc::new(Detachment::default());

    let mut listeners = Vec::with_capacity(options.close.len().saturating_add(2));
    {
        let feed = Arc::clone(&feed);
        listeners.push((
            key.clone(),
            Listener::new(move |_, args| feed.push(args.to_vec())),
        ));
    }
    if !key.is_error() {
        let feed = Arc::clone(&feed);
        let detach = Arc::clone(&detachment);
        listeners.push((
            EventKey::error(),
            Listener::new(move |_, args| {
                feed.fail(EventsError::ErrorEvent {
                    payload: args.first().cloned(),
                });
                detach.detach();
            }),
        ));
    }
    for close_key in &options.close {
        let feed = Arc::clone(&feed);
        let detach = Arc::clone(&detachment);
        listeners.push((
            close_key.clone(),
            Listener::new(move |_, _| {
                feed.close();
                detach.detach();
            }),
        ));
    }

    detachment.register(emitter, listeners, |emitter, key, listener| {
        emitter.on(key, listener)
    })?;

    if let Some(signal) = &options.signal {
        let feed = Arc::clone(&feed);
        let detach = Arc::clone(&detachment);
        let handle = add_abort_listener(signal, move |signal| {
            feed.fail(EventsError::Aborted {
                reason: signal.reason(),
            });
            detach.detach();
        });
        detachment.hold_abort(handle);
    }

    // Ended while registering: nothing was attached when it happened.
    if feed.is_closed() {
        detachment.detach();
    }
    trace!(key = %key, close = options.close.len(), "Iterating emissions");

    Ok(EventIterator {
        receiver,
        feed,
        detachment,
    })
}
