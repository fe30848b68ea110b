//! Registrations held on behalf of a pull-side consumer.
//!
//! Both the once awaiter and the event iterator register ordinary listeners
//! on an emitter plus an optional abort subscription. [`Detachment`] owns
//! that set and tears it down exactly once, whichever path gets there first.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use herald_core::{EventKey, EventsResult};
use tracing::debug;

use crate::abort::SubscriptionHandle;
use crate::emitter::{EventEmitter, WeakEmitter};
use crate::listener::Listener;

struct Attached {
    emitter: WeakEmitter,
    listeners: Vec<(EventKey, Listener)>,
    abort: Option<SubscriptionHandle>,
}

#[derive(Default)]
pub(crate) struct Detachment {
    attached: Mutex<Option<Attached>>,
}

impl Detachment {
    /// Register each `(key, listener)` through `register`.
    ///
    /// On failure the listeners registered so far are removed again.
    pub(crate) fn register<F>(
        &self,
        emitter: &EventEmitter,
        listeners: Vec<(EventKey, Listener)>,
        mut register: F,
    ) -> EventsResult<()>
    where
        F: FnMut(&EventEmitter, &EventKey, &Listener) -> EventsResult<()>,
    {
        let mut done = Vec::with_capacity(listeners.len());
        for (key, listener) in listeners {
            if let Err(err) = register(emitter, &key, &listener) {
                done.into_iter()
                    .for_each(|(key, listener)| remove(emitter, &key, &listener));
                return Err(err);
            }
            done.push((key, listener));
        }
        *self.lock() = Some(Attached {
            emitter: emitter.downgrade(),
            listeners: done,
            abort: None,
        });
        Ok(())
    }

    /// Hand over the abort subscription, releasing it at once if already
    /// detached.
    pub(crate) fn hold_abort(&self, handle: SubscriptionHandle) {
        let mut attached = self.lock();
        match attached.as_mut() {
            Some(attached) => attached.abort = Some(handle),
            None => {
                drop(attached);
                handle.release();
            },
        }
    }

    /// Remove every held registration. Later calls do nothing.
    pub(crate) fn detach(&self) {
        let Some(attached) = self.lock().take() else {
            return;
        };
        if let Some(emitter) = attached.emitter.upgrade() {
            for (key, listener) in &attached.listeners {
                remove(&emitter, key, listener);
            }
        }
        if let Some(handle) = attached.abort {
            handle.release();
        }
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Attached>> {
        self.attached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Detachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detachment")
            .field("attached", &self.is_attached())
            .finish()
    }
}

fn remove(emitter: &EventEmitter, key: &EventKey, listener: &Listener) {
    if let Err(err) = emitter.off(key, listener) {
        debug!(key = %key, error = %err, "Failed to detach bridge listener");
    }
}
