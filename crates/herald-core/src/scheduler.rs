//! Scheduler capability for pending listener computations.
//!
//! Dispatch itself is synchronous. A listener may hand back a future; the
//! dispatcher passes it to a [`Scheduler`] so its failure can be observed
//! later without blocking the emitting thread.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use futures::future::BoxFuture;
use tracing::{debug, warn};

/// Runs detached futures to completion.
pub trait Scheduler: Send + Sync {
    /// Run `task` to completion at some later point.
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Spawns onto the ambient tokio runtime.
///
/// Outside a runtime the task runs on a dedicated worker thread instead. If
/// that thread cannot be started the task runs to completion on the calling
/// thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            },
            Err(e) => {
                debug!(reason = %e, "No tokio runtime, running pending listener task on a worker thread");
                run_detached(task);
            },
        }
    }
}

type TaskSlot = Arc<Mutex<Option<BoxFuture<'static, ()>>>>;

fn take_task(slot: &TaskSlot) -> Option<BoxFuture<'static, ()>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

fn run_detached(task: BoxFuture<'static, ()>) {
    let slot: TaskSlot = Arc::new(Mutex::new(Some(task)));
    let worker_slot = Arc::clone(&slot);
    let spawned = thread::Builder::new()
        .name("herald-listener".to_owned())
        .spawn(move || {
            if let Some(task) = take_task(&worker_slot) {
                futures::executor::block_on(task);
            }
        });

    if let Err(e) = spawned {
        warn!(error = %e, "Worker thread unavailable, running pending listener task inline");
        if let Some(task) = take_task(&slot) {
            futures::executor::block_on(task);
        }
    }
}
