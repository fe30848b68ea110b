//! Mock collaborators for dispatcher tests.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use herald_core::{Diagnostics, EventKey, MaxListenersWarning, Scheduler};
use serde_json::Value;
use tracing::debug;

/// Diagnostics that records every report instead of logging it.
///
/// Clones share the same records, so keep one and hand another to the
/// dispatcher.
#[derive(Debug, Clone, Default)]
pub struct RecordingDiagnostics {
    warnings: Arc<Mutex<Vec<MaxListenersWarning>>>,
    unhandled_errors: Arc<Mutex<Vec<(EventKey, Option<Value>)>>>,
    rejections: Arc<Mutex<Vec<(EventKey, String)>>>,
}

impl RecordingDiagnostics {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// This recorder as a shareable collaborator.
    #[must_use]
    pub fn shared(&self) -> Arc<dyn Diagnostics> {
        Arc::new(self.clone())
    }

    /// Max-listener warnings received so far.
    #[must_use]
    pub fn warnings(&self) -> Vec<MaxListenersWarning> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Unhandled `error` emissions received so far.
    #[must_use]
    pub fn unhandled_errors(&self) -> Vec<(EventKey, Option<Value>)> {
        self.unhandled_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Uncaptured rejections received so far, with their messages.
    #[must_use]
    pub fn rejections(&self) -> Vec<(EventKey, String)> {
        self.rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn max_listeners_exceeded(&self, warning: &MaxListenersWarning) {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(warning.clone());
    }

    fn unhandled_error(&self, key: &EventKey, payload: Option<&Value>) {
        self.unhandled_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((key.clone(), payload.cloned()));
    }

    fn unhandled_rejection(&self, key: &EventKey, error: &(dyn std::error::Error + Send + Sync)) {
        self.rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((key.clone(), error.to_string()));
    }
}

/// Scheduler that queues tasks until [`run_pending`](Self::run_pending).
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Arc<Mutex<Vec<BoxFuture<'static, ()>>>>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

impl ManualScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// This scheduler as a shareable collaborator.
    #[must_use]
    pub fn shared(&self) -> Arc<dyn Scheduler> {
        Arc::new(self.clone())
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run every queued task to completion on the current thread, including
    /// tasks queued while running. Returns how many ran.
    ///
    /// Must not be called from inside an async runtime worker.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0usize;
        loop {
            let batch: Vec<_> = self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .drain(..)
                .collect();
            if batch.is_empty() {
                break;
            }
            for task in batch {
                futures::executor::block_on(task);
                ran = ran.saturating_add(1);
            }
        }
        debug!(ran, "Ran pending listener tasks");
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_manual_scheduler_runs_nested_tasks() {
        let scheduler = ManualScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_hits = Arc::clone(&hits);
        let inner_scheduler = scheduler.clone();
        scheduler.spawn(Box::pin(async move {
            inner_hits.fetch_add(1, Ordering::SeqCst);
            let nested = Arc::clone(&inner_hits);
            inner_scheduler.spawn(Box::pin(async move {
                nested.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.run_pending(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_recording_diagnostics_shares_records() {
        let diagnostics = RecordingDiagnostics::new();
        let shared = diagnostics.shared();
        shared.unhandled_error(&EventKey::error(), None);
        assert_eq!(diagnostics.unhandled_errors(), vec![(EventKey::error(), None)]);
    }
}
