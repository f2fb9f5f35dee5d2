//! Batch job plumbing: cooperative cancellation and progress counters
//!
//! Jobs check [`CancelFlag`] between units of work (a workspace, an embedding
//! batch) and never stop halfway through one.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Shared counters a job updates as it goes; readable from other threads
#[derive(Debug, Clone)]
pub struct Progress {
    pub job_id: String,
    total: Arc<AtomicUsize>,
    done: Arc<AtomicUsize>,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            total: Arc::new(AtomicUsize::new(0)),
            done: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub fn advance(&self, n: usize) {
        self.done.fetch_add(n, Ordering::SeqCst);
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}
