//! Cancellation and deadlines
//!
//! A `QueryContext` travels with every store call. SQLite polls it through
//! a progress handler while a statement runs, and the engine checks it
//! between statements. Either way an aborted call returns `Cancelled` and
//! discards partial results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::{QueryError, QueryResult};

#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl QueryContext {
    /// Context that never expires
    pub fn background() -> Self {
        Self::default()
    }

    /// Context expiring after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancels this context and every clone of it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails with `Cancelled` once the context is done
    pub fn check(&self) -> QueryResult<()> {
        if self.is_cancelled() {
            Err(QueryError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Progress callback for SQLite; returning true interrupts the statement
    pub(crate) fn interrupt_hook(&self) -> impl FnMut() -> bool + Send + std::panic::RefUnwindSafe + 'static {
        let cancelled = Arc::clone(&self.cancelled);
        let deadline = self.deadline;
        move || cancelled.load(Ordering::SeqCst) || deadline.map_or(false, |d| Instant::now() >= d)
    }
}
