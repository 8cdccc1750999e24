//! Caller-supplied cancellation, honored at the suspension points named in
//! the concurrency model: before opening a pool, before beginning a
//! transaction, and immediately before commit. A token is a cheap `Clone`
//! handle over shared state, the same shape this codebase uses for its other
//! cross-thread cooperative-cancellation signals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::{StoreError, StoreResult};

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

/// A cooperative cancellation signal plus an optional deadline. Cloning
/// shares the same underlying flag, so any clone can cancel all of them.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// A token that is never cancelled and has no deadline — the default for
    /// call sites that don't need cooperative cancellation.
    pub fn none() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: None,
            }),
        }
    }

    /// A token that cancels itself once `timeout` has elapsed, in addition to
    /// whatever explicit `cancel()` calls it receives.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Some(Instant::now() + timeout),
            }),
        }
    }

    /// Mark this token (and every clone of it) cancelled.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
            || self.inner.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Honor the token at a suspension point: `Ok(())` if still live,
    /// `Err(StoreError::Cancelled)` otherwise.
    pub fn check(&self) -> StoreResult<()> {
        if self.is_cancelled() {
            Err(StoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::none()
    }
}
