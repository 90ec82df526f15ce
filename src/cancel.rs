//! Cooperative cancellation.
//!
//! A job holds a token carrying its job identifier; the matching handle can
//! retire that identifier at any time. Stages compare identifiers at page
//! and recognition-pass boundaries and stop cleanly on mismatch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cancellation token for one job.
#[derive(Debug, Clone)]
pub struct CancelToken {
    job: u64,
    active: Arc<AtomicU64>,
}

/// Handle that can cancel the job its token was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    active: Arc<AtomicU64>,
}

impl CancelToken {
    /// Create a token/handle pair for a job identifier.
    pub fn new(job: u64) -> (CancelToken, CancelHandle) {
        let active = Arc::new(AtomicU64::new(job));
        (
            CancelToken {
                job,
                active: active.clone(),
            },
            CancelHandle { active },
        )
    }

    /// A token that can never be cancelled, for callers without a job.
    pub fn never() -> CancelToken {
        CancelToken::new(0).0
    }

    /// The job identifier this token belongs to.
    pub fn job(&self) -> u64 {
        self.job
    }

    /// Whether the job has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.active.load(Ordering::SeqCst) != self.job
    }
}

impl CancelHandle {
    /// Cancel the job: every token minted for it reports cancelled.
    pub fn cancel(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }
}
