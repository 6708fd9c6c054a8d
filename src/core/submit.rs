//! Single in-flight submission guard

use anyhow::Result;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Allows at most one pending submission per form. A second trigger while a
/// submission is in flight is refused rather than queued.
#[derive(Debug, Default)]
pub struct SubmitGuard {
    in_flight: AtomicBool,
}

impl SubmitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self) -> Option<SubmitPermit<'_>> {
        match self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Some(SubmitPermit { guard: self }),
            Err(_) => {
                debug!("Submission already in flight");
                None
            }
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs `operation` while holding the permit, or fails straight away when
    /// another submission is pending.
    pub async fn submit<F, T>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let Some(_permit) = self.try_begin() else {
            anyhow::bail!("A submission is already in progress");
        };
        operation.await
    }
}

/// Re-enables submission when dropped.
#[derive(Debug)]
pub struct SubmitPermit<'a> {
    guard: &'a SubmitGuard,
}

impl Drop for SubmitPermit<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}
