//! Overlap protection for interval-driven snapshot ticks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "tick in flight" flag
///
/// The scheduler calls [`TickGuard::try_begin`] before spawning a snapshot
/// job; while a previous job still holds its [`TickPermit`], the new tick is
/// skipped instead of queued.
#[derive(Debug, Clone, Default)]
pub struct TickGuard {
    busy: Arc<AtomicBool>,
}

impl TickGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the tick, or `None` if one is already running
    pub fn try_begin(&self) -> Option<TickPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of one tick; releases the guard on drop
#[derive(Debug)]
pub struct TickPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for TickPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
