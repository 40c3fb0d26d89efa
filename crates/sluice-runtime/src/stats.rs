//! Per-instance counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of an instance's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Firings admitted (immediately or queued).
    pub admitted: u64,
    /// Subset of `admitted` that had to wait behind another firing.
    pub queued: u64,
    /// Firings rejected by a busy `Drop` trigger.
    pub dropped: u64,
    /// Admitted firings whose propagation ran to completion.
    pub completed: u64,
    /// Admitted firings discarded unrun because the instance stopped or their
    /// trigger was replaced.
    pub discarded: u64,
    /// Node executions, both passes.
    pub node_executions: u64,
    /// Node executions in the feedback pass.
    pub feedback_executions: u64,
}

#[derive(Debug, Default)]
pub(crate) struct InstanceStats {
    pub admitted: AtomicU64,
    pub queued: AtomicU64,
    pub dropped: AtomicU64,
    pub completed: AtomicU64,
    pub discarded: AtomicU64,
    pub node_executions: AtomicU64,
    pub feedback_executions: AtomicU64,
}

impl InstanceStats {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            node_executions: self.node_executions.load(Ordering::Relaxed),
            feedback_executions: self.feedback_executions.load(Ordering::Relaxed),
        }
    }
}
