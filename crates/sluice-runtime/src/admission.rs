//! Per-trigger admission control.
//!
//! Each trigger owns a [`TriggerController`]: a FIFO of admitted firings
//! drained by exactly one worker thread. Firings of the same trigger therefore
//! never overlap and complete in admission order.
//!
//! Under [`SchedulingPolicy::Drop`] a firing requested while another is in
//! flight (or waiting) is discarded instead of queued. A trigger whose firings
//! execute no node is never congested and admits every request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use sluice_core::{GraphSchedule, PortId, PortValue, SchedulingPolicy};

use crate::error::ControlError;
use crate::event::{Admission, Event, EventId};

/// One admitted firing, waiting for (or owned by) its trigger's worker.
pub(crate) struct Firing {
    pub event: Event,
    /// Origin ports with the value to write, `None` keeps the current value.
    pub origins: Vec<(PortId, Option<PortValue>)>,
    /// Schedule the origin ids belong to.
    pub schedule: Arc<GraphSchedule>,
}

/// Admission state of one trigger.
pub(crate) struct TriggerController {
    identifier: String,
    policy: SchedulingPolicy,
    sequence: AtomicU64,
    busy: AtomicBool,
    pending: AtomicUsize,
    completed: AtomicU64,
    retired: AtomicBool,
    sender: Mutex<Option<Sender<Firing>>>,
}

impl std::fmt::Debug for TriggerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerController")
            .field("identifier", &self.identifier)
            .field("policy", &self.policy)
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl TriggerController {
    /// Creates a controller and the receiving end its worker drains.
    pub fn new(identifier: &str, policy: SchedulingPolicy) -> (Arc<Self>, Receiver<Firing>) {
        let (sender, receiver) = unbounded();
        let controller = Arc::new(Self {
            identifier: identifier.to_string(),
            policy,
            sequence: AtomicU64::new(0),
            busy: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            retired: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
        });
        (controller, receiver)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Highest sequence number whose firing has finished.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Firings admitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Admits (or drops) a firing.
    ///
    /// Sequence assignment and enqueueing happen under the sender lock so
    /// sequence numbers match queue order.
    pub fn request(
        &self,
        event_id: EventId,
        origins: Vec<(PortId, Option<PortValue>)>,
        schedule: Arc<GraphSchedule>,
    ) -> Result<Admission, ControlError> {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(ControlError::Stopped);
        };

        let walks_nothing = schedule
            .trigger_by_identifier(&self.identifier)
            .is_some_and(|t| schedule.trigger(t).walks_nothing());
        if self.policy == SchedulingPolicy::Drop
            && !walks_nothing
            && self
                .busy
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return Ok(Admission::Dropped);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let event = Event {
            id: event_id,
            sequence,
        };
        let was_idle = self.pending.fetch_add(1, Ordering::AcqRel) == 0;
        let firing = Firing {
            event,
            origins,
            schedule,
        };
        if sender.send(firing).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            self.busy.store(false, Ordering::Release);
            return Err(ControlError::Stopped);
        }

        Ok(if was_idle {
            Admission::Admitted(event)
        } else {
            Admission::Queued(event)
        })
    }

    /// Reserves the next sequence number for a firing run outside the queue
    /// (synchronous subcomposition firings).
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Marks firing `sequence` as finished (run or discarded).
    pub fn finish(&self, sequence: u64) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
        self.busy.store(false, Ordering::Release);
        self.completed.fetch_max(sequence, Ordering::AcqRel);
    }

    /// Records a firing run outside the queue.
    pub fn finish_inline(&self, sequence: u64) {
        self.completed.fetch_max(sequence, Ordering::AcqRel);
    }

    /// Stops admitting. The worker drains what is queued and exits.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Stops admitting and discards what is still queued. Used when a
    /// replacement schedule hands the identifier to a new controller.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
        self.close();
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}
