//! Trigger worker threads.
//!
//! One thread per trigger drains that trigger's firing queue. The thread exits
//! once the controller is closed and the queue is empty; dropping `done`
//! tells the instance it has exited, so `stop()` can wait with a deadline
//! instead of blocking on `join`.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};

use crate::admission::{Firing, TriggerController};
use crate::error::RuntimeError;
use crate::instance::InstanceCore;

/// A running worker.
pub(crate) struct WorkerHandle {
    pub identifier: String,
    join: JoinHandle<()>,
    done: Receiver<()>,
}

impl WorkerHandle {
    /// Spawns the worker draining `queue` for `controller`.
    pub fn spawn(
        core: &Arc<InstanceCore>,
        controller: Arc<TriggerController>,
        queue: Receiver<Firing>,
    ) -> Result<Self, RuntimeError> {
        let (done_tx, done) = bounded::<()>(0);
        let identifier = controller.identifier().to_string();
        let core = Arc::clone(core);
        let join = std::thread::Builder::new()
            .name(format!("sluice-{identifier}"))
            .spawn(move || {
                while let Ok(firing) = queue.recv() {
                    core.run_firing(&controller, firing);
                }
                drop(done_tx);
            })?;
        Ok(Self {
            identifier,
            join,
            done,
        })
    }

    /// Waits for the worker to exit. Returns `false` if the deadline passed
    /// first; the thread is then detached.
    pub fn finish_by(self, deadline: Instant) -> bool {
        match self.done.recv_deadline(deadline) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if self.join.join().is_err() {
                    tracing::error!("worker {} panicked", self.identifier);
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "worker {} still busy at stop deadline; detaching",
                    self.identifier
                );
                false
            }
        }
    }

    /// `true` if called from this worker's own thread.
    pub fn is_current(&self) -> bool {
        self.join.thread().id() == std::thread::current().id()
    }
}
