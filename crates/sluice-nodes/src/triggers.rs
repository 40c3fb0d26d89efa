//! Trigger nodes: sources of firings.
//!
//! Their trigger ports are fired from outside the propagation path: by the
//! start hook (`fire_on_start`), by a control request (`fire_on_request`), or
//! by a timer thread owned by the node (`fire_periodically`).

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use sluice_core::{PortDecl, PortValue, SchedulingPolicy};
use sluice_runtime::{
    InstantiateContext, NodeBehavior, NodeContext, NodeError, TriggerHandle, TriggerHandles,
};

// --- fire_on_start ---

pub(crate) fn fire_on_start_ports() -> Vec<PortDecl> {
    vec![PortDecl::event_trigger("started", SchedulingPolicy::Enqueue)]
}

pub(crate) fn fire_on_start(_ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    Box::new(FireOnStart { fired: false })
}

/// Fires `started` once, the first time the composition starts running.
struct FireOnStart {
    fired: bool,
}

impl NodeBehavior for FireOnStart {
    fn execute(&mut self, _ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        Ok(())
    }

    fn start_triggers(&mut self, triggers: &TriggerHandles) {
        if self.fired {
            return;
        }
        self.fired = true;
        if let Err(err) = triggers.fire("started", None) {
            tracing::warn!("fire_on_start: {err}");
        }
    }
}

// --- fire_on_request ---

pub(crate) fn fire_on_request_ports() -> Vec<PortDecl> {
    vec![PortDecl::trigger("fired", SchedulingPolicy::Enqueue)]
}

pub(crate) fn fire_on_request(_ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    Box::new(FireOnRequest)
}

/// Holds a trigger port fired by control requests.
struct FireOnRequest;

impl NodeBehavior for FireOnRequest {
    fn execute(&mut self, _ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        Ok(())
    }
}

// --- fire_periodically ---

pub(crate) fn fire_periodically_ports() -> Vec<PortDecl> {
    vec![
        PortDecl::input("seconds").with_default(1.0),
        PortDecl::trigger("fired", SchedulingPolicy::Drop),
    ]
}

pub(crate) fn fire_periodically(ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    let interval = ctx
        .initial_input("seconds")
        .and_then(PortValue::as_real)
        .unwrap_or(1.0);
    Box::new(FirePeriodically {
        interval,
        elapsed: 0.0,
        timer: None,
    })
}

enum TimerCommand {
    Interval(f64),
    Stop,
}

struct Timer {
    commands: Sender<TimerCommand>,
    thread: JoinHandle<f64>,
}

impl Timer {
    /// Spawns the timer thread; it returns the elapsed seconds when stopped.
    fn spawn(trigger: TriggerHandle, interval: f64, elapsed: f64) -> Option<Self> {
        let (commands, receiver) = bounded(4);
        let thread = thread::Builder::new()
            .name(format!("sluice-timer-{}", trigger.port()))
            .spawn(move || {
                let mut interval = interval;
                let mut elapsed = elapsed;
                loop {
                    let command = if interval > 0.0 {
                        receiver.recv_timeout(Duration::from_secs_f64(interval.max(0.001)))
                    } else {
                        receiver.recv().map_err(|_| RecvTimeoutError::Disconnected)
                    };
                    match command {
                        Ok(TimerCommand::Interval(seconds)) => interval = seconds,
                        Ok(TimerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            elapsed += interval;
                            // Dropped or rejected firings are fine: the next tick retries.
                            let _ = trigger.fire(Some(PortValue::Real(elapsed)));
                        }
                    }
                }
                elapsed
            });
        match thread {
            Ok(thread) => Some(Self { commands, thread }),
            Err(err) => {
                tracing::error!("fire_periodically: cannot spawn timer: {err}");
                None
            }
        }
    }

    fn stop(self) -> Option<f64> {
        let _ = self.commands.send(TimerCommand::Stop);
        self.thread.join().ok()
    }
}

/// Fires `fired` every `seconds` with the total elapsed time.
///
/// The timer runs only between the trigger hooks, so pausing the composition
/// pauses it; elapsed time resumes where it left off.
struct FirePeriodically {
    interval: f64,
    elapsed: f64,
    timer: Option<Timer>,
}

impl NodeBehavior for FirePeriodically {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        if ctx.received_event("seconds") {
            self.interval = ctx.input_real("seconds")?;
            if let Some(timer) = &self.timer {
                let _ = timer.commands.send(TimerCommand::Interval(self.interval));
            }
        }
        Ok(())
    }

    fn start_triggers(&mut self, triggers: &TriggerHandles) {
        if self.timer.is_some() {
            return;
        }
        if let Some(fired) = triggers.get("fired") {
            self.timer = Timer::spawn(fired.clone(), self.interval, self.elapsed);
        }
    }

    fn stop_triggers(&mut self) {
        if let Some(timer) = self.timer.take() {
            if let Some(elapsed) = timer.stop() {
                self.elapsed = elapsed;
            }
        }
    }

    fn fini(&mut self) {
        self.stop_triggers();
    }
}
