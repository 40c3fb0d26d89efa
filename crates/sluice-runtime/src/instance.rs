//! Composition instance internals.
//!
//! An [`InstanceCore`] owns one generation of node state (schedule plus one
//! [`NodeSlot`] per node), one [`TriggerController`] and worker per trigger,
//! and the lifecycle state machine. Public access goes through
//! [`CompositionInstance`](crate::CompositionInstance) and
//! [`Runner`](crate::Runner); subcomposition nodes hold a core directly.
//!
//! # Locking
//!
//! Locks are always taken in this order, never in reverse:
//!
//! 1. `control`: serializes lifecycle transitions and schedule replacement
//! 2. `gate`: workers hold it shared for a whole firing; replacement takes it
//!    exclusively so a schedule swap happens between firings
//! 3. one node slot at a time
//!
//! The lifecycle state is an atomic so a failing worker can mark the instance
//! failed without touching `control`; teardown then runs on its own thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use arc_swap::ArcSwap;
use parking_lot::{Condvar, Mutex, RwLock};
use sluice_core::{
    CompositionIdentifier, GraphSchedule, Node, PortId, PortValue, ScheduleDiff, SchedulingPolicy,
    TriggerId,
};

use crate::admission::{Firing, TriggerController};
use crate::config::RuntimeConfig;
use crate::directory::InstanceDirectory;
use crate::error::{ControlError, NodeError, RuntimeError};
use crate::event::{Admission, Event, EventId};
use crate::executor::NodeSlot;
use crate::node::{InstantiateContext, NodeBehavior, NodeClassResolver, NodeContext, TriggerHandles};
use crate::propagator::{FiringReport, NodeFailure, Propagator};
use crate::stats::{InstanceStats, StatsSnapshot};
use crate::telemetry::{TelemetryEmitter, TelemetryHub};
use crate::worker::WorkerHandle;

/// Lifecycle of a composition instance.
///
/// ```text
/// Constructed ──start──▶ Running ◀──unpause/pause──▶ Paused
///      │                    │                          │
///      └──start_paused──────┼──────────────────────────┘
///                           ▼
///                 Stopping ──▶ Stopped     (any) ──node error──▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    /// Built, not started. Port values can be read and written.
    Constructed = 0,
    /// Admitting firings; trigger nodes are started.
    Running = 1,
    /// Not admitting firings; trigger nodes are stopped.
    Paused = 2,
    /// `stop()` in progress.
    Stopping = 3,
    /// Torn down.
    Stopped = 4,
    /// A node failed; the instance tore itself down.
    Failed = 5,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Constructed,
            1 => Self::Running,
            2 => Self::Paused,
            3 => Self::Stopping,
            4 => Self::Stopped,
            _ => Self::Failed,
        }
    }

    /// `true` once the instance can no longer run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped | Self::Failed)
    }

    /// Lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Constructed => "constructed",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Services shared by every instance of one composition tree.
pub(crate) struct RuntimeEnv {
    pub resolver: Arc<dyn NodeClassResolver>,
    pub hub: Arc<TelemetryHub>,
    pub directory: InstanceDirectory,
    pub config: RuntimeConfig,
}

impl RuntimeEnv {
    pub fn new(resolver: Arc<dyn NodeClassResolver>, config: RuntimeConfig) -> Arc<Self> {
        Arc::new(Self {
            resolver,
            hub: TelemetryHub::new(),
            directory: InstanceDirectory::default(),
            config,
        })
    }
}

/// A schedule and the node state laid out for it.
pub(crate) struct Generation {
    pub schedule: Arc<GraphSchedule>,
    pub slots: Vec<Arc<NodeSlot>>,
}

/// The pseudo node holding published input values.
struct PublishedInputs;

impl NodeBehavior for PublishedInputs {
    fn execute(&mut self, _ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        Ok(())
    }
}

pub(crate) struct InstanceCore {
    identifier: CompositionIdentifier,
    env: Arc<RuntimeEnv>,
    telemetry: TelemetryEmitter,
    current: ArcSwap<Generation>,
    gate: RwLock<()>,
    control: Mutex<()>,
    state: AtomicU8,
    accepting: AtomicBool,
    triggers: RwLock<HashMap<String, Arc<TriggerController>>>,
    workers: Mutex<Vec<WorkerHandle>>,
    next_event: AtomicU64,
    progress: Mutex<()>,
    progress_changed: Condvar,
    published_events: AtomicU64,
    stats: InstanceStats,
    triggers_started: AtomicBool,
    torn_down: AtomicBool,
    self_ref: Weak<InstanceCore>,
}

impl std::fmt::Debug for InstanceCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceCore")
            .field("identifier", &self.identifier)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl InstanceCore {
    /// Instantiates every node, spawns one worker per trigger, and registers
    /// the instance in the directory.
    pub fn create(
        identifier: CompositionIdentifier,
        schedule: Arc<GraphSchedule>,
        env: Arc<RuntimeEnv>,
    ) -> Result<Arc<Self>, RuntimeError> {
        let mut slots = Vec::with_capacity(schedule.node_count());
        for node in schedule.nodes() {
            match instantiate(&identifier, &env, &schedule, node) {
                Ok(slot) => slots.push(Arc::new(slot)),
                Err(err) => {
                    fini_all(&slots);
                    return Err(err);
                }
            }
        }

        let telemetry = TelemetryEmitter::new(
            Arc::clone(&env.hub),
            identifier.clone(),
            env.config.summary_max_len,
        );
        let core = Arc::new_cyclic(|self_ref| Self {
            identifier,
            env,
            telemetry,
            current: ArcSwap::from_pointee(Generation {
                schedule: Arc::clone(&schedule),
                slots,
            }),
            gate: RwLock::new(()),
            control: Mutex::new(()),
            state: AtomicU8::new(LifecycleState::Constructed as u8),
            accepting: AtomicBool::new(true),
            triggers: RwLock::new(HashMap::new()),
            workers: Mutex::new(Vec::new()),
            next_event: AtomicU64::new(0),
            progress: Mutex::new(()),
            progress_changed: Condvar::new(),
            published_events: AtomicU64::new(0),
            stats: InstanceStats::default(),
            triggers_started: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        });

        for trigger in schedule.triggers() {
            if let Err(err) = core.add_controller(trigger.identifier(), trigger.policy()) {
                core.shutdown();
                return Err(err);
            }
        }
        core.env
            .directory
            .insert(core.identifier.clone(), Arc::downgrade(&core));

        tracing::debug!(
            "instance {}: {} nodes, {} triggers",
            core.identifier,
            schedule.node_count(),
            schedule.triggers().len()
        );
        Ok(core)
    }

    fn add_controller(&self, identifier: &str, policy: SchedulingPolicy) -> Result<(), RuntimeError> {
        let Some(core) = self.self_ref.upgrade() else {
            return Err(ControlError::Stopped.into());
        };
        let (controller, queue) = TriggerController::new(identifier, policy);
        let worker = WorkerHandle::spawn(&core, Arc::clone(&controller), queue)?;
        self.workers.lock().push(worker);
        self.triggers
            .write()
            .insert(identifier.to_string(), controller);
        Ok(())
    }

    // --- Accessors ---

    pub fn identifier(&self) -> &CompositionIdentifier {
        &self.identifier
    }

    pub fn env(&self) -> &Arc<RuntimeEnv> {
        &self.env
    }

    pub fn telemetry(&self) -> &TelemetryEmitter {
        &self.telemetry
    }

    pub fn schedule(&self) -> Arc<GraphSchedule> {
        Arc::clone(&self.current.load().schedule)
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// `true` if no admitted firing is queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.triggers.read().values().all(|c| c.pending() == 0)
    }

    /// Firings so far in which an event reached a published output.
    pub fn published_event_count(&self) -> u64 {
        self.published_events.load(Ordering::Acquire)
    }

    // --- Lifecycle ---

    pub fn start(&self) -> Result<(), ControlError> {
        let _control = self.control.lock();
        match self.state() {
            LifecycleState::Constructed => {}
            LifecycleState::Running | LifecycleState::Paused => {
                return Err(ControlError::AlreadyStarted);
            }
            LifecycleState::Stopping | LifecycleState::Stopped => return Err(ControlError::Stopped),
            LifecycleState::Failed => return Err(ControlError::Failed),
        }
        self.set_state(LifecycleState::Running);
        self.start_triggers();
        tracing::debug!("instance {} started", self.identifier);
        Ok(())
    }

    pub fn start_paused(&self) -> Result<(), ControlError> {
        let _control = self.control.lock();
        match self.state() {
            LifecycleState::Constructed => {}
            LifecycleState::Running | LifecycleState::Paused => {
                return Err(ControlError::AlreadyStarted);
            }
            LifecycleState::Stopping | LifecycleState::Stopped => return Err(ControlError::Stopped),
            LifecycleState::Failed => return Err(ControlError::Failed),
        }
        self.set_state(LifecycleState::Paused);
        tracing::debug!("instance {} started paused", self.identifier);
        Ok(())
    }

    pub fn pause(&self) -> Result<(), ControlError> {
        let _control = self.control.lock();
        match self.state() {
            LifecycleState::Running => {}
            LifecycleState::Paused => return Ok(()),
            LifecycleState::Constructed => return Err(ControlError::NotStarted),
            LifecycleState::Stopping | LifecycleState::Stopped => return Err(ControlError::Stopped),
            LifecycleState::Failed => return Err(ControlError::Failed),
        }
        self.set_state(LifecycleState::Paused);
        self.stop_triggers();
        tracing::debug!("instance {} paused", self.identifier);
        Ok(())
    }

    pub fn unpause(&self) -> Result<(), ControlError> {
        let _control = self.control.lock();
        match self.state() {
            LifecycleState::Paused => {}
            LifecycleState::Running => return Ok(()),
            LifecycleState::Constructed => return Err(ControlError::NotStarted),
            LifecycleState::Stopping | LifecycleState::Stopped => return Err(ControlError::Stopped),
            LifecycleState::Failed => return Err(ControlError::Failed),
        }
        self.set_state(LifecycleState::Running);
        self.start_triggers();
        tracing::debug!("instance {} unpaused", self.identifier);
        Ok(())
    }

    fn start_triggers(&self) {
        let Some(core) = self.self_ref.upgrade() else {
            return;
        };
        let generation = self.current.load_full();
        self.triggers_started.store(true, Ordering::Release);
        for (node, slot) in generation.schedule.nodes().iter().zip(&generation.slots) {
            let handles = TriggerHandles::for_node(&core, &generation.schedule, node);
            slot.lock().behavior.start_triggers(&handles);
        }
    }

    fn stop_triggers(&self) {
        if !self.triggers_started.swap(false, Ordering::AcqRel) {
            return;
        }
        let generation = self.current.load_full();
        for slot in &generation.slots {
            slot.lock().behavior.stop_triggers();
        }
    }

    /// Stops admitting, drains workers, and finalizes every node. Idempotent.
    ///
    /// Firings already queued are discarded; the one in flight on each trigger
    /// runs to completion unless it outlives the stop timeout, in which case
    /// its worker is detached.
    pub fn shutdown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let _control = self.control.lock();

        for from in [
            LifecycleState::Constructed,
            LifecycleState::Running,
            LifecycleState::Paused,
        ] {
            if self.transition(from, LifecycleState::Stopping) {
                break;
            }
        }
        self.accepting.store(false, Ordering::Release);
        self.telemetry.stopping();

        self.stop_triggers();
        for controller in self.triggers.read().values() {
            controller.close();
        }

        let deadline = Instant::now() + self.env.config.stop_timeout();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.is_current() {
                continue;
            }
            worker.finish_by(deadline);
        }

        let generation = self.current.load_full();
        for (node, slot) in generation.schedule.nodes().iter().zip(&generation.slots) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match slot.try_lock_for(remaining) {
                Some(mut state) => state.behavior.fini(),
                None => tracing::warn!(
                    "instance {}: node {} still executing at stop deadline; skipping fini",
                    self.identifier,
                    node.name()
                ),
            }
        }

        self.env.directory.remove(&self.identifier);
        self.transition(LifecycleState::Stopping, LifecycleState::Stopped);
        tracing::debug!("instance {} {}", self.identifier, self.state());
        self.notify_progress();
    }

    /// Marks the instance failed and tears it down on a separate thread.
    pub fn fail(&self, message: &str) {
        loop {
            let state = self.state();
            if matches!(state, LifecycleState::Stopped | LifecycleState::Failed) {
                return;
            }
            if self.transition(state, LifecycleState::Failed) {
                break;
            }
        }
        tracing::error!("instance {} failed: {}", self.identifier, message);
        self.accepting.store(false, Ordering::Release);
        self.telemetry.error(message);
        self.notify_progress();

        if let Some(core) = self.self_ref.upgrade() {
            let spawned = std::thread::Builder::new()
                .name("sluice-teardown".to_string())
                .spawn(move || core.shutdown());
            if let Err(err) = spawned {
                tracing::error!("instance {}: teardown thread: {err}", self.identifier);
            }
        }
    }

    // --- Admission ---

    fn admission_gate(&self) -> Result<(), ControlError> {
        match self.state() {
            LifecycleState::Running => Ok(()),
            LifecycleState::Paused => Err(ControlError::Paused),
            LifecycleState::Constructed => Err(ControlError::NotStarted),
            LifecycleState::Stopping | LifecycleState::Stopped => Err(ControlError::Stopped),
            LifecycleState::Failed => Err(ControlError::Failed),
        }
    }

    fn next_event_id(&self) -> EventId {
        EventId(self.next_event.fetch_add(1, Ordering::AcqRel) + 1)
    }

    fn submit(
        &self,
        schedule: &Arc<GraphSchedule>,
        trigger: TriggerId,
        origins: Vec<(PortId, Option<PortValue>)>,
    ) -> Result<(Admission, Arc<TriggerController>), ControlError> {
        let identifier = schedule.trigger(trigger).identifier();
        let controller = self
            .triggers
            .read()
            .get(identifier)
            .cloned()
            .ok_or_else(|| ControlError::UnknownTrigger(identifier.to_string()))?;
        let admission = controller.request(self.next_event_id(), origins, Arc::clone(schedule))?;
        match admission {
            Admission::Admitted(_) => InstanceStats::bump(&self.stats.admitted),
            Admission::Queued(_) => {
                InstanceStats::bump(&self.stats.admitted);
                InstanceStats::bump(&self.stats.queued);
            }
            Admission::Dropped => {
                InstanceStats::bump(&self.stats.dropped);
                self.telemetry.event_dropped(identifier);
                tracing::trace!("instance {}: dropped firing of {}", self.identifier, identifier);
            }
        }
        Ok((admission, controller))
    }

    /// Requests a firing of trigger port `port_identifier`.
    pub fn request_port(
        &self,
        port_identifier: &str,
        value: Option<PortValue>,
    ) -> Result<(Admission, Arc<TriggerController>), ControlError> {
        self.admission_gate()?;
        let generation = self.current.load_full();
        let schedule = &generation.schedule;
        let port = schedule
            .port_by_identifier(port_identifier)
            .ok_or_else(|| ControlError::UnknownPort(port_identifier.to_string()))?;
        let trigger = schedule
            .trigger_of_port(port)
            .filter(|t| !schedule.trigger(*t).is_published())
            .ok_or_else(|| ControlError::UnknownTrigger(port_identifier.to_string()))?;
        self.submit(schedule, trigger, vec![(port, value)])
    }

    pub fn fire_port(
        &self,
        port_identifier: &str,
        value: Option<PortValue>,
    ) -> Result<Admission, ControlError> {
        self.request_port(port_identifier, value).map(|(a, _)| a)
    }

    /// Requests a firing of the published-input trigger from `inputs`, or
    /// from every published input if `inputs` is empty.
    pub fn request_published(
        &self,
        inputs: &[(&str, Option<PortValue>)],
    ) -> Result<(Admission, Arc<TriggerController>), ControlError> {
        self.admission_gate()?;
        let generation = self.current.load_full();
        let schedule = &generation.schedule;
        let trigger = schedule.published_input_trigger().ok_or_else(|| {
            let name = inputs.first().map_or("", |(n, _)| *n);
            ControlError::UnknownPublishedInput(name.to_string())
        })?;
        let origins = if inputs.is_empty() {
            schedule
                .published_inputs()
                .iter()
                .map(|p| (p.port(), None))
                .collect()
        } else {
            inputs
                .iter()
                .map(|(name, value)| {
                    schedule
                        .published_input(name)
                        .map(|p| (p.port(), value.clone()))
                        .ok_or_else(|| ControlError::UnknownPublishedInput((*name).to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        self.submit(schedule, trigger, origins)
    }

    fn spin_off(&self, schedule: &Arc<GraphSchedule>, port: PortId, value: PortValue) {
        let Some(trigger) = schedule.trigger_of_port(port) else {
            return;
        };
        let result = self
            .admission_gate()
            .and_then(|()| self.submit(schedule, trigger, vec![(port, Some(value))]));
        if let Err(err) = result {
            tracing::debug!(
                "instance {}: spin-off from {} rejected: {err}",
                self.identifier,
                schedule.port(port).identifier()
            );
        }
    }

    // --- Firing ---

    /// Runs one admitted firing. Called by the trigger's worker.
    pub fn run_firing(&self, controller: &TriggerController, firing: Firing) {
        let sequence = firing.event.sequence();
        let outcome = if self.accepting.load(Ordering::Acquire) {
            let _gate = self.gate.read();
            // A retired controller's queue belongs to the previous schedule.
            if controller.is_retired() {
                Ok(None)
            } else {
                let generation = self.current.load_full();
                self.propagate(&generation, controller.identifier(), firing)
            }
        } else {
            Ok(None)
        };
        match outcome {
            Ok(Some(report)) => self.record(&report),
            Ok(None) => InstanceStats::bump(&self.stats.discarded),
            Err(failure) => self.fail(&failure.to_string()),
        }
        controller.finish(sequence);
        self.notify_progress();
    }

    fn record(&self, report: &FiringReport) {
        InstanceStats::bump(&self.stats.completed);
        if report.any_published_output_event() {
            self.published_events.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn propagate(
        &self,
        generation: &Generation,
        trigger_identifier: &str,
        firing: Firing,
    ) -> Result<Option<FiringReport>, NodeFailure> {
        let schedule = &generation.schedule;
        let Some(trigger) = schedule.trigger_by_identifier(trigger_identifier) else {
            return Ok(None);
        };
        let origins = if Arc::ptr_eq(&firing.schedule, schedule) {
            firing.origins
        } else {
            // Admitted before a schedule replacement: re-resolve by identifier.
            firing
                .origins
                .into_iter()
                .filter_map(|(port, value)| {
                    let identifier = firing.schedule.port(port).identifier();
                    schedule
                        .port_by_identifier(identifier)
                        .filter(|p| schedule.trigger_of_port(*p) == Some(trigger))
                        .map(|p| (p, value))
                })
                .collect()
        };
        if origins.is_empty() {
            return Ok(None);
        }

        let propagator = Propagator {
            schedule,
            slots: &generation.slots,
            telemetry: &self.telemetry,
            stats: &self.stats,
        };
        let mut spin_off = |port: PortId, value: PortValue| self.spin_off(schedule, port, value);
        propagator
            .run(schedule.trigger(trigger), firing.event, &origins, &mut spin_off)
            .map(Some)
    }

    /// Fires published inputs and propagates on the calling thread.
    ///
    /// Used by subcomposition nodes. Returns each published output's value
    /// and whether an event reached it.
    pub fn fire_published_sync(
        &self,
        inputs: &[(&str, PortValue)],
    ) -> Result<Vec<(PortValue, bool)>, NodeError> {
        if self.state().is_terminal() {
            return Err(NodeError::Subcomposition {
                composition: self.identifier.to_string(),
                message: format!("composition is {}", self.state()),
            });
        }
        let _gate = self.gate.read();
        let generation = self.current.load_full();
        let schedule = &generation.schedule;

        let mut events = vec![false; schedule.published_outputs().len()];
        if let Some(trigger_id) = schedule.published_input_trigger() {
            let trigger = schedule.trigger(trigger_id);
            let origins: Vec<(PortId, Option<PortValue>)> = inputs
                .iter()
                .filter_map(|(name, value)| {
                    schedule
                        .published_input(name)
                        .map(|p| (p.port(), Some(value.clone())))
                })
                .collect();
            let controller = self.triggers.read().get(trigger.identifier()).cloned();
            let sequence = controller.as_ref().map_or(1, |c| c.next_sequence());
            let event = Event {
                id: self.next_event_id(),
                sequence,
            };
            InstanceStats::bump(&self.stats.admitted);

            let propagator = Propagator {
                schedule,
                slots: &generation.slots,
                telemetry: &self.telemetry,
                stats: &self.stats,
            };
            let mut spin_off = |port: PortId, value: PortValue| self.spin_off(schedule, port, value);
            let result = propagator.run(trigger, event, &origins, &mut spin_off);
            if let Some(controller) = &controller {
                controller.finish_inline(sequence);
            }
            match result {
                Ok(report) => {
                    self.record(&report);
                    events = report.published_output_events;
                }
                Err(failure) => {
                    let message = failure.to_string();
                    self.fail(&message);
                    return Err(NodeError::Subcomposition {
                        composition: self.identifier.to_string(),
                        message,
                    });
                }
            }
        }
        self.notify_progress();

        Ok(schedule
            .published_outputs()
            .iter()
            .zip(events)
            .map(|(published, event)| {
                (
                    read_port(schedule, &generation.slots, published.port()),
                    event,
                )
            })
            .collect())
    }

    // --- Waiting ---

    fn notify_progress(&self) {
        let _progress = self.progress.lock();
        self.progress_changed.notify_all();
    }

    /// Blocks until `done()` holds or `deadline` passes. Returns the final
    /// value of `done()`.
    pub fn wait_until(&self, mut done: impl FnMut() -> bool, deadline: Option<Instant>) -> bool {
        let mut progress = self.progress.lock();
        loop {
            if done() {
                return true;
            }
            match deadline {
                None => self.progress_changed.wait(&mut progress),
                Some(deadline) => {
                    if self
                        .progress_changed
                        .wait_until(&mut progress, deadline)
                        .timed_out()
                    {
                        return done();
                    }
                }
            }
        }
    }

    // --- Port values ---

    pub fn port_value(&self, identifier: &str) -> Result<PortValue, ControlError> {
        let generation = self.current.load_full();
        let port = generation
            .schedule
            .port_by_identifier(identifier)
            .ok_or_else(|| ControlError::UnknownPort(identifier.to_string()))?;
        Ok(read_port(&generation.schedule, &generation.slots, port))
    }

    /// Writes an input port's value without sending an event.
    pub fn set_port_value(&self, identifier: &str, value: PortValue) -> Result<(), ControlError> {
        let _gate = self.gate.read();
        let generation = self.current.load_full();
        let schedule = &generation.schedule;
        let port_id = schedule
            .port_by_identifier(identifier)
            .ok_or_else(|| ControlError::UnknownPort(identifier.to_string()))?;
        let port = schedule.port(port_id);
        if !port.is_input() {
            return Err(ControlError::NotAnInputPort(identifier.to_string()));
        }
        generation.slots[port.node().index() as usize].lock().inputs[port.slot()] = value.clone();
        self.telemetry
            .port_updated(port.identifier(), false, true, &value);
        Ok(())
    }

    pub fn published_output_value(&self, name: &str) -> Result<PortValue, ControlError> {
        let generation = self.current.load_full();
        let published = generation
            .schedule
            .published_output(name)
            .ok_or_else(|| ControlError::UnknownPublishedOutput(name.to_string()))?;
        Ok(read_port(&generation.schedule, &generation.slots, published.port()))
    }

    /// Stores a published input's value without firing.
    pub fn set_published_input_value(&self, name: &str, value: PortValue) -> Result<(), ControlError> {
        let _gate = self.gate.read();
        let generation = self.current.load_full();
        let schedule = &generation.schedule;
        let published = schedule
            .published_input(name)
            .ok_or_else(|| ControlError::UnknownPublishedInput(name.to_string()))?;
        let port = schedule.port(published.port());
        generation.slots[port.node().index() as usize].lock().outputs[port.slot()] = value;
        Ok(())
    }

    // --- Live editing ---

    /// Swaps in `schedule` between firings.
    ///
    /// Nodes that `diff` carries over (and whose class is unchanged) keep their
    /// behavior and port values; every other new node is instantiated, and
    /// every old node left behind is finalized.
    pub fn replace_schedule(
        &self,
        schedule: Arc<GraphSchedule>,
        diff: &ScheduleDiff,
    ) -> Result<(), RuntimeError> {
        let _control = self.control.lock();
        match self.state() {
            LifecycleState::Stopping | LifecycleState::Stopped => {
                return Err(ControlError::Stopped.into());
            }
            LifecycleState::Failed => return Err(ControlError::Failed.into()),
            _ => {}
        }
        let old = self.current.load_full();

        let mut carried_old = vec![false; old.schedule.node_count()];
        let mut carried_new = Vec::new();
        let mut renamed = Vec::new();
        let mut fresh = Vec::new();
        let mut slots: Vec<Arc<NodeSlot>> = Vec::with_capacity(schedule.node_count());
        for node in schedule.nodes() {
            let carried = diff
                .carried_from(node.name())
                .and_then(|name| old.schedule.node_by_name(name))
                .filter(|id| {
                    old.schedule.node(*id).class() == node.class() && !carried_old[id.index() as usize]
                });
            if let Some(old_id) = carried {
                carried_old[old_id.index() as usize] = true;
                carried_new.push(node.id());
                if old.schedule.node(old_id).name() != node.name() {
                    renamed.push(node.id());
                }
                slots.push(Arc::clone(&old.slots[old_id.index() as usize]));
                continue;
            }
            match instantiate(&self.identifier, &self.env, &schedule, node) {
                Ok(slot) => {
                    fresh.push(node.id());
                    slots.push(Arc::new(slot));
                }
                Err(err) => {
                    for id in &fresh {
                        slots[id.index() as usize].lock().behavior.fini();
                    }
                    return Err(err);
                }
            }
        }

        let _gate = self.gate.write();
        let started = self.triggers_started.load(Ordering::Acquire);

        for (old_node, slot) in old.schedule.nodes().iter().zip(&old.slots) {
            if carried_old[old_node.id().index() as usize] {
                continue;
            }
            let mut state = slot.lock();
            if started {
                state.behavior.stop_triggers();
            }
            state.behavior.fini();
        }
        if started {
            for id in &renamed {
                slots[id.index() as usize].lock().behavior.stop_triggers();
            }
        }
        for id in &carried_new {
            slots[id.index() as usize].conform(schedule.node(*id), &schedule);
        }

        self.current.store(Arc::new(Generation {
            schedule: Arc::clone(&schedule),
            slots,
        }));

        let wanted: HashMap<&str, SchedulingPolicy> = schedule
            .triggers()
            .iter()
            .map(|t| (t.identifier(), t.policy()))
            .collect();
        let missing: Vec<(&str, SchedulingPolicy)> = {
            let mut triggers = self.triggers.write();
            triggers.retain(|identifier, controller| {
                let keep = wanted.get(identifier.as_str()) == Some(&controller.policy());
                if !keep {
                    controller.retire();
                }
                keep
            });
            let mut missing = Vec::new();
            for (identifier, policy) in &wanted {
                if !triggers.contains_key(*identifier) {
                    missing.push((*identifier, *policy));
                }
            }
            missing
        };
        for (identifier, policy) in missing {
            self.add_controller(identifier, policy)?;
        }

        if started {
            if let Some(core) = self.self_ref.upgrade() {
                let generation = self.current.load_full();
                for id in fresh.iter().chain(&renamed) {
                    let node = schedule.node(*id);
                    let handles = TriggerHandles::for_node(&core, &schedule, node);
                    generation.slots[id.index() as usize]
                        .lock()
                        .behavior
                        .start_triggers(&handles);
                }
            }
        }

        tracing::info!(
            "instance {}: schedule replaced ({} carried, {} new)",
            self.identifier,
            carried_new.len(),
            fresh.len()
        );
        Ok(())
    }
}

fn instantiate(
    composition: &CompositionIdentifier,
    env: &Arc<RuntimeEnv>,
    schedule: &GraphSchedule,
    node: &Node,
) -> Result<NodeSlot, RuntimeError> {
    if node.is_published_inputs() {
        return Ok(NodeSlot::new(Box::new(PublishedInputs), node, schedule));
    }
    let class = env
        .resolver
        .resolve(node.class())
        .ok_or_else(|| RuntimeError::UnknownClass {
            node: node.name().to_string(),
            class: node.class().to_string(),
        })?;
    let ctx = InstantiateContext {
        node_name: node.name(),
        composition,
        env,
        schedule,
        node,
    };
    let behavior = class
        .instantiate(&ctx)
        .map_err(|source| RuntimeError::Instantiate {
            node: node.name().to_string(),
            source,
        })?;
    Ok(NodeSlot::new(behavior, node, schedule))
}

fn fini_all(slots: &[Arc<NodeSlot>]) {
    for slot in slots {
        slot.lock().behavior.fini();
    }
}

fn read_port(schedule: &GraphSchedule, slots: &[Arc<NodeSlot>], port: PortId) -> PortValue {
    let port = schedule.port(port);
    let state = slots[port.node().index() as usize].lock();
    if port.is_input() {
        state.inputs[port.slot()].clone()
    } else {
        state.outputs[port.slot()].clone()
    }
}
