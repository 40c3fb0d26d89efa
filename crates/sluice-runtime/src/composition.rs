//! Public handle to a running composition.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sluice_core::{CompositionIdentifier, GraphSchedule, PortValue, ScheduleDiff};

use crate::config::RuntimeConfig;
use crate::error::{ControlError, RuntimeError};
use crate::event::Admission;
use crate::instance::{InstanceCore, LifecycleState, RuntimeEnv};
use crate::node::NodeClassResolver;
use crate::stats::StatsSnapshot;
use crate::telemetry::TelemetryHub;

/// A top-level composition instance.
///
/// Owns the node state and worker threads of one composition (and, through
/// subcomposition nodes, of every composition nested in it). Dropping the
/// instance stops it.
///
/// # Example
///
/// ```rust
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use sluice_core::{CompositionGraph, PortDecl, SchedulingPolicy};
/// use sluice_runtime::{CompositionInstance, NodeClass, RuntimeConfig};
///
/// let mut graph = CompositionGraph::new("Empty");
/// graph.add_published_input("go", false).unwrap();
/// let schedule = graph.compile().unwrap();
///
/// let classes: HashMap<String, Arc<dyn NodeClass>> = HashMap::new();
/// let instance =
///     CompositionInstance::new(schedule, Arc::new(classes), RuntimeConfig::default()).unwrap();
/// instance.start().unwrap();
/// assert!(instance.fire_published_inputs(&[]).unwrap().is_admitted());
/// instance.stop();
/// ```
pub struct CompositionInstance {
    pub(crate) core: Arc<InstanceCore>,
}

impl std::fmt::Debug for CompositionInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionInstance")
            .field("identifier", self.core.identifier())
            .field("state", &self.core.state())
            .finish()
    }
}

impl CompositionInstance {
    /// Instantiates `schedule` as the top-level composition `Top`.
    ///
    /// # Errors
    ///
    /// Fails if a node's class cannot be resolved or instantiated, or a
    /// worker thread cannot be spawned.
    pub fn new(
        schedule: Arc<GraphSchedule>,
        resolver: Arc<dyn NodeClassResolver>,
        config: RuntimeConfig,
    ) -> Result<Self, RuntimeError> {
        Self::with_identifier(CompositionIdentifier::top(), schedule, resolver, config)
    }

    /// Instantiates `schedule` under a custom top-level identifier.
    pub fn with_identifier(
        identifier: CompositionIdentifier,
        schedule: Arc<GraphSchedule>,
        resolver: Arc<dyn NodeClassResolver>,
        config: RuntimeConfig,
    ) -> Result<Self, RuntimeError> {
        let env = RuntimeEnv::new(resolver, config);
        let core = InstanceCore::create(identifier, schedule, env)?;
        Ok(Self { core })
    }

    /// Identifier of this (top-level) composition.
    pub fn identifier(&self) -> &CompositionIdentifier {
        self.core.identifier()
    }

    /// The schedule currently in effect.
    pub fn schedule(&self) -> Arc<GraphSchedule> {
        self.core.schedule()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.core.state()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats()
    }

    /// Configuration the instance was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.core.env().config
    }

    /// Telemetry hub shared by this composition tree.
    pub fn telemetry(&self) -> &Arc<TelemetryHub> {
        &self.core.env().hub
    }

    /// Identifiers of every live instance in this tree, sorted.
    pub fn instances(&self) -> Vec<CompositionIdentifier> {
        self.core.env().directory.identifiers()
    }

    // --- Lifecycle ---

    /// Starts trigger nodes and begins admitting firings.
    pub fn start(&self) -> Result<(), ControlError> {
        self.core.start()
    }

    /// Moves to `Paused` without starting trigger nodes.
    pub fn start_paused(&self) -> Result<(), ControlError> {
        self.core.start_paused()
    }

    /// Starts running or paused according to
    /// [`RuntimeConfig::start_paused`].
    pub fn launch(&self) -> Result<(), ControlError> {
        if self.config().start_paused {
            self.start_paused()
        } else {
            self.start()
        }
    }

    /// Stops trigger nodes and rejects new firings. Queued firings still run.
    pub fn pause(&self) -> Result<(), ControlError> {
        self.core.pause()
    }

    /// Restarts trigger nodes and resumes admitting firings.
    pub fn unpause(&self) -> Result<(), ControlError> {
        self.core.unpause()
    }

    /// Stops the composition. Idempotent.
    pub fn stop(&self) {
        self.core.shutdown();
    }

    // --- Firing ---

    /// Fires trigger port `port` (`Node:port`). `None` keeps the port's value.
    pub fn fire_trigger(&self, port: &str, value: Option<PortValue>) -> Result<Admission, ControlError> {
        self.core.fire_port(port, value)
    }

    /// Fires the named published inputs (all of them if `inputs` is empty) as
    /// one event.
    pub fn fire_published_inputs(
        &self,
        inputs: &[(&str, Option<PortValue>)],
    ) -> Result<Admission, ControlError> {
        self.core.request_published(inputs).map(|(a, _)| a)
    }

    /// Waits until no firing is queued or in flight.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.core.wait_until(|| self.core.is_idle(), Some(deadline))
    }

    // --- Port values ---

    /// Current value of port `port` (`Node:port`).
    pub fn port_value(&self, port: &str) -> Result<PortValue, ControlError> {
        self.core.port_value(port)
    }

    /// Sets an input port's value without firing.
    pub fn set_port_value(&self, port: &str, value: PortValue) -> Result<(), ControlError> {
        self.core.set_port_value(port, value)
    }

    /// Current value of published output `name`.
    pub fn published_output_value(&self, name: &str) -> Result<PortValue, ControlError> {
        self.core.published_output_value(name)
    }

    /// Sets published input `name` without firing.
    pub fn set_published_input_value(&self, name: &str, value: PortValue) -> Result<(), ControlError> {
        self.core.set_published_input_value(name, value)
    }

    // --- Live editing ---

    /// Replaces the schedule between firings, carrying over node state for
    /// the nodes `diff` maps.
    pub fn replace_schedule(
        &self,
        schedule: Arc<GraphSchedule>,
        diff: &ScheduleDiff,
    ) -> Result<(), RuntimeError> {
        self.core.replace_schedule(schedule, diff)
    }
}

impl Drop for CompositionInstance {
    fn drop(&mut self) {
        self.core.shutdown();
    }
}
