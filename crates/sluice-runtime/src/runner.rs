//! Host-facing control surface.
//!
//! A [`Runner`] wraps a [`CompositionInstance`] with the conveniences a host
//! (CLI, editor, test) needs: waiting for the event it just fired, waiting for
//! output, addressing ports in nested compositions by identifier, JSON values,
//! and telemetry subscriptions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sluice_core::{CompositionIdentifier, GraphSchedule, PortValue, ScheduleDiff};

use crate::admission::TriggerController;
use crate::composition::CompositionInstance;
use crate::config::RuntimeConfig;
use crate::error::{ControlError, RuntimeError};
use crate::event::Admission;
use crate::instance::{InstanceCore, LifecycleState};
use crate::node::NodeClassResolver;
use crate::stats::StatsSnapshot;
use crate::telemetry::{SubscriptionKind, TelemetrySubscription};

/// Drives one top-level composition.
pub struct Runner {
    instance: CompositionInstance,
    last_fired: Mutex<Option<(Arc<TriggerController>, u64)>>,
    published_seen: AtomicU64,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Wraps an existing instance.
    pub fn new(instance: CompositionInstance) -> Self {
        Self {
            instance,
            last_fired: Mutex::new(None),
            published_seen: AtomicU64::new(0),
        }
    }

    /// Instantiates `schedule` as `Top` and wraps it.
    pub fn build(
        schedule: Arc<GraphSchedule>,
        resolver: Arc<dyn NodeClassResolver>,
        config: RuntimeConfig,
    ) -> Result<Self, RuntimeError> {
        CompositionInstance::new(schedule, resolver, config).map(Self::new)
    }

    /// The wrapped instance.
    pub fn instance(&self) -> &CompositionInstance {
        &self.instance
    }

    fn core(&self) -> &Arc<InstanceCore> {
        &self.instance.core
    }

    fn core_for(&self, composition: &CompositionIdentifier) -> Result<Arc<InstanceCore>, ControlError> {
        if composition == self.core().identifier() {
            return Ok(Arc::clone(self.core()));
        }
        self.core()
            .env()
            .directory
            .get(composition)
            .ok_or_else(|| ControlError::UnknownComposition(composition.to_string()))
    }

    // --- Lifecycle ---

    /// See [`CompositionInstance::start()`].
    pub fn start(&self) -> Result<(), ControlError> {
        self.instance.start()
    }

    /// See [`CompositionInstance::start_paused()`].
    pub fn start_paused(&self) -> Result<(), ControlError> {
        self.instance.start_paused()
    }

    /// See [`CompositionInstance::launch()`].
    pub fn launch(&self) -> Result<(), ControlError> {
        self.instance.launch()
    }

    /// See [`CompositionInstance::pause()`].
    pub fn pause(&self) -> Result<(), ControlError> {
        self.instance.pause()
    }

    /// See [`CompositionInstance::unpause()`].
    pub fn unpause(&self) -> Result<(), ControlError> {
        self.instance.unpause()
    }

    /// See [`CompositionInstance::stop()`].
    pub fn stop(&self) {
        self.instance.stop();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.instance.state()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.instance.stats()
    }

    /// See [`CompositionInstance::replace_schedule()`].
    pub fn replace_schedule(
        &self,
        schedule: Arc<GraphSchedule>,
        diff: &ScheduleDiff,
    ) -> Result<(), RuntimeError> {
        self.instance.replace_schedule(schedule, diff)
    }

    // --- Firing ---

    fn remember(&self, fired: (Admission, Arc<TriggerController>)) -> Admission {
        let (admission, controller) = fired;
        if let Some(event) = admission.event() {
            *self.last_fired.lock() = Some((controller, event.sequence()));
        }
        admission
    }

    /// Fires trigger port `port` with its current value.
    pub fn fire_trigger_port_event(&self, port: &str) -> Result<Admission, ControlError> {
        self.core()
            .request_port(port, None)
            .map(|fired| self.remember(fired))
    }

    /// Fires trigger port `port` carrying `value`.
    pub fn fire_trigger_port_event_with_value(
        &self,
        port: &str,
        value: PortValue,
    ) -> Result<Admission, ControlError> {
        self.core()
            .request_port(port, Some(value))
            .map(|fired| self.remember(fired))
    }

    /// Fires the named published inputs (all if `names` is empty) as one
    /// event.
    pub fn fire_published_input_event(&self, names: &[&str]) -> Result<Admission, ControlError> {
        let inputs: Vec<(&str, Option<PortValue>)> = names.iter().map(|n| (*n, None)).collect();
        self.core()
            .request_published(&inputs)
            .map(|fired| self.remember(fired))
    }

    /// Sets and fires published inputs as one event.
    pub fn fire_published_input_event_with_values(
        &self,
        values: &[(&str, PortValue)],
    ) -> Result<Admission, ControlError> {
        let inputs: Vec<(&str, Option<PortValue>)> = values
            .iter()
            .map(|(n, v)| (*n, Some(v.clone())))
            .collect();
        self.core()
            .request_published(&inputs)
            .map(|fired| self.remember(fired))
    }

    /// Blocks until the most recently fired event has finished propagating
    /// (or was discarded by a stop). Returns immediately if nothing was fired.
    pub fn wait_for_fired_event(&self) {
        self.wait_fired(None);
    }

    /// Like [`wait_for_fired_event()`](Self::wait_for_fired_event) with a
    /// timeout. Returns `false` if the event was still pending.
    pub fn wait_for_fired_event_timeout(&self, timeout: Duration) -> bool {
        self.wait_fired(Some(Instant::now() + timeout))
    }

    fn wait_fired(&self, deadline: Option<Instant>) -> bool {
        let Some((controller, sequence)) = self.last_fired.lock().clone() else {
            return true;
        };
        self.core()
            .wait_until(|| controller.completed() >= sequence, deadline)
    }

    /// Waits for a firing, not yet observed through this method, in which an
    /// event reached a published output. Returns `false` on timeout or once
    /// the composition has stopped.
    pub fn wait_for_published_output_event(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let seen = self.published_seen.load(Ordering::Acquire);
        let core = self.core();
        let arrived = core.wait_until(
            || core.published_event_count() > seen || core.state().is_terminal(),
            Some(deadline),
        );
        let count = core.published_event_count();
        self.published_seen.store(count, Ordering::Release);
        arrived && count > seen
    }

    // --- Port values ---

    /// Value of `port` in the composition `composition`.
    pub fn get_port_value(
        &self,
        composition: &CompositionIdentifier,
        port: &str,
    ) -> Result<PortValue, ControlError> {
        self.core_for(composition)?.port_value(port)
    }

    /// Value of `port` rendered as JSON.
    pub fn get_port_value_json(
        &self,
        composition: &CompositionIdentifier,
        port: &str,
    ) -> Result<String, ControlError> {
        let value = self.get_port_value(composition, port)?;
        serde_json::to_string(&value).map_err(|e| ControlError::InvalidValue {
            port: port.to_string(),
            message: e.to_string(),
        })
    }

    /// Sets input `port` in composition `composition` without firing.
    pub fn set_port_value(
        &self,
        composition: &CompositionIdentifier,
        port: &str,
        value: PortValue,
    ) -> Result<(), ControlError> {
        self.core_for(composition)?.set_port_value(port, value)
    }

    /// Parses `json` and sets input `port` without firing.
    pub fn set_port_value_json(
        &self,
        composition: &CompositionIdentifier,
        port: &str,
        json: &str,
    ) -> Result<(), ControlError> {
        let value: PortValue = serde_json::from_str(json).map_err(|e| ControlError::InvalidValue {
            port: port.to_string(),
            message: e.to_string(),
        })?;
        self.set_port_value(composition, port, value)
    }

    /// Value of published output `name` of the top-level composition.
    pub fn published_output_value(&self, name: &str) -> Result<PortValue, ControlError> {
        self.instance.published_output_value(name)
    }

    // --- Telemetry ---

    /// Every record from `scope` and below, without value summaries.
    pub fn subscribe_to_event_telemetry(&self, scope: &CompositionIdentifier) -> TelemetrySubscription {
        self.instance
            .telemetry()
            .subscribe(scope.clone(), SubscriptionKind::Events)
    }

    /// Updates of one port in `composition`, with value summaries.
    pub fn subscribe_to_port_telemetry(
        &self,
        composition: &CompositionIdentifier,
        port: &str,
    ) -> TelemetrySubscription {
        self.instance
            .telemetry()
            .subscribe(composition.clone(), SubscriptionKind::Port(port.to_string()))
    }

    /// Every record from `scope` and below, with value summaries.
    pub fn subscribe_to_all_telemetry(&self, scope: &CompositionIdentifier) -> TelemetrySubscription {
        self.instance
            .telemetry()
            .subscribe(scope.clone(), SubscriptionKind::All)
    }
}
