//! Compositions used as nodes.
//!
//! A [`SubcompositionClass`] turns a compiled schedule into a node class whose
//! inputs are the schedule's published inputs and whose outputs are its
//! published outputs. Each node of that class owns a child instance,
//! identified as `<parent>/<node name>`, sharing the parent's resolver,
//! telemetry hub, and instance directory.
//!
//! Executing the node fires the child's published inputs that received an
//! event and propagates through the child on the caller's thread, so the
//! parent firing continues only once the child firing is done. An event leaves
//! a published output only if it reached that output inside the child; the
//! node's inputs are doors for that reason.

use std::sync::Arc;

use sluice_core::{EventBlocking, GraphSchedule, PortDecl, PortValue};

use crate::error::NodeError;
use crate::instance::{InstanceCore, LifecycleState};
use crate::node::{
    InstantiateContext, NodeBehavior, NodeClass, NodeContext, NodeDescriptor, TriggerHandles,
};

/// Node class backed by a composition.
#[derive(Debug, Clone)]
pub struct SubcompositionClass {
    id: String,
    name: String,
    description: String,
    schedule: Arc<GraphSchedule>,
}

impl SubcompositionClass {
    /// Creates a class `id` from `schedule`. The display name defaults to the
    /// schedule's name.
    pub fn new(id: &str, schedule: Arc<GraphSchedule>) -> Self {
        Self {
            id: id.to_string(),
            name: schedule.name().to_string(),
            description: format!("Composition `{}` as a node", schedule.name()),
            schedule,
        }
    }

    /// Overrides the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// The composition this class instantiates.
    pub fn schedule(&self) -> &Arc<GraphSchedule> {
        &self.schedule
    }
}

impl NodeClass for SubcompositionClass {
    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            stateful: true,
        }
    }

    fn ports(&self) -> Vec<PortDecl> {
        let schedule = &self.schedule;
        let inputs = schedule.published_inputs().iter().map(|published| {
            let port = schedule.port(published.port());
            let decl = if port.is_data() {
                PortDecl::input(published.name())
            } else {
                PortDecl::event_input(published.name())
            };
            decl.with_blocking(EventBlocking::Door)
                .with_default(port.initial_value().clone())
        });
        let outputs = schedule.published_outputs().iter().map(|published| {
            if schedule.port(published.port()).is_data() {
                PortDecl::output(published.name())
            } else {
                PortDecl::event_output(published.name())
            }
        });
        inputs.chain(outputs).collect()
    }

    fn instantiate(&self, ctx: &InstantiateContext<'_>) -> Result<Box<dyn NodeBehavior>, NodeError> {
        let identifier = ctx.composition().child(ctx.node_name());
        let core = InstanceCore::create(identifier.clone(), Arc::clone(&self.schedule), Arc::clone(ctx.env))
            .map_err(|err| NodeError::Subcomposition {
                composition: identifier.to_string(),
                message: err.to_string(),
            })?;
        Ok(Box::new(SubcompositionNode {
            core,
            inputs: self
                .schedule
                .published_inputs()
                .iter()
                .map(|p| p.name().to_string())
                .collect(),
            outputs: self
                .schedule
                .published_outputs()
                .iter()
                .map(|p| p.name().to_string())
                .collect(),
        }))
    }
}

struct SubcompositionNode {
    core: Arc<InstanceCore>,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl SubcompositionNode {
    fn control_error(&self, err: &impl std::fmt::Display) -> NodeError {
        NodeError::Subcomposition {
            composition: self.core.identifier().to_string(),
            message: err.to_string(),
        }
    }
}

impl NodeBehavior for SubcompositionNode {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let mut fired: Vec<(&str, PortValue)> = Vec::new();
        for name in &self.inputs {
            let value = ctx.input(name)?.clone();
            if ctx.received_event(name) {
                fired.push((name.as_str(), value));
            } else {
                self.core
                    .set_published_input_value(name, value)
                    .map_err(|e| self.control_error(&e))?;
            }
        }

        let results = self.core.fire_published_sync(&fired)?;
        for (name, (value, event)) in self.outputs.iter().zip(results) {
            if event {
                ctx.set_output(name, value)?;
            } else {
                ctx.set_output_data(name, value)?;
            }
        }
        Ok(())
    }

    fn start_triggers(&mut self, _triggers: &TriggerHandles) {
        let result = match self.core.state() {
            LifecycleState::Constructed => self.core.start(),
            LifecycleState::Paused => self.core.unpause(),
            _ => Ok(()),
        };
        if let Err(err) = result {
            tracing::warn!("subcomposition {}: start: {err}", self.core.identifier());
        }
    }

    fn stop_triggers(&mut self) {
        if self.core.state() == LifecycleState::Running {
            if let Err(err) = self.core.pause() {
                tracing::warn!("subcomposition {}: pause: {err}", self.core.identifier());
            }
        }
    }

    fn fini(&mut self) {
        self.core.shutdown();
    }
}
