//! Node class registry and built-in node library for sluice.
//!
//! This crate provides a central registry for discovering node classes by
//! identifier. It implements [`NodeClassResolver`], so a registry can be
//! handed to a composition instance directly, and it carries the category
//! metadata used to list classes in tools.
//!
//! # Features
//!
//! - **Class Discovery**: list every registered class with its descriptor
//! - **Factory Pattern**: resolve a class by id and instantiate it at runtime
//! - **Category System**: classes organized by role (triggers, logic, math, flow)
//! - **Extensible**: register subcomposition classes or custom classes
//!   alongside the built-ins
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sluice_core::CompositionGraph;
//! use sluice_nodes::{NodeCategory, NodeRegistry};
//! use sluice_runtime::{NodeClassResolver, Runner, RuntimeConfig};
//!
//! let registry = NodeRegistry::new();
//! for class in registry.classes_in_category(NodeCategory::Trigger) {
//!     println!("{}: {}", class.id, class.description);
//! }
//!
//! let mut graph = CompositionGraph::new("Example");
//! let fire = registry.resolve("fire_on_request").unwrap();
//! let node = graph.add_node("Fire", "fire_on_request", false, &fire.ports()).unwrap();
//! let runner = Runner::build(graph.compile().unwrap(), Arc::new(registry), RuntimeConfig::default()).unwrap();
//! runner.start().unwrap();
//! runner.fire_trigger_port_event("Fire:fired").unwrap();
//! runner.wait_for_fired_event();
//! # let _ = node;
//! ```

mod flow;
mod logic;
mod math;
mod triggers;

use std::sync::Arc;

use sluice_core::PortDecl;
use sluice_runtime::{
    InstantiateContext, NodeBehavior, NodeClass, NodeClassResolver, NodeDescriptor, NodeError,
};

/// Category of node class for organization and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Sources of firings (start, request, timer)
    Trigger,
    /// Doors and walls that decide whether an event continues
    Logic,
    /// Counting and arithmetic
    Math,
    /// Pass-through, spin-off, delays, and diagnostics
    Flow,
    /// Compositions used as nodes
    Composition,
}

impl NodeCategory {
    /// Every category, in listing order.
    pub const ALL: [NodeCategory; 5] = [
        NodeCategory::Trigger,
        NodeCategory::Logic,
        NodeCategory::Math,
        NodeCategory::Flow,
        NodeCategory::Composition,
    ];

    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            NodeCategory::Trigger => "Trigger",
            NodeCategory::Logic => "Logic",
            NodeCategory::Math => "Math",
            NodeCategory::Flow => "Flow",
            NodeCategory::Composition => "Composition",
        }
    }

    /// Returns a description of the category.
    pub const fn description(&self) -> &'static str {
        match self {
            NodeCategory::Trigger => "Nodes that start firings on their own or on request",
            NodeCategory::Logic => "Doors and walls that decide whether an event continues",
            NodeCategory::Math => "Counters and arithmetic",
            NodeCategory::Flow => "Pass-through, spin-off, waiting, and logging",
            NodeCategory::Composition => "Compositions registered as node classes",
        }
    }

    /// Parses a category name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// Factory function type for creating node behaviors.
type BehaviorFactory = fn(&InstantiateContext<'_>) -> Box<dyn NodeBehavior>;

/// A node class implemented in this crate.
struct BuiltinClass {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    stateful: bool,
    ports: fn() -> Vec<PortDecl>,
    factory: BehaviorFactory,
}

impl NodeClass for BuiltinClass {
    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            stateful: self.stateful,
        }
    }

    fn ports(&self) -> Vec<PortDecl> {
        (self.ports)()
    }

    fn instantiate(&self, ctx: &InstantiateContext<'_>) -> Result<Box<dyn NodeBehavior>, NodeError> {
        Ok((self.factory)(ctx))
    }
}

/// Internal entry in the registry.
#[derive(Clone)]
struct RegistryEntry {
    descriptor: NodeDescriptor,
    category: NodeCategory,
    class: Arc<dyn NodeClass>,
}

/// Registry of node classes.
///
/// All built-in classes are registered by [`NodeRegistry::new`]. Cloning is
/// cheap; classes are shared.
#[derive(Clone)]
pub struct NodeRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.descriptor.id))
            .finish()
    }
}

impl NodeRegistry {
    /// Create a new registry with all built-in classes registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtin_classes();
        registry
    }

    /// Create a registry without any classes.
    pub fn empty() -> Self {
        Self {
            entries: Vec::with_capacity(16),
        }
    }

    /// Register all built-in classes.
    fn register_builtin_classes(&mut self) {
        // Triggers
        self.register_builtin(
            NodeCategory::Trigger,
            BuiltinClass {
                id: "fire_on_start",
                name: "Fire on Start",
                description: "Fires once when the composition starts",
                stateful: true,
                ports: triggers::fire_on_start_ports,
                factory: triggers::fire_on_start,
            },
        );
        self.register_builtin(
            NodeCategory::Trigger,
            BuiltinClass {
                id: "fire_on_request",
                name: "Fire on Request",
                description: "Fires when a control request fires its trigger port",
                stateful: false,
                ports: triggers::fire_on_request_ports,
                factory: triggers::fire_on_request,
            },
        );
        self.register_builtin(
            NodeCategory::Trigger,
            BuiltinClass {
                id: "fire_periodically",
                name: "Fire Periodically",
                description: "Fires every `seconds` with the elapsed time; drops firings while busy",
                stateful: true,
                ports: triggers::fire_periodically_ports,
                factory: triggers::fire_periodically,
            },
        );

        // Logic
        self.register_builtin(
            NodeCategory::Logic,
            BuiltinClass {
                id: "allow_alternating",
                name: "Allow Alternating Events",
                description: "Lets every other event through, starting with the first",
                stateful: true,
                ports: logic::allow_alternating_ports,
                factory: logic::allow_alternating,
            },
        );
        self.register_builtin(
            NodeCategory::Logic,
            BuiltinClass {
                id: "allow_first",
                name: "Allow First Event",
                description: "Lets only the first event through until reset",
                stateful: true,
                ports: logic::allow_first_ports,
                factory: logic::allow_first,
            },
        );
        self.register_builtin(
            NodeCategory::Logic,
            BuiltinClass {
                id: "hold_value",
                name: "Hold Value",
                description: "Stores a value without passing its event; refresh sends it",
                stateful: false,
                ports: logic::hold_value_ports,
                factory: logic::hold_value,
            },
        );

        // Math
        self.register_builtin(
            NodeCategory::Math,
            BuiltinClass {
                id: "count",
                name: "Count",
                description: "Running total adjusted by increment and decrement events",
                stateful: true,
                ports: math::count_ports,
                factory: math::count,
            },
        );
        self.register_builtin(
            NodeCategory::Math,
            BuiltinClass {
                id: "add",
                name: "Add",
                description: "Sum of two numbers",
                stateful: false,
                ports: math::add_ports,
                factory: math::add,
            },
        );

        // Flow
        self.register_builtin(
            NodeCategory::Flow,
            BuiltinClass {
                id: "share_value",
                name: "Share Value",
                description: "Passes its input value and event through unchanged",
                stateful: false,
                ports: flow::share_value_ports,
                factory: flow::share_value,
            },
        );
        self.register_builtin(
            NodeCategory::Flow,
            BuiltinClass {
                id: "spin_off_value",
                name: "Spin Off Value",
                description: "Re-fires each received value as an independent firing",
                stateful: false,
                ports: flow::spin_off_value_ports,
                factory: flow::spin_off_value,
            },
        );
        self.register_builtin(
            NodeCategory::Flow,
            BuiltinClass {
                id: "wait",
                name: "Wait",
                description: "Holds the firing for a number of milliseconds",
                stateful: false,
                ports: flow::wait_ports,
                factory: flow::wait,
            },
        );
        self.register_builtin(
            NodeCategory::Flow,
            BuiltinClass {
                id: "fail_on",
                name: "Fail On",
                description: "Passes values through; fails the composition on the failing value",
                stateful: false,
                ports: flow::fail_on_ports,
                factory: flow::fail_on,
            },
        );
        self.register_builtin(
            NodeCategory::Flow,
            BuiltinClass {
                id: "log_value",
                name: "Log Value",
                description: "Logs each received value",
                stateful: false,
                ports: flow::log_value_ports,
                factory: flow::log_value,
            },
        );
    }

    fn register_builtin(&mut self, category: NodeCategory, class: BuiltinClass) {
        self.register(category, Arc::new(class));
    }

    /// Register a class, replacing any class with the same id.
    pub fn register(&mut self, category: NodeCategory, class: Arc<dyn NodeClass>) {
        let descriptor = class.descriptor();
        let entry = RegistryEntry {
            descriptor,
            category,
            class,
        };
        match self
            .entries
            .iter_mut()
            .find(|e| e.descriptor.id == entry.descriptor.id)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Returns descriptors for all registered classes.
    pub fn all_classes(&self) -> Vec<&NodeDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Returns descriptors for classes in a specific category.
    pub fn classes_in_category(&self, category: NodeCategory) -> Vec<&NodeDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.category == category)
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Get a descriptor by class id.
    pub fn get(&self, id: &str) -> Option<&NodeDescriptor> {
        self.entry(id).map(|e| &e.descriptor)
    }

    /// Category of class `id`.
    pub fn category(&self, id: &str) -> Option<NodeCategory> {
        self.entry(id).map(|e| e.category)
    }

    /// Port declarations of class `id`.
    pub fn ports(&self, id: &str) -> Option<Vec<PortDecl>> {
        self.entry(id).map(|e| e.class.ports())
    }

    /// Returns the number of registered classes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no classes are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.descriptor.id == id)
    }
}

impl NodeClassResolver for NodeRegistry {
    fn resolve(&self, id: &str) -> Option<Arc<dyn NodeClass>> {
        self.entry(id).map(|e| Arc::clone(&e.class))
    }
}
