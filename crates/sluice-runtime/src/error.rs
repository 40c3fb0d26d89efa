//! Error types for the composition runtime.
//!
//! Three kinds of failure are kept apart:
//!
//! - [`NodeError`]: raised by a node's transfer function. Fatal to the
//!   composition instance that owns the node.
//! - [`ControlError`]: a rejected control request (unknown port, firing a
//!   stopped composition, ...). Returned to the caller; the composition keeps
//!   running.
//! - [`RuntimeError`]: an instance could not be built or its schedule could
//!   not be replaced.

use sluice_core::GraphError;
use thiserror::Error;

/// Failure inside a node's transfer function or lifecycle hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// Free-form failure reported by the node.
    #[error("{0}")]
    Failed(String),

    /// The node asked for a port it does not have.
    #[error("no port named `{0}`")]
    UnknownPort(String),

    /// A port held a value of the wrong type.
    #[error("port `{port}` expects {expected}, got {found}")]
    TypeMismatch {
        /// Port name.
        port: String,
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        found: &'static str,
    },

    /// Execution may not emit on a trigger port, and only trigger ports can
    /// spin off.
    #[error("port `{0}` cannot be used that way from execute (trigger mismatch)")]
    TriggerMismatch(String),

    /// A nested composition failed or refused the firing.
    #[error("subcomposition `{composition}` failed: {message}")]
    Subcomposition {
        /// Identifier of the nested composition.
        composition: String,
        /// What went wrong inside it.
        message: String,
    },
}

impl NodeError {
    /// Creates a [`NodeError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Creates a [`NodeError::TypeMismatch`].
    pub fn type_mismatch(port: &str, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            port: port.to_string(),
            expected,
            found,
        }
    }
}

/// A control request the composition rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// No running instance has this identifier.
    #[error("unknown composition `{0}`")]
    UnknownComposition(String),

    /// No port has this identifier.
    #[error("unknown port `{0}`")]
    UnknownPort(String),

    /// The port exists but is not a trigger.
    #[error("`{0}` is not a trigger port")]
    UnknownTrigger(String),

    /// No published input has this name.
    #[error("unknown published input `{0}`")]
    UnknownPublishedInput(String),

    /// No published output has this name.
    #[error("unknown published output `{0}`")]
    UnknownPublishedOutput(String),

    /// Values can only be set on input ports.
    #[error("port `{0}` is not an input port")]
    NotAnInputPort(String),

    /// The value could not be parsed.
    #[error("invalid value for `{port}`: {message}")]
    InvalidValue {
        /// Port identifier.
        port: String,
        /// Parser message.
        message: String,
    },

    /// `start()` has not been called yet.
    #[error("composition has not been started")]
    NotStarted,

    /// `start()` was called twice.
    #[error("composition has already been started")]
    AlreadyStarted,

    /// The composition is paused; firings are not admitted.
    #[error("composition is paused")]
    Paused,

    /// The composition is stopping or stopped.
    #[error("composition is stopped")]
    Stopped,

    /// A node failed and the composition shut down.
    #[error("composition failed")]
    Failed,
}

/// Errors raised while constructing an instance or replacing its schedule.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The resolver has no node class with this id.
    #[error("node `{node}` uses unknown class `{class}`")]
    UnknownClass {
        /// Node name.
        node: String,
        /// Class id.
        class: String,
    },

    /// A node class failed to create its behavior.
    #[error("failed to instantiate node `{node}`: {source}")]
    Instantiate {
        /// Node name.
        node: String,
        /// Underlying node error.
        #[source]
        source: NodeError,
    },

    /// The graph did not compile.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The instance rejected the request.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_error_display() {
        assert_eq!(NodeError::failed("boom").to_string(), "boom");
        assert_eq!(
            NodeError::type_mismatch("seconds", "real", "text").to_string(),
            "port `seconds` expects real, got text"
        );
    }

    #[test]
    fn test_runtime_error_source_chain() {
        let err = RuntimeError::Instantiate {
            node: "Count".into(),
            source: NodeError::failed("no memory"),
        };
        assert_eq!(
            err.to_string(),
            "failed to instantiate node `Count`: no memory"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_control_error_from() {
        let err: RuntimeError = ControlError::Stopped.into();
        assert!(matches!(err, RuntimeError::Control(ControlError::Stopped)));
    }
}
