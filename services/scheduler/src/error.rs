//! Error types for fleet bookkeeping and scheduling.

use fcas_id::{ContainerId, NodeId};
use thiserror::Error;

use crate::catalog::ContainerType;
use crate::container::ContainerState;

/// Result type for fleet operations.
pub type FleetResult<T> = Result<T, FleetError>;

/// Which inventory a counter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryScope {
    /// The per-(node, type) record.
    Node(NodeId),
    /// The fleet-wide per-type aggregate.
    Fleet,
}

impl std::fmt::Display for InventoryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryScope::Node(id) => write!(f, "{id}"),
            InventoryScope::Fleet => write!(f, "fleet"),
        }
    }
}

/// The counter a mutation would have driven below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Paused,
    Running,
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Counter::Paused => write!(f, "paused"),
            Counter::Running => write!(f, "running"),
        }
    }
}

/// Errors raised by the tracker, node ledgers, and the scheduler.
///
/// Running out of capacity is not an error; such tasks are queued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FleetError {
    /// A counter mutation would go below zero.
    #[error("state inconsistency in {scope} for type {container_type}: cannot {operation} with {counter} count at zero")]
    StateInconsistency {
        scope: InventoryScope,
        container_type: ContainerType,
        counter: Counter,
        operation: &'static str,
    },

    /// The node is not registered.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// The node does not own the container.
    #[error("unknown container {container_id} on {node_id}")]
    UnknownContainer {
        node_id: NodeId,
        container_id: ContainerId,
    },

    /// The container type is not in the catalog.
    #[error("unknown container type: {0}")]
    UnknownContainerType(ContainerType),

    /// A container was about to be placed on a node without room for it.
    #[error("insufficient memory on {node_id}: need {required} MB, {free} MB free")]
    InsufficientMemory {
        node_id: NodeId,
        required: u64,
        free: u64,
    },

    /// A node was unregistered while it still owned containers.
    #[error("{node_id} still owns {containers} container(s)")]
    NodeNotDrained { node_id: NodeId, containers: usize },

    /// The node id is already registered.
    #[error("node already registered: {0}")]
    DuplicateNode(NodeId),

    /// The container is not in a state that allows the transition.
    #[error("container {container_id} cannot move from {from} to {to}")]
    InvalidTransition {
        container_id: ContainerId,
        from: ContainerState,
        to: ContainerState,
    },
}

impl FleetError {
    /// Returns true for counter and lifecycle-state violations.
    pub fn is_state_inconsistency(&self) -> bool {
        matches!(
            self,
            FleetError::StateInconsistency { .. } | FleetError::InvalidTransition { .. }
        )
    }

    /// Returns true if the error references an absent node, container, or type.
    pub fn is_unknown_entity(&self) -> bool {
        matches!(
            self,
            FleetError::UnknownNode(_)
                | FleetError::UnknownContainer { .. }
                | FleetError::UnknownContainerType(_)
        )
    }
}

/// A broken fleet invariant, found by [`crate::tracker::Fleet::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fleet invariant violated: {0}")]
pub struct InvariantViolation(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_inconsistency_message() {
        let err = FleetError::StateInconsistency {
            scope: InventoryScope::Node(NodeId::new(2)),
            container_type: ContainerType::new(1),
            counter: Counter::Running,
            operation: "stop",
        };
        assert_eq!(
            err.to_string(),
            "state inconsistency in node_2 for type 1: cannot stop with running count at zero"
        );
        assert!(err.is_state_inconsistency());
        assert!(!err.is_unknown_entity());
    }

    #[test]
    fn test_unknown_entity_classification() {
        assert!(FleetError::UnknownNode(NodeId::new(1)).is_unknown_entity());
        assert!(FleetError::UnknownContainerType(ContainerType::new(9)).is_unknown_entity());
        assert!(!FleetError::DuplicateNode(NodeId::new(1)).is_unknown_entity());
    }
}
