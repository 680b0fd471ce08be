//! Typed ID definitions for scheduler entities.

use crate::define_id;

define_id!(
    /// A host in the fleet.
    NodeId,
    "node"
);

define_id!(
    /// A container owned by exactly one node.
    ContainerId,
    "ctr"
);

define_id!(
    /// A unit of work submitted to the scheduler.
    TaskId,
    "task"
);
