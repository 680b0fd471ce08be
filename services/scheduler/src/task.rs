//! Work units submitted to the scheduler.

use fcas_id::TaskId;
use serde::{Deserialize, Serialize};

use crate::catalog::ContainerType;

/// A unit of work that needs one container of a specific type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    container_type: ContainerType,
}

impl Task {
    pub fn new(id: TaskId, container_type: ContainerType) -> Self {
        Self { id, container_type }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn container_type(&self) -> ContainerType {
        self.container_type
    }
}
