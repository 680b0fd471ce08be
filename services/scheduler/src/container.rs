//! Container lifecycle entity.
//!
//! A container is a unit of pre-provisioned capacity of a fixed type. It
//! reserves its footprint on the owning node for its whole life, whether
//! idle (`Paused`) or executing a task (`Running`). `Deleted` is terminal.

use chrono::{DateTime, Utc};
use fcas_id::ContainerId;
use serde::{Deserialize, Serialize};

use crate::catalog::ContainerType;
use crate::error::{FleetError, FleetResult};

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    /// Idle, memory reserved, ready for reuse.
    Paused,
    /// Executing a task.
    Running,
    /// Removed from its node; never valid again.
    Deleted,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerState::Paused => write!(f, "paused"),
            ContainerState::Running => write!(f, "running"),
            ContainerState::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    id: ContainerId,
    container_type: ContainerType,
    state: ContainerState,
    memory_used: u64,
    start_time: DateTime<Utc>,
}

impl Container {
    /// A fresh container starts paused.
    pub fn new(id: ContainerId, container_type: ContainerType, memory_used: u64) -> Self {
        Self {
            id,
            container_type,
            state: ContainerState::Paused,
            memory_used,
            start_time: Utc::now(),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn container_type(&self) -> ContainerType {
        self.container_type
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    pub fn memory_used(&self) -> u64 {
        self.memory_used
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn is_paused(&self) -> bool {
        self.state == ContainerState::Paused
    }

    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }

    /// `Paused -> Running`.
    pub(crate) fn reuse(&mut self) -> FleetResult<()> {
        self.transition(ContainerState::Paused, ContainerState::Running)
    }

    /// `Running -> Paused`.
    pub(crate) fn stop(&mut self) -> FleetResult<()> {
        self.transition(ContainerState::Running, ContainerState::Paused)
    }

    /// `Paused -> Deleted`. Returns the memory to hand back to the node.
    pub(crate) fn delete(&mut self) -> FleetResult<u64> {
        self.transition(ContainerState::Paused, ContainerState::Deleted)?;
        Ok(self.memory_used)
    }

    fn transition(&mut self, from: ContainerState, to: ContainerState) -> FleetResult<()> {
        if self.state != from {
            return Err(FleetError::InvalidTransition {
                container_id: self.id,
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn container() -> Container {
        Container::new(ContainerId::new(1), ContainerType::new(0), 1024)
    }

    #[test]
    fn test_new_container_is_paused() {
        let c = container();
        assert!(c.is_paused());
        assert_eq!(c.memory_used(), 1024);
    }

    #[test]
    fn test_reuse_then_stop() {
        let mut c = container();
        c.reuse().unwrap();
        assert!(c.is_running());
        c.stop().unwrap();
        assert!(c.is_paused());
    }

    #[test]
    fn test_delete_returns_memory() {
        let mut c = container();
        assert_eq!(c.delete().unwrap(), 1024);
        assert_eq!(c.state(), ContainerState::Deleted);
    }

    #[rstest]
    #[case::stop_paused(ContainerState::Paused, |c: &mut Container| c.stop())]
    #[case::reuse_running(ContainerState::Running, |c: &mut Container| c.reuse())]
    #[case::delete_running(ContainerState::Running, |c: &mut Container| c.delete().map(|_| ()))]
    #[case::reuse_deleted(ContainerState::Deleted, |c: &mut Container| c.reuse())]
    #[case::stop_deleted(ContainerState::Deleted, |c: &mut Container| c.stop())]
    fn test_invalid_transitions(
        #[case] start: ContainerState,
        #[case] op: fn(&mut Container) -> FleetResult<()>,
    ) {
        let mut c = container();
        c.state = start;
        let err = op(&mut c).unwrap_err();
        assert!(matches!(err, FleetError::InvalidTransition { from, .. } if from == start));
        assert_eq!(c.state(), start);
    }
}
