//! Per-host ledger of free memory and owned containers.
//!
//! A node only keeps its own books. Inventory counters and the deletion
//! hook live in the tracker, which is the only caller of the mutating
//! methods here.

use std::collections::BTreeMap;

use fcas_id::{ContainerId, NodeId};

use crate::catalog::ContainerType;
use crate::container::{Container, ContainerState};
use crate::error::{FleetError, FleetResult};

/// A host with fixed memory capacity.
///
/// Invariant: `free_memory + sum(memory_used) == capacity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    capacity: u64,
    free_memory: u64,
    containers: BTreeMap<ContainerId, Container>,
}

impl Node {
    pub fn new(id: NodeId, capacity: u64) -> Self {
        Self {
            id,
            capacity,
            free_memory: capacity,
            containers: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn free_memory(&self) -> u64 {
        self.free_memory
    }

    pub fn used_memory(&self) -> u64 {
        self.containers.values().map(Container::memory_used).sum()
    }

    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(&id)
    }

    /// Owned containers in ascending id order.
    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    /// Paused containers of `ty` in ascending id order.
    pub fn paused_of_type(&self, ty: ContainerType) -> impl Iterator<Item = &Container> {
        self.containers
            .values()
            .filter(move |c| c.is_paused() && c.container_type() == ty)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Whether the memory ledger balances against capacity.
    pub fn is_balanced(&self) -> bool {
        self.free_memory
            .checked_add(self.used_memory())
            .is_some_and(|total| total == self.capacity)
    }

    /// Take ownership of a paused container, reserving its footprint.
    pub(crate) fn create_container(&mut self, container: Container) -> FleetResult<()> {
        if !container.is_paused() {
            return Err(FleetError::InvalidTransition {
                container_id: container.id(),
                from: container.state(),
                to: ContainerState::Paused,
            });
        }

        let required = container.memory_used();
        let Some(free_after) = self.free_memory.checked_sub(required) else {
            return Err(FleetError::InsufficientMemory {
                node_id: self.id,
                required,
                free: self.free_memory,
            });
        };

        self.free_memory = free_after;
        self.containers.insert(container.id(), container);
        Ok(())
    }

    /// Remove a paused container and release its memory.
    ///
    /// The returned container is in the terminal `Deleted` state.
    pub(crate) fn delete_container(&mut self, id: ContainerId) -> FleetResult<Container> {
        let container = self.container_mut(id)?;
        let released = container.delete()?;

        let container = self
            .containers
            .remove(&id)
            .ok_or(FleetError::UnknownContainer {
                node_id: self.id,
                container_id: id,
            })?;
        self.free_memory += released;
        Ok(container)
    }

    /// `Paused -> Running`; the memory is already reserved.
    pub(crate) fn reuse_container(&mut self, id: ContainerId) -> FleetResult<&Container> {
        let container = self.container_mut(id)?;
        container.reuse()?;
        Ok(container)
    }

    /// `Running -> Paused`.
    pub(crate) fn stop_container(&mut self, id: ContainerId) -> FleetResult<&Container> {
        let container = self.container_mut(id)?;
        container.stop()?;
        Ok(container)
    }

    fn container_mut(&mut self, id: ContainerId) -> FleetResult<&mut Container> {
        let node_id = self.id;
        self.containers
            .get_mut(&id)
            .ok_or(FleetError::UnknownContainer {
                node_id,
                container_id: id,
            })
    }
}
