//! Fleet-wide source of truth for inventory.
//!
//! The tracker owns every node ledger together with the per-(node, type)
//! paused/running counters and their fleet-wide aggregate. All of it sits
//! behind a single lock, so each lifecycle operation (ledger change plus
//! counter change) is applied as one atomic step.
//!
//! Counter updates are validated before anything is written: an operation
//! that would drive a counter below zero fails with
//! [`FleetError::StateInconsistency`] and leaves no visible effect.

use std::collections::BTreeMap;
use std::sync::Arc;

use fcas_id::{ContainerId, IdSequence, NodeId};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{Catalog, ContainerType};
use crate::container::Container;
use crate::error::{Counter, FleetError, FleetResult, InvariantViolation, InventoryScope};
use crate::node::Node;
use crate::reporter::Reporter;

/// Paused and running counts for one container type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub paused: u32,
    pub running: u32,
}

impl TypeCounts {
    pub fn total(&self) -> u32 {
        self.paused + self.running
    }

    fn is_zero(&self) -> bool {
        self.paused == 0 && self.running == 0
    }
}

/// A counter movement caused by one lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CounterEvent {
    Created,
    Deleted,
    Reused,
    Stopped,
}

impl CounterEvent {
    fn apply(self, counts: TypeCounts) -> Option<TypeCounts> {
        match self {
            CounterEvent::Created => Some(TypeCounts {
                paused: counts.paused.checked_add(1)?,
                ..counts
            }),
            CounterEvent::Deleted => Some(TypeCounts {
                paused: counts.paused.checked_sub(1)?,
                ..counts
            }),
            CounterEvent::Reused => Some(TypeCounts {
                paused: counts.paused.checked_sub(1)?,
                running: counts.running.checked_add(1)?,
            }),
            CounterEvent::Stopped => Some(TypeCounts {
                paused: counts.paused.checked_add(1)?,
                running: counts.running.checked_sub(1)?,
            }),
        }
    }

    fn drained_counter(self) -> Counter {
        match self {
            CounterEvent::Stopped => Counter::Running,
            _ => Counter::Paused,
        }
    }

    fn operation(self) -> &'static str {
        match self {
            CounterEvent::Created => "create",
            CounterEvent::Deleted => "delete",
            CounterEvent::Reused => "reuse",
            CounterEvent::Stopped => "stop",
        }
    }
}

/// A node ledger together with its per-type inventory record.
#[derive(Debug, Clone)]
pub struct NodeEntry {
    node: Node,
    inventory: BTreeMap<ContainerType, TypeCounts>,
}

impl NodeEntry {
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Per-type counts; types with no containers are absent.
    pub fn inventory(&self) -> &BTreeMap<ContainerType, TypeCounts> {
        &self.inventory
    }

    pub fn counts(&self, ty: ContainerType) -> TypeCounts {
        self.inventory.get(&ty).copied().unwrap_or_default()
    }
}

/// The fleet state: every registered node plus the global aggregate.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    nodes: BTreeMap<NodeId, NodeEntry>,
    totals: BTreeMap<ContainerType, TypeCounts>,
}

impl Fleet {
    /// Registered nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeEntry> {
        self.nodes.values()
    }

    pub fn node(&self, id: NodeId) -> FleetResult<&NodeEntry> {
        self.nodes.get(&id).ok_or(FleetError::UnknownNode(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fleet-wide counts for `ty`.
    pub fn totals(&self, ty: ContainerType) -> TypeCounts {
        self.totals.get(&ty).copied().unwrap_or_default()
    }

    pub fn all_totals(&self) -> &BTreeMap<ContainerType, TypeCounts> {
        &self.totals
    }

    pub(crate) fn register_node(&mut self, node: Node) -> FleetResult<()> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(FleetError::DuplicateNode(id));
        }
        self.nodes.insert(
            id,
            NodeEntry {
                node,
                inventory: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Callers must drain the node first.
    pub(crate) fn unregister_node(&mut self, id: NodeId) -> FleetResult<Node> {
        let entry = self.node(id)?;
        if !entry.node.is_empty() {
            return Err(FleetError::NodeNotDrained {
                node_id: id,
                containers: entry.node.len(),
            });
        }
        let entry = self.nodes.remove(&id).ok_or(FleetError::UnknownNode(id))?;
        Ok(entry.node)
    }

    /// Mutable view over one node and the aggregate.
    pub(crate) fn ledger(&mut self, id: NodeId) -> FleetResult<NodeLedger<'_>> {
        let entry = self.nodes.get_mut(&id).ok_or(FleetError::UnknownNode(id))?;
        Ok(NodeLedger {
            entry,
            totals: &mut self.totals,
        })
    }

    /// Stage changes to one node on a private copy.
    ///
    /// Nothing is visible until [`Fleet::commit`]; dropping the
    /// transaction discards every staged change.
    pub(crate) fn begin(&self, id: NodeId) -> FleetResult<Transaction> {
        let entry = self.node(id)?.clone();
        Ok(Transaction {
            node_id: id,
            entry,
            totals: self.totals.clone(),
        })
    }

    pub(crate) fn commit(&mut self, txn: Transaction) {
        self.nodes.insert(txn.node_id, txn.entry);
        self.totals = txn.totals;
    }

    /// Check every inventory invariant.
    ///
    /// - each node's free memory plus its containers' memory equals its capacity
    /// - each (node, type) record matches the node's paused/running containers
    /// - each fleet aggregate equals the sum of the node records
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        let mut summed: BTreeMap<ContainerType, TypeCounts> = BTreeMap::new();

        for entry in self.nodes.values() {
            let node = &entry.node;
            if !node.is_balanced() {
                return Err(InvariantViolation(format!(
                    "{}: free {} + used {} != capacity {}",
                    node.id(),
                    node.free_memory(),
                    node.used_memory(),
                    node.capacity()
                )));
            }

            let mut observed: BTreeMap<ContainerType, TypeCounts> = BTreeMap::new();
            for container in node.containers() {
                let counts = observed.entry(container.container_type()).or_default();
                if container.is_paused() {
                    counts.paused += 1;
                } else if container.is_running() {
                    counts.running += 1;
                } else {
                    return Err(InvariantViolation(format!(
                        "{} owns deleted container {}",
                        node.id(),
                        container.id()
                    )));
                }
            }

            if observed != entry.inventory {
                return Err(InvariantViolation(format!(
                    "{}: tracked {:?} but owns {:?}",
                    node.id(),
                    entry.inventory,
                    observed
                )));
            }

            for (ty, counts) in observed {
                let sum = summed.entry(ty).or_default();
                sum.paused += counts.paused;
                sum.running += counts.running;
            }
        }

        if summed != self.totals {
            return Err(InvariantViolation(format!(
                "fleet aggregate {:?} != node sum {:?}",
                self.totals, summed
            )));
        }

        Ok(())
    }
}

/// Staged changes to a single node, see [`Fleet::begin`].
#[derive(Debug)]
pub(crate) struct Transaction {
    node_id: NodeId,
    entry: NodeEntry,
    totals: BTreeMap<ContainerType, TypeCounts>,
}

impl Transaction {
    pub(crate) fn ledger(&mut self) -> NodeLedger<'_> {
        NodeLedger {
            entry: &mut self.entry,
            totals: &mut self.totals,
        }
    }
}

/// Validated counter movement, ready to write.
struct CounterUpdate {
    container_type: ContainerType,
    node: TypeCounts,
    fleet: TypeCounts,
}

/// Mutable view over one node's ledger and inventory plus the aggregate.
///
/// Every lifecycle operation goes through here so the ledger and the
/// counters can never be changed independently.
pub(crate) struct NodeLedger<'a> {
    entry: &'a mut NodeEntry,
    totals: &'a mut BTreeMap<ContainerType, TypeCounts>,
}

impl NodeLedger<'_> {
    pub(crate) fn node(&self) -> &Node {
        &self.entry.node
    }

    /// Place a new paused container on the node.
    pub(crate) fn create(&mut self, container: Container) -> FleetResult<()> {
        let ty = container.container_type();
        self.check(ty, CounterEvent::Created)?;
        self.entry.node.create_container(container)?;
        self.record_created(ty)
    }

    /// Remove a paused container, releasing its memory.
    pub(crate) fn delete(&mut self, id: ContainerId) -> FleetResult<Container> {
        let ty = self.type_of(id)?;
        self.check(ty, CounterEvent::Deleted)?;
        let container = self.entry.node.delete_container(id)?;
        self.record_deleted(ty)?;
        Ok(container)
    }

    pub(crate) fn reuse(&mut self, id: ContainerId) -> FleetResult<Container> {
        let ty = self.type_of(id)?;
        self.check(ty, CounterEvent::Reused)?;
        let container = self.entry.node.reuse_container(id)?.clone();
        self.record_reused(ty)?;
        Ok(container)
    }

    pub(crate) fn stop(&mut self, id: ContainerId) -> FleetResult<Container> {
        let ty = self.type_of(id)?;
        self.check(ty, CounterEvent::Stopped)?;
        let container = self.entry.node.stop_container(id)?.clone();
        self.record_stopped(ty)?;
        Ok(container)
    }

    /// Counter-only: one more paused container of `ty`.
    pub(crate) fn record_created(&mut self, ty: ContainerType) -> FleetResult<()> {
        self.record(ty, CounterEvent::Created)
    }

    /// Counter-only: one fewer paused container of `ty`.
    pub(crate) fn record_deleted(&mut self, ty: ContainerType) -> FleetResult<()> {
        self.record(ty, CounterEvent::Deleted)
    }

    /// Counter-only: one paused container of `ty` started running.
    pub(crate) fn record_reused(&mut self, ty: ContainerType) -> FleetResult<()> {
        self.record(ty, CounterEvent::Reused)
    }

    /// Counter-only: one running container of `ty` went back to paused.
    pub(crate) fn record_stopped(&mut self, ty: ContainerType) -> FleetResult<()> {
        self.record(ty, CounterEvent::Stopped)
    }

    /// Validate a counter movement without applying it. The node step
    /// between `check` and `record_*` never touches the counters, so a
    /// passing check guarantees the record succeeds.
    fn check(&self, ty: ContainerType, event: CounterEvent) -> FleetResult<()> {
        self.plan(ty, event).map(|_| ())
    }

    fn record(&mut self, ty: ContainerType, event: CounterEvent) -> FleetResult<()> {
        let update = self.plan(ty, event)?;
        self.write(update);
        Ok(())
    }

    fn type_of(&self, id: ContainerId) -> FleetResult<ContainerType> {
        self.entry
            .node
            .container(id)
            .map(Container::container_type)
            .ok_or(FleetError::UnknownContainer {
                node_id: self.entry.node.id(),
                container_id: id,
            })
    }

    fn plan(&self, ty: ContainerType, event: CounterEvent) -> FleetResult<CounterUpdate> {
        let inconsistency = |scope| FleetError::StateInconsistency {
            scope,
            container_type: ty,
            counter: event.drained_counter(),
            operation: event.operation(),
        };

        let node_id = self.entry.node.id();
        let node = event
            .apply(self.entry.counts(ty))
            .ok_or_else(|| inconsistency(InventoryScope::Node(node_id)))?;
        let fleet = event
            .apply(self.totals.get(&ty).copied().unwrap_or_default())
            .ok_or_else(|| inconsistency(InventoryScope::Fleet))?;

        Ok(CounterUpdate {
            container_type: ty,
            node,
            fleet,
        })
    }

    fn write(&mut self, update: CounterUpdate) {
        put_counts(&mut self.entry.inventory, update.container_type, update.node);
        put_counts(self.totals, update.container_type, update.fleet);
    }
}

fn put_counts(
    map: &mut BTreeMap<ContainerType, TypeCounts>,
    ty: ContainerType,
    counts: TypeCounts,
) {
    if counts.is_zero() {
        map.remove(&ty);
    } else {
        map.insert(ty, counts);
    }
}

/// Point-in-time summary of the fleet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetStats {
    pub nodes: usize,
    pub capacity: u64,
    pub free_memory: u64,
    pub paused: u32,
    pub running: u32,
}

/// Shared handle to the fleet state.
///
/// Cloning is cheap; all clones see the same fleet.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    fleet: RwLock<Fleet>,
    catalog: Catalog,
    container_ids: IdSequence<ContainerId>,
    reporter: Arc<dyn Reporter>,
    /// Fired when a container becomes paused or memory is released.
    changed: Notify,
}

impl Tracker {
    pub fn new(catalog: Catalog, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                fleet: RwLock::new(Fleet::default()),
                catalog,
                container_ids: IdSequence::new(),
                reporter,
                changed: Notify::new(),
            }),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Add a node with `capacity` MB of memory to the fleet.
    #[instrument(skip(self))]
    pub fn register_node(&self, node_id: NodeId, capacity: u64) -> FleetResult<()> {
        self.write().register_node(Node::new(node_id, capacity))?;
        info!(node_id = %node_id, capacity, "Node registered");
        self.notify_changed();
        Ok(())
    }

    /// Remove an empty node from the fleet.
    #[instrument(skip(self))]
    pub fn unregister_node(&self, node_id: NodeId) -> FleetResult<()> {
        self.write().unregister_node(node_id)?;
        info!(node_id = %node_id, "Node unregistered");
        Ok(())
    }

    /// Delete every paused container on a node so it can be unregistered.
    ///
    /// Fails without deleting anything if the node still runs containers.
    #[instrument(skip(self))]
    pub fn drain_node(&self, node_id: NodeId) -> FleetResult<Vec<Container>> {
        let deleted = {
            let mut fleet = self.write();
            let mut txn = fleet.begin(node_id)?;
            let mut ledger = txn.ledger();

            let running = ledger.node().containers().filter(|c| c.is_running()).count();
            if running > 0 {
                return Err(FleetError::NodeNotDrained {
                    node_id,
                    containers: running,
                });
            }

            let ids: Vec<_> = ledger.node().containers().map(Container::id).collect();
            let deleted = ids
                .into_iter()
                .map(|id| ledger.delete(id))
                .collect::<FleetResult<Vec<_>>>()?;
            fleet.commit(txn);
            deleted
        };

        info!(node_id = %node_id, deleted = deleted.len(), "Node drained");
        self.report_deleted(node_id, &deleted);
        if !deleted.is_empty() {
            self.notify_changed();
        }
        Ok(deleted)
    }

    /// Pre-warm: place a new paused container of `ty` on a node.
    #[instrument(skip(self))]
    pub fn create_container(&self, node_id: NodeId, ty: ContainerType) -> FleetResult<Container> {
        let footprint = self.catalog().footprint(ty)?;
        let container = Container::new(self.next_container_id(), ty, footprint);

        self.write().ledger(node_id)?.create(container.clone())?;
        debug!(node_id = %node_id, container_id = %container.id(), container_type = %ty, "Container created");
        self.notify_changed();
        Ok(container)
    }

    /// Delete a paused container, then report the deletion.
    #[instrument(skip(self))]
    pub fn delete_container(
        &self,
        node_id: NodeId,
        container_id: ContainerId,
    ) -> FleetResult<Container> {
        let container = self.write().ledger(node_id)?.delete(container_id)?;
        debug!(node_id = %node_id, container_id = %container_id, "Container deleted");

        self.report_deleted(node_id, std::slice::from_ref(&container));
        self.notify_changed();
        Ok(container)
    }

    /// Hand a paused container to a task.
    #[instrument(skip(self))]
    pub fn reuse_container(
        &self,
        node_id: NodeId,
        container_id: ContainerId,
    ) -> FleetResult<Container> {
        self.write().ledger(node_id)?.reuse(container_id)
    }

    /// Return a running container to the warm pool.
    #[instrument(skip(self))]
    pub fn stop_container(
        &self,
        node_id: NodeId,
        container_id: ContainerId,
    ) -> FleetResult<Container> {
        let container = self.write().ledger(node_id)?.stop(container_id)?;
        debug!(node_id = %node_id, container_id = %container_id, "Container stopped");
        self.notify_changed();
        Ok(container)
    }

    /// Per-type counts for one node.
    pub fn inventory(&self, node_id: NodeId) -> FleetResult<BTreeMap<ContainerType, TypeCounts>> {
        Ok(self.read().node(node_id)?.inventory().clone())
    }

    /// Fleet-wide counts for one type.
    pub fn fleet_counts(&self, ty: ContainerType) -> TypeCounts {
        self.read().totals(ty)
    }

    /// Copy of a node's ledger.
    pub fn node(&self, node_id: NodeId) -> FleetResult<Node> {
        Ok(self.read().node(node_id)?.node().clone())
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.read().nodes().map(|e| e.node().id()).collect()
    }

    pub fn stats(&self) -> FleetStats {
        let fleet = self.read();
        let mut stats = FleetStats {
            nodes: fleet.len(),
            ..FleetStats::default()
        };
        for entry in fleet.nodes() {
            stats.capacity += entry.node().capacity();
            stats.free_memory += entry.node().free_memory();
        }
        for counts in fleet.all_totals().values() {
            stats.paused += counts.paused;
            stats.running += counts.running;
        }
        stats
    }

    pub fn verify(&self) -> Result<(), InvariantViolation> {
        self.read().verify()
    }

    /// Wait until capacity may have become available.
    ///
    /// A change that happens while nobody waits is remembered, so the next
    /// call returns immediately.
    pub async fn changed(&self) {
        self.inner.changed.notified().await;
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Fleet> {
        self.inner.fleet.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Fleet> {
        self.inner.fleet.write()
    }

    pub(crate) fn next_container_id(&self) -> ContainerId {
        self.inner.container_ids.next()
    }

    pub(crate) fn notify_changed(&self) {
        self.inner.changed.notify_one();
    }

    /// Invoke the deletion hook. Must be called without the fleet lock held.
    pub(crate) fn report_deleted(&self, node_id: NodeId, containers: &[Container]) {
        for container in containers {
            if let Err(e) = self.inner.reporter.report(container, node_id) {
                warn!(
                    node_id = %node_id,
                    container_id = %container.id(),
                    error = %e,
                    "Deletion report failed"
                );
            }
        }
    }
}
