//! Admission and placement.
//!
//! The scheduler is responsible for:
//! - Choosing a node for each incoming task through the tiered policy
//! - Applying the chosen action (reuse, allocate, evict then allocate)
//!   against the tracker as one atomic step
//! - Parking tasks that fit nowhere in the waiting queue
//! - Handing placed tasks to the executor

mod dispatch;
mod policy;
mod queue;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use fcas_id::{ContainerId, NodeId, TaskId};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::catalog::ContainerType;
use crate::container::Container;
use crate::error::FleetResult;
use crate::executor::Executor;
use crate::releaser::{Forecast, Releaser};
use crate::task::Task;
use crate::tracker::{NodeLedger, Tracker};

use dispatch::Dispatcher;
pub use policy::{Action, Placement};
pub use queue::WaitingQueue;
pub use worker::ScanWorker;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fallback period of the waiting-queue scan when no change is signalled.
    pub scan_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(500),
        }
    }
}

/// Which tier placed a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "tier")]
pub enum Tier {
    Reuse,
    ColdAllocate,
    EvictThenAllocate { evicted: Vec<ContainerId> },
}

/// A task bound to a running container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub task: Task,
    pub node_id: NodeId,
    pub container_id: ContainerId,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Placed and handed to the executor.
    Dispatched(Assignment),
    /// No tier matched; the task waits for capacity.
    Queued,
}

impl ScheduleOutcome {
    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            ScheduleOutcome::Dispatched(assignment) => Some(assignment),
            ScheduleOutcome::Queued => None,
        }
    }
}

pub struct Scheduler {
    tracker: Tracker,
    releaser: Releaser,
    queue: WaitingQueue,
    dispatcher: Dispatcher,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        tracker: Tracker,
        releaser: Releaser,
        executor: Arc<dyn Executor>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(tracker.clone(), executor),
            tracker,
            releaser,
            queue: WaitingQueue::new(),
            config,
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn releaser(&self) -> &Releaser {
        &self.releaser
    }

    pub fn queue(&self) -> &WaitingQueue {
        &self.queue
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Tasks handed to the executor that have not yet returned their container.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    pub fn register_node(&self, node_id: NodeId, capacity: u64) -> FleetResult<()> {
        self.tracker.register_node(node_id, capacity)
    }

    pub fn unregister_node(&self, node_id: NodeId) -> FleetResult<()> {
        self.tracker.unregister_node(node_id)
    }

    /// Paused containers on a node that are currently safe to evict.
    pub fn list_released(&self, node_id: NodeId) -> FleetResult<Vec<Container>> {
        self.releaser.list_released(&self.tracker, node_id)
    }

    /// Place a task, or queue it if no node can take it right now.
    ///
    /// Unknown container types are rejected and never queued. Any failure
    /// while applying a placement leaves the fleet untouched.
    #[instrument(skip(self, task), fields(task_id = %task.id(), container_type = %task.container_type()))]
    pub async fn schedule(&self, task: Task) -> FleetResult<ScheduleOutcome> {
        let footprint = self.tracker.catalog().footprint(task.container_type())?;

        let Some((assignment, evicted)) = self.place(task, footprint)? else {
            debug!(queued = self.queue.len(), "No capacity, task queued");
            return Ok(ScheduleOutcome::Queued);
        };

        if !evicted.is_empty() {
            self.tracker.report_deleted(assignment.node_id, &evicted);
        }

        info!(
            node_id = %assignment.node_id,
            container_id = %assignment.container_id,
            tier = ?assignment.tier,
            "Task placed"
        );
        self.dispatcher.dispatch(assignment.clone());
        Ok(ScheduleOutcome::Dispatched(assignment))
    }

    /// Drop a waiting task. Returns false if it is not queued.
    #[instrument(skip(self))]
    pub fn cancel(&self, task_id: TaskId) -> bool {
        let removed = self.queue.remove(task_id).is_some();
        if removed {
            info!(task_id = %task_id, "Queued task cancelled");
        }
        removed
    }

    /// Whether any tier could place `task` against the current fleet.
    pub(crate) fn is_feasible(&self, task: &Task, forecast: &mut Forecast<'_>) -> bool {
        let Ok(footprint) = self.tracker.catalog().footprint(task.container_type()) else {
            return false;
        };
        let fleet = self.tracker.read();
        policy::choose_node(&fleet, task.container_type(), footprint, forecast).is_some()
    }

    /// Choose and apply under one write lock.
    ///
    /// Returns the assignment plus any containers evicted for it, or `None`
    /// once the task has been queued.
    fn place(&self, task: Task, footprint: u64) -> FleetResult<Option<(Assignment, Vec<Container>)>> {
        let mut forecast = Forecast::new(&self.releaser);
        let mut fleet = self.tracker.write();

        let Some(placement) =
            policy::choose_node(&fleet, task.container_type(), footprint, &mut forecast)
        else {
            // Queued while the fleet is locked so no change can slip past it.
            self.queue.push(task);
            return Ok(None);
        };

        let mut txn = fleet.begin(placement.node_id)?;
        let mut ledger = txn.ledger();
        let mut evicted = Vec::new();

        let (container, tier) = match placement.action {
            Action::Reuse(id) => (ledger.reuse(id)?, Tier::Reuse),
            Action::Allocate => (
                self.allocate(&mut ledger, task.container_type(), footprint)?,
                Tier::ColdAllocate,
            ),
            Action::EvictThenAllocate(victims) => {
                for id in victims {
                    evicted.push(ledger.delete(id)?);
                }
                let container = self.allocate(&mut ledger, task.container_type(), footprint)?;
                let tier = Tier::EvictThenAllocate {
                    evicted: evicted.iter().map(Container::id).collect(),
                };
                (container, tier)
            }
        };
        fleet.commit(txn);

        let assignment = Assignment {
            task,
            node_id: placement.node_id,
            container_id: container.id(),
            tier,
        };
        Ok(Some((assignment, evicted)))
    }

    fn allocate(
        &self,
        ledger: &mut NodeLedger<'_>,
        ty: ContainerType,
        footprint: u64,
    ) -> FleetResult<Container> {
        let container = Container::new(self.tracker.next_container_id(), ty, footprint);
        let id = container.id();
        ledger.create(container)?;
        ledger.reuse(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::error::FleetError;
    use crate::executor::MockExecutor;
    use crate::predictor::StaticPredictor;
    use crate::reporter::test_support::RecordingReporter;

    const SMALL: ContainerType = ContainerType::new(0);
    const BIG: ContainerType = ContainerType::new(1);

    fn scheduler(reporter: Arc<RecordingReporter>) -> Scheduler {
        let catalog = Catalog::new([(SMALL, 50), (BIG, 120)]).unwrap();
        let tracker = Tracker::new(catalog, reporter);
        let releaser = Releaser::new(Arc::new(StaticPredictor::empty()));
        let executor = Arc::new(MockExecutor::new(Duration::from_secs(60)));
        Scheduler::new(tracker, releaser, executor, SchedulerConfig::default())
    }

    fn task(id: u64, ty: ContainerType) -> Task {
        Task::new(TaskId::new(id), ty)
    }

    #[tokio::test]
    async fn test_cold_allocate_starts_running() {
        let scheduler = scheduler(Arc::default());
        scheduler.register_node(NodeId::new(1), 100).unwrap();

        let outcome = scheduler.schedule(task(1, SMALL)).await.unwrap();
        let assignment = outcome.assignment().unwrap();
        assert_eq!(assignment.tier, Tier::ColdAllocate);

        let node = scheduler.tracker().node(NodeId::new(1)).unwrap();
        assert_eq!(node.free_memory(), 50);
        assert!(node.container(assignment.container_id).unwrap().is_running());
        assert_eq!(scheduler.tracker().fleet_counts(SMALL).running, 1);
        scheduler.tracker().verify().unwrap();
    }

    #[tokio::test]
    async fn test_eviction_applies_and_reports() {
        let reporter = Arc::new(RecordingReporter::default());
        let scheduler = scheduler(Arc::clone(&reporter));
        let node_id = NodeId::new(1);
        scheduler.register_node(node_id, 150).unwrap();
        let victims: Vec<_> = (0..3)
            .map(|_| scheduler.tracker().create_container(node_id, SMALL).unwrap().id())
            .collect();

        let outcome = scheduler.schedule(task(1, BIG)).await.unwrap();
        let assignment = outcome.assignment().unwrap();
        assert_eq!(
            assignment.tier,
            Tier::EvictThenAllocate {
                evicted: victims[..3].to_vec()
            }
        );
        assert_eq!(
            reporter.reported(),
            victims.iter().map(|id| (*id, node_id)).collect::<Vec<_>>()
        );
        assert_eq!(scheduler.tracker().node(node_id).unwrap().free_memory(), 30);
        scheduler.tracker().verify().unwrap();
    }

    #[tokio::test]
    async fn test_unknown_type_is_rejected() {
        let scheduler = scheduler(Arc::default());
        scheduler.register_node(NodeId::new(1), 100).unwrap();

        let err = scheduler
            .schedule(task(1, ContainerType::new(99)))
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::UnknownContainerType(_)));
        assert!(scheduler.queue().is_empty());
    }

    #[tokio::test]
    async fn test_empty_fleet_queues() {
        let scheduler = scheduler(Arc::default());
        let outcome = scheduler.schedule(task(7, SMALL)).await.unwrap();
        assert_eq!(outcome, ScheduleOutcome::Queued);
        assert!(scheduler.queue().contains(TaskId::new(7)));

        assert!(scheduler.cancel(TaskId::new(7)));
        assert!(!scheduler.cancel(TaskId::new(7)));
        assert!(scheduler.queue().is_empty());
    }

    #[test]
    fn test_tier_serializes_tagged() {
        let json = serde_json::to_value(Tier::EvictThenAllocate {
            evicted: vec![ContainerId::new(4)],
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"tier": "evict_then_allocate", "evicted": ["ctr_4"]})
        );
    }
}
