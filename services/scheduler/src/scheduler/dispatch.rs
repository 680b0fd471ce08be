//! Executor hand-off.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::Assignment;
use crate::executor::Executor;
use crate::tracker::Tracker;

pub(crate) struct Dispatcher {
    tracker: Tracker,
    executor: Arc<dyn Executor>,
    in_flight: Arc<AtomicUsize>,
}

impl Dispatcher {
    pub(crate) fn new(tracker: Tracker, executor: Arc<dyn Executor>) -> Self {
        Self {
            tracker,
            executor,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run the task on its own tokio task, then return the container to
    /// the warm pool whether or not execution succeeded.
    pub(crate) fn dispatch(&self, assignment: Assignment) {
        let tracker = self.tracker.clone();
        let executor = Arc::clone(&self.executor);
        let guard = InFlight::enter(&self.in_flight);

        tokio::spawn(async move {
            let _guard = guard;
            let task_id = assignment.task.id();

            match executor.execute(&assignment).await {
                Ok(()) => debug!(task_id = %task_id, "Task finished"),
                Err(e) => warn!(task_id = %task_id, error = %e, "Task execution failed"),
            }

            if let Err(e) = tracker.stop_container(assignment.node_id, assignment.container_id) {
                error!(
                    task_id = %task_id,
                    node_id = %assignment.node_id,
                    container_id = %assignment.container_id,
                    error = %e,
                    "Failed to return container to warm pool"
                );
            }
        });
    }
}

/// Counts a dispatched task until it is dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
