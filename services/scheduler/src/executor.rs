//! Task execution hand-off.
//!
//! Starting work inside a container is the container runtime's job. The
//! scheduler hands each assignment to an [`Executor`] on an independent
//! tokio task and returns the container to the warm pool once it finishes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::scheduler::Assignment;

/// Runs a task in the container it was assigned.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, assignment: &Assignment) -> Result<()>;
}

/// Mock executor for testing and development.
pub struct MockExecutor {
    /// Simulated execution time.
    duration: Duration,

    /// Whether every execution should "fail".
    fail: bool,

    executed: AtomicU64,
}

impl MockExecutor {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            fail: false,
            executed: AtomicU64::new(0),
        }
    }

    /// Create a mock executor that fails every task.
    pub fn failing(duration: Duration) -> Self {
        Self {
            fail: true,
            ..Self::new(duration)
        }
    }

    /// Number of executions that have finished.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::SeqCst)
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, assignment: &Assignment) -> Result<()> {
        info!(
            task_id = %assignment.task.id(),
            node_id = %assignment.node_id,
            container_id = %assignment.container_id,
            "[MOCK] Executing task"
        );

        tokio::time::sleep(self.duration).await;
        self.executed.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            anyhow::bail!("Mock executor configured to fail");
        }

        debug!(task_id = %assignment.task.id(), "[MOCK] Task complete");
        Ok(())
    }
}
