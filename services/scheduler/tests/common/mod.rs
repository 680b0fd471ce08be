//! Shared fixtures for scheduler integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use fcas_id::TaskId;
use fcas_scheduler::executor::Executor;
use fcas_scheduler::predictor::StaticPredictor;
use fcas_scheduler::releaser::Releaser;
use fcas_scheduler::reporter::LogReporter;
use fcas_scheduler::{
    Assignment, Catalog, ContainerType, Scheduler, SchedulerConfig, Task, Tracker,
};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

pub const SMALL: ContainerType = ContainerType::new(0);
pub const BIG: ContainerType = ContainerType::new(1);
pub const OTHER: ContainerType = ContainerType::new(2);

pub fn catalog() -> Catalog {
    Catalog::new([(SMALL, 50), (BIG, 120), (OTHER, 100)]).unwrap()
}

/// Executor that records each assignment and then blocks until released.
pub struct GatedExecutor {
    gate: Semaphore,
    started: Mutex<Vec<Assignment>>,
}

impl GatedExecutor {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: Mutex::new(Vec::new()),
        }
    }

    /// Let `n` blocked or future executions finish.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn started(&self) -> Vec<Assignment> {
        self.started.lock().clone()
    }
}

#[async_trait]
impl Executor for GatedExecutor {
    async fn execute(&self, assignment: &Assignment) -> Result<()> {
        self.started.lock().push(assignment.clone());
        self.gate.acquire().await?.forget();
        Ok(())
    }
}

pub struct Harness {
    pub scheduler: Arc<Scheduler>,
    pub predictor: Arc<StaticPredictor>,
    pub executor: Arc<GatedExecutor>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs(60))
    }

    pub fn with_interval(scan_interval: Duration) -> Self {
        let tracker = Tracker::new(catalog(), Arc::new(LogReporter));
        let predictor = Arc::new(StaticPredictor::empty());
        let executor = Arc::new(GatedExecutor::new());
        let scheduler = Arc::new(Scheduler::new(
            tracker,
            Releaser::new(predictor.clone()),
            executor.clone(),
            SchedulerConfig { scan_interval },
        ));
        Self {
            scheduler,
            predictor,
            executor,
        }
    }

    pub fn tracker(&self) -> &Tracker {
        self.scheduler.tracker()
    }
}

pub fn task(id: u64, ty: ContainerType) -> Task {
    Task::new(TaskId::new(id), ty)
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
