//! Integration tests for the waiting queue and its scan worker.
//!
//! A queued task must be picked up again when a container of its type
//! becomes paused, when memory is released, or (via the poll fallback) when
//! the forecast changes without any fleet event.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{task, wait_until, Harness, BIG, OTHER, SMALL};
use fcas_id::{NodeId, TaskId};
use fcas_scheduler::{ScanWorker, ScheduleOutcome, Tier};
use tokio::sync::watch;
use tokio::task::JoinHandle;

fn n(id: u64) -> NodeId {
    NodeId::new(id)
}

fn start_worker(h: &Harness) -> (watch::Sender<bool>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(false);
    let worker = ScanWorker::new(Arc::clone(&h.scheduler));
    let handle = tokio::spawn(async move { worker.run(rx).await });
    (tx, handle)
}

async fn stop_worker(tx: watch::Sender<bool>, handle: JoinHandle<()>) {
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_queued_task_reuses_container_when_it_pauses() {
    let h = Harness::new();
    h.scheduler.register_node(n(1), 50).unwrap();
    let (tx, worker) = start_worker(&h);

    let first = h.scheduler.schedule(task(1, SMALL)).await.unwrap();
    let first = first.assignment().unwrap().clone();
    let second = h.scheduler.schedule(task(2, SMALL)).await.unwrap();
    assert_eq!(second, ScheduleOutcome::Queued);

    // Finishing the first task pauses its container and wakes the scan.
    h.executor.release(1);
    wait_until(|| h.executor.started().len() == 2).await;

    let resumed = &h.executor.started()[1];
    assert_eq!(resumed.task.id(), TaskId::new(2));
    assert_eq!(resumed.tier, Tier::Reuse);
    assert_eq!(resumed.container_id, first.container_id);
    assert!(h.scheduler.queue().is_empty());

    h.executor.release(1);
    wait_until(|| h.scheduler.in_flight() == 0).await;
    h.tracker().verify().unwrap();
    stop_worker(tx, worker).await;
}

#[tokio::test]
async fn test_later_task_overtakes_unsatisfiable_earlier_task() {
    let h = Harness::new();
    h.scheduler.register_node(n(1), 50).unwrap();
    let (tx, worker) = start_worker(&h);

    let running = h.scheduler.schedule(task(1, SMALL)).await.unwrap();
    let running = running.assignment().unwrap().clone();
    // BIG never fits this node; SMALL waits for the running container.
    assert_eq!(
        h.scheduler.schedule(task(2, BIG)).await.unwrap(),
        ScheduleOutcome::Queued
    );
    assert_eq!(
        h.scheduler.schedule(task(3, SMALL)).await.unwrap(),
        ScheduleOutcome::Queued
    );

    h.executor.release(1);
    wait_until(|| h.executor.started().len() == 2).await;

    let resumed = &h.executor.started()[1];
    assert_eq!(resumed.task.id(), TaskId::new(3));
    assert_eq!(resumed.tier, Tier::Reuse);
    assert_eq!(resumed.container_id, running.container_id);

    let waiting: Vec<_> = h.scheduler.queue().snapshot().iter().map(|t| t.id()).collect();
    assert_eq!(waiting, vec![TaskId::new(2)]);

    h.executor.release(1);
    stop_worker(tx, worker).await;
}

#[tokio::test]
async fn test_queued_task_allocates_after_deletion() {
    let h = Harness::new();
    h.predictor.set([OTHER]);
    h.scheduler.register_node(n(1), 100).unwrap();
    let protected = h.tracker().create_container(n(1), OTHER).unwrap();
    let (tx, worker) = start_worker(&h);

    let outcome = h.scheduler.schedule(task(1, SMALL)).await.unwrap();
    assert_eq!(outcome, ScheduleOutcome::Queued);

    h.tracker().delete_container(n(1), protected.id()).unwrap();
    wait_until(|| h.executor.started().len() == 1).await;

    let placed = &h.executor.started()[0];
    assert_eq!(placed.task.id(), TaskId::new(1));
    assert_eq!(placed.tier, Tier::ColdAllocate);

    h.executor.release(1);
    stop_worker(tx, worker).await;
}

#[tokio::test]
async fn test_poll_picks_up_forecast_change() {
    let h = Harness::with_interval(Duration::from_millis(10));
    h.predictor.set([SMALL]);
    h.scheduler.register_node(n(1), 150).unwrap();
    let warm: Vec<_> = (0..3)
        .map(|_| h.tracker().create_container(n(1), SMALL).unwrap().id())
        .collect();
    let (tx, worker) = start_worker(&h);

    let outcome = h.scheduler.schedule(task(1, BIG)).await.unwrap();
    assert_eq!(outcome, ScheduleOutcome::Queued);

    // No fleet event follows; only the periodic scan can notice this.
    h.predictor.set([]);
    wait_until(|| h.executor.started().len() == 1).await;

    assert_eq!(
        h.executor.started()[0].tier,
        Tier::EvictThenAllocate { evicted: warm }
    );

    h.executor.release(1);
    stop_worker(tx, worker).await;
}

#[tokio::test]
async fn test_cancelled_task_is_never_run() {
    let h = Harness::new();
    h.scheduler.register_node(n(1), 50).unwrap();
    let (tx, worker) = start_worker(&h);

    h.scheduler.schedule(task(1, SMALL)).await.unwrap();
    h.scheduler.schedule(task(2, SMALL)).await.unwrap();
    assert!(h.scheduler.cancel(TaskId::new(2)));

    h.executor.release(1);
    wait_until(|| h.scheduler.in_flight() == 0).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(h.executor.started().len(), 1);
    assert!(h.scheduler.queue().is_empty());
    stop_worker(tx, worker).await;
}

#[tokio::test]
async fn test_queue_order_is_preserved() {
    let h = Harness::new();
    h.scheduler.register_node(n(1), 50).unwrap();
    h.scheduler.schedule(task(1, SMALL)).await.unwrap();
    for id in 2..=4 {
        h.scheduler.schedule(task(id, SMALL)).await.unwrap();
    }

    let queued: Vec<_> = h.scheduler.queue().snapshot().iter().map(|t| t.id()).collect();
    assert_eq!(queued, vec![TaskId::new(2), TaskId::new(3), TaskId::new(4)]);
    h.executor.release(1);
}
