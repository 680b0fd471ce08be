//! fcas scheduler daemon
//!
//! Registers a fixed fleet, starts the waiting-queue scan and optionally
//! feeds it a burst of synthetic tasks. Execution is simulated.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use fcas_id::{IdSequence, NodeId, TaskId};
use rand::seq::IndexedRandom;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fcas_scheduler::config::Config;
use fcas_scheduler::executor::MockExecutor;
use fcas_scheduler::predictor::StaticPredictor;
use fcas_scheduler::releaser::Releaser;
use fcas_scheduler::reporter::LogReporter;
use fcas_scheduler::{ContainerType, ScanWorker, Scheduler, Task, Tracker};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting fcas scheduler");
    info!(
        nodes = config.nodes.len(),
        container_types = config.catalog.len(),
        scan_interval_ms = config.scan_interval.as_millis() as u64,
        "Configuration loaded"
    );

    let types: Vec<ContainerType> = config.catalog.types().collect();
    let tracker = Tracker::new(config.catalog.clone(), Arc::new(LogReporter));

    let node_ids = IdSequence::<NodeId>::new();
    for capacity in &config.nodes {
        tracker.register_node(node_ids.next(), *capacity)?;
    }

    let releaser = Releaser::new(Arc::new(StaticPredictor::new(config.forecast.iter().copied())));
    let executor = Arc::new(MockExecutor::new(config.task_duration));
    let scheduler = Arc::new(Scheduler::new(
        tracker.clone(),
        releaser,
        executor,
        config.scheduler(),
    ));

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = ScanWorker::new(Arc::clone(&scheduler));
    let worker_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            worker.run(shutdown_rx).await;
        }
    });

    if config.synthetic_tasks > 0 {
        submit_synthetic(&scheduler, &types, config.synthetic_tasks).await;
    }

    let stats_handle = tokio::spawn(log_stats(Arc::clone(&scheduler), shutdown_rx));

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = worker_handle => {
            if let Err(e) = result {
                error!(error = %e, "Scan worker panicked");
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = stats_handle.await;

    if let Err(e) = tracker.verify() {
        error!(error = %e, "Fleet state inconsistent at shutdown");
    }

    info!(
        queued = scheduler.queue().len(),
        in_flight = scheduler.in_flight(),
        "Scheduler shutdown complete"
    );
    Ok(())
}

async fn submit_synthetic(scheduler: &Arc<Scheduler>, types: &[ContainerType], count: usize) {
    let task_ids = IdSequence::<TaskId>::new();
    let picks: Vec<ContainerType> = {
        let mut rng = rand::rng();
        (0..count)
            .filter_map(|_| types.choose(&mut rng).copied())
            .collect()
    };

    info!(count = picks.len(), "Submitting synthetic tasks");
    for ty in picks {
        let task = Task::new(task_ids.next(), ty);
        if let Err(e) = scheduler.schedule(task).await {
            warn!(task_id = %task.id(), error = %e, "Synthetic task rejected");
        }
    }
}

async fn log_stats(scheduler: Arc<Scheduler>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let stats = scheduler.tracker().stats();
                info!(
                    nodes = stats.nodes,
                    free_memory = stats.free_memory,
                    paused = stats.paused,
                    running = stats.running,
                    queued = scheduler.queue().len(),
                    in_flight = scheduler.in_flight(),
                    "Fleet stats"
                );
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
