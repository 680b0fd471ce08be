//! Waiting-queue scan.
//!
//! Wakes whenever the tracker signals that capacity may have appeared, and
//! on a fixed poll interval otherwise. Each pass walks the queue front to
//! back and resubmits every task that some tier could now place.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::Scheduler;
use crate::releaser::Forecast;

pub struct ScanWorker {
    scheduler: Arc<Scheduler>,
    interval: Duration,
}

impl ScanWorker {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        let interval = scheduler.config().scan_interval;
        Self {
            scheduler,
            interval,
        }
    }

    /// Run until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            scan_interval_ms = self.interval.as_millis() as u64,
            "Starting waiting-queue scan"
        );

        let mut poll = tokio::time::interval(self.interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.scheduler.tracker().changed() => {}
                _ = poll.tick() => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!("Waiting-queue scan shutting down");
                        break;
                    }
                    continue;
                }
            }

            let resubmitted = self.scan_once();
            if resubmitted > 0 {
                debug!(
                    resubmitted,
                    remaining = self.scheduler.queue().len(),
                    "Scan pass complete"
                );
            }
        }
    }

    /// One pass over the queue. Returns how many tasks were resubmitted.
    ///
    /// A resubmitted task that loses its capacity to a concurrent request
    /// goes back to the tail of the queue.
    pub fn scan_once(&self) -> usize {
        let queue = self.scheduler.queue();
        if queue.is_empty() {
            return 0;
        }

        let mut forecast = Forecast::new(self.scheduler.releaser());
        let mut resubmitted = 0;

        for task in queue.snapshot() {
            if !self.scheduler.is_feasible(&task, &mut forecast) {
                continue;
            }
            // Cancelled since the snapshot.
            let Some(task) = queue.remove(task.id()) else {
                continue;
            };

            resubmitted += 1;
            let scheduler = Arc::clone(&self.scheduler);
            tokio::spawn(async move {
                if let Err(e) = scheduler.schedule(task).await {
                    warn!(task_id = %task.id(), error = %e, "Resubmitted task failed");
                }
            });
        }

        resubmitted
    }
}
