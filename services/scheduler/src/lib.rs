//! fcas scheduler
//!
//! Admission control and placement for tasks that run inside pre-warmed
//! containers on a fleet of memory-bounded nodes.
//!
//! ## Architecture
//!
//! ```text
//! schedule(task)
//!   ├── tier 1: reuse a paused container of the task's type
//!   ├── tier 2: allocate a new container where memory is free
//!   ├── tier 3: evict unforecast paused containers, then allocate
//!   └── otherwise: park in the waiting queue
//! ```
//!
//! ## Modules
//!
//! - `tracker`: fleet inventory, per-type counters, change notification
//! - `releaser`: which paused containers may be evicted
//! - `scheduler`: tiered placement, waiting queue, scan worker
//! - `executor`, `predictor`, `reporter`: collaborator seams

pub mod catalog;
pub mod config;
pub mod container;
pub mod error;
pub mod executor;
pub mod node;
pub mod predictor;
pub mod releaser;
pub mod reporter;
pub mod scheduler;
pub mod task;
pub mod tracker;

pub use catalog::{Catalog, ContainerType};
pub use container::{Container, ContainerState};
pub use error::{FleetError, FleetResult, InvariantViolation};
pub use scheduler::{Assignment, ScanWorker, ScheduleOutcome, Scheduler, SchedulerConfig, Tier};
pub use task::Task;
pub use tracker::{Tracker, TypeCounts};
