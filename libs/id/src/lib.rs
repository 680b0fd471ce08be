//! # fcas-id
//!
//! Stable ID types, parsing, and generation for the fcas scheduler.
//!
//! ## Design Principles
//!
//! - IDs are system-generated and never reused within a process
//! - All IDs have a canonical string representation with strict parsing
//! - IDs are typed to prevent mixing nodes, containers, and tasks
//! - IDs are totally ordered; the order is the numeric order
//!
//! ## ID Format
//!
//! All IDs use a prefixed format: `{prefix}_{decimal}`
//!
//! Examples:
//! - `node_3`
//! - `ctr_17`
//! - `task_42`
//!
//! The numeric part makes ascending order equal to allocation order, which
//! the scheduler relies on for deterministic tie-breaking.

mod error;
mod macros;
mod sequence;
mod types;

pub use error::IdError;
pub use sequence::IdSequence;
pub use types::*;
