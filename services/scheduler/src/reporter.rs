//! Deletion notification hook.
//!
//! The tracker calls the reporter after a container has been deleted and
//! the fleet lock has been released. Errors are logged and swallowed; a
//! failed report never undoes the deletion it follows.

use fcas_id::NodeId;
use tracing::info;

use crate::container::Container;

/// Receives a notification for every deleted container.
///
/// Implementations must not block.
pub trait Reporter: Send + Sync {
    fn report(&self, container: &Container, node_id: NodeId) -> anyhow::Result<()>;
}

/// Reporter that writes each deletion to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, container: &Container, node_id: NodeId) -> anyhow::Result<()> {
        info!(
            node_id = %node_id,
            container_id = %container.id(),
            container_type = %container.container_type(),
            memory_mb = container.memory_used(),
            "Container deleted"
        );
        Ok(())
    }
}
