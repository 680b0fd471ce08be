//! Tiered node selection.
//!
//! Tiers are evaluated in strict priority order and the first match wins:
//!
//! 1. **Reuse**: a node holding a paused container of the task's type.
//! 2. **Cold allocate**: a node with enough free memory for a new container.
//! 3. **Evict then allocate**: a node where free memory plus the leading
//!    eviction candidates reaches the footprint. Only the shortest prefix
//!    of candidates that gets there is evicted.
//!
//! Within a tier nodes are tried in ascending id order; within tier 1 the
//! lowest-id paused container is reused.

use fcas_id::{ContainerId, NodeId};

use crate::catalog::ContainerType;
use crate::container::Container;
use crate::releaser::Forecast;
use crate::tracker::Fleet;

/// What to do on the chosen node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run the task in this paused container.
    Reuse(ContainerId),
    /// Create a new container.
    Allocate,
    /// Evict these containers, in order, then create a new container.
    EvictThenAllocate(Vec<ContainerId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub node_id: NodeId,
    pub action: Action,
}

/// Pick a node for one container of `ty`, or `None` if no tier matches.
pub(crate) fn choose_node(
    fleet: &Fleet,
    ty: ContainerType,
    footprint: u64,
    forecast: &mut Forecast<'_>,
) -> Option<Placement> {
    reuse(fleet, ty)
        .or_else(|| allocate(fleet, footprint))
        .or_else(|| evict_then_allocate(fleet, footprint, forecast))
}

fn reuse(fleet: &Fleet, ty: ContainerType) -> Option<Placement> {
    fleet
        .nodes()
        .filter(|entry| entry.counts(ty).paused > 0)
        .find_map(|entry| {
            let container = entry.node().paused_of_type(ty).next()?;
            Some(Placement {
                node_id: entry.node().id(),
                action: Action::Reuse(container.id()),
            })
        })
}

fn allocate(fleet: &Fleet, footprint: u64) -> Option<Placement> {
    fleet
        .nodes()
        .find(|entry| entry.node().free_memory() >= footprint)
        .map(|entry| Placement {
            node_id: entry.node().id(),
            action: Action::Allocate,
        })
}

fn evict_then_allocate(
    fleet: &Fleet,
    footprint: u64,
    forecast: &mut Forecast<'_>,
) -> Option<Placement> {
    // Nothing to evict can help a node that is too small to begin with.
    let mut nodes = fleet
        .nodes()
        .filter(|entry| entry.node().capacity() >= footprint)
        .peekable();
    nodes.peek()?;

    let releaser = forecast.releaser();
    let forecast = forecast.get();

    nodes.find_map(|entry| {
        let victims = minimal_prefix(
            entry.node().free_memory(),
            footprint,
            releaser.candidates(entry, forecast),
        )?;
        Some(Placement {
            node_id: entry.node().id(),
            action: Action::EvictThenAllocate(victims),
        })
    })
}

/// Shortest leading run of `candidates` that lifts `free` to `footprint`.
fn minimal_prefix(free: u64, footprint: u64, candidates: Vec<&Container>) -> Option<Vec<ContainerId>> {
    let mut total = free;
    let mut victims = Vec::new();
    for candidate in candidates {
        if total >= footprint {
            break;
        }
        total += candidate.memory_used();
        victims.push(candidate.id());
    }
    (total >= footprint && !victims.is_empty()).then_some(victims)
}
