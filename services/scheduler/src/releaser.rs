//! Eviction-candidate policy.
//!
//! A paused container is safe to evict when its type is absent from the
//! predictor's forecast. Presence in the forecast protects every paused
//! container of that type, however many there are.
//!
//! Candidates are returned in ascending container id order (oldest first).
//! The scheduler evicts the shortest leading prefix that frees enough
//! memory, so this order decides which containers survive.

use std::collections::BTreeSet;
use std::sync::Arc;

use fcas_id::NodeId;

use crate::catalog::ContainerType;
use crate::container::Container;
use crate::error::FleetResult;
use crate::predictor::Predictor;
use crate::tracker::{NodeEntry, Tracker};

pub struct Releaser {
    predictor: Arc<dyn Predictor>,
}

impl Releaser {
    pub fn new(predictor: Arc<dyn Predictor>) -> Self {
        Self { predictor }
    }

    /// Fetch the current forecast.
    pub fn forecast(&self) -> BTreeSet<ContainerType> {
        self.predictor.predict()
    }

    /// Eviction candidates on one node, given a forecast.
    pub fn candidates<'a>(
        &self,
        entry: &'a NodeEntry,
        forecast: &BTreeSet<ContainerType>,
    ) -> Vec<&'a Container> {
        let evictable: BTreeSet<ContainerType> = entry
            .inventory()
            .iter()
            .filter(|(ty, counts)| counts.paused > 0 && !forecast.contains(ty))
            .map(|(ty, _)| *ty)
            .collect();

        if evictable.is_empty() {
            return Vec::new();
        }

        entry
            .node()
            .containers()
            .filter(|c| c.is_paused() && evictable.contains(&c.container_type()))
            .collect()
    }

    /// Paused containers on `node_id` that are currently safe to evict.
    pub fn list_released(&self, tracker: &Tracker, node_id: NodeId) -> FleetResult<Vec<Container>> {
        let forecast = self.forecast();
        let fleet = tracker.read();
        let entry = fleet.node(node_id)?;
        let released = self
            .candidates(entry, &forecast)
            .into_iter()
            .cloned()
            .collect();
        Ok(released)
    }
}

/// Lazily fetched forecast, shared across one evaluation.
///
/// The predictor is called at most once, and only if eviction is actually
/// considered.
pub(crate) struct Forecast<'a> {
    releaser: &'a Releaser,
    cached: Option<BTreeSet<ContainerType>>,
}

impl<'a> Forecast<'a> {
    pub(crate) fn new(releaser: &'a Releaser) -> Self {
        Self {
            releaser,
            cached: None,
        }
    }

    pub(crate) fn releaser(&self) -> &'a Releaser {
        self.releaser
    }

    pub(crate) fn get(&mut self) -> &BTreeSet<ContainerType> {
        self.cached.get_or_insert_with(|| self.releaser.forecast())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::predictor::StaticPredictor;
    use crate::reporter::LogReporter;
    use fcas_id::ContainerId;

    const T0: ContainerType = ContainerType::new(0);
    const T1: ContainerType = ContainerType::new(1);

    fn setup() -> (Tracker, NodeId) {
        let tracker = Tracker::new(Catalog::default(), Arc::new(LogReporter));
        let node = NodeId::new(1);
        tracker.register_node(node, 16384).unwrap();
        (tracker, node)
    }

    fn ids(containers: &[Container]) -> Vec<ContainerId> {
        containers.iter().map(Container::id).collect()
    }

    #[test]
    fn test_forecast_protects_type() {
        let (tracker, node) = setup();
        let a = tracker.create_container(node, T0).unwrap();
        let b = tracker.create_container(node, T1).unwrap();
        let c = tracker.create_container(node, T0).unwrap();

        let releaser = Releaser::new(Arc::new(StaticPredictor::new([T1])));
        let released = releaser.list_released(&tracker, node).unwrap();
        assert_eq!(ids(&released), vec![a.id(), c.id()]);
        assert!(!ids(&released).contains(&b.id()));
    }

    #[test]
    fn test_running_containers_never_candidates() {
        let (tracker, node) = setup();
        let a = tracker.create_container(node, T0).unwrap();
        let b = tracker.create_container(node, T0).unwrap();
        tracker.reuse_container(node, a.id()).unwrap();

        let releaser = Releaser::new(Arc::new(StaticPredictor::empty()));
        let released = releaser.list_released(&tracker, node).unwrap();
        assert_eq!(ids(&released), vec![b.id()]);
    }

    #[test]
    fn test_everything_forecast_means_nothing_released() {
        let (tracker, node) = setup();
        tracker.create_container(node, T0).unwrap();
        tracker.create_container(node, T1).unwrap();

        let releaser = Releaser::new(Arc::new(StaticPredictor::new([T0, T1])));
        assert!(releaser.list_released(&tracker, node).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_node() {
        let (tracker, _) = setup();
        let releaser = Releaser::new(Arc::new(StaticPredictor::empty()));
        assert!(
            releaser
                .list_released(&tracker, NodeId::new(99))
                .unwrap_err()
                .is_unknown_entity()
        );
    }

    #[test]
    fn test_forecast_fetched_once() {
        struct Counting(std::sync::atomic::AtomicUsize);
        impl Predictor for Counting {
            fn predict(&self) -> BTreeSet<ContainerType> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                BTreeSet::new()
            }
        }

        let predictor = Arc::new(Counting(Default::default()));
        let releaser = Releaser::new(predictor.clone());
        let mut forecast = Forecast::new(&releaser);
        assert_eq!(predictor.0.load(std::sync::atomic::Ordering::SeqCst), 0);
        forecast.get();
        forecast.get();
        assert_eq!(predictor.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
