//! Demand forecast interface.
//!
//! The forecasting algorithm is external. The releaser treats the predictor
//! as an opaque oracle: the set it returns names the container types that
//! should not be evicted right now.

use std::collections::BTreeSet;

use parking_lot::RwLock;

use crate::catalog::ContainerType;

/// Forecasts which container types will be needed soon.
///
/// Called while scheduling decisions are being made, so implementations
/// must answer from memory without blocking.
pub trait Predictor: Send + Sync {
    fn predict(&self) -> BTreeSet<ContainerType>;
}

/// Predictor returning a fixed, replaceable forecast.
#[derive(Debug, Default)]
pub struct StaticPredictor {
    forecast: RwLock<BTreeSet<ContainerType>>,
}

impl StaticPredictor {
    pub fn new(forecast: impl IntoIterator<Item = ContainerType>) -> Self {
        Self {
            forecast: RwLock::new(forecast.into_iter().collect()),
        }
    }

    /// Forecast nothing; every paused container becomes evictable.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set(&self, forecast: impl IntoIterator<Item = ContainerType>) {
        *self.forecast.write() = forecast.into_iter().collect();
    }
}

impl Predictor for StaticPredictor {
    fn predict(&self) -> BTreeSet<ContainerType> {
        self.forecast.read().clone()
    }
}
