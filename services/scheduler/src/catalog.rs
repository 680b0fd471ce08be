//! Static lookup from container type to memory footprint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{FleetError, FleetResult};

/// Identifies a kind of container; every container of a type has the same footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerType(u64);

impl ContainerType {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ContainerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors building a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("container type {0} has a zero footprint")]
    ZeroFootprint(ContainerType),

    #[error("container type {0} listed twice")]
    Duplicate(ContainerType),
}

/// Immutable table of container type footprints, in MB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    footprints: BTreeMap<ContainerType, u64>,
}

impl Catalog {
    /// Build a catalog from `(type, footprint_mb)` pairs.
    ///
    /// Zero footprints are rejected: a container must reserve memory.
    pub fn new(
        entries: impl IntoIterator<Item = (ContainerType, u64)>,
    ) -> Result<Self, CatalogError> {
        let mut footprints = BTreeMap::new();
        for (ty, footprint) in entries {
            if footprint == 0 {
                return Err(CatalogError::ZeroFootprint(ty));
            }
            if footprints.insert(ty, footprint).is_some() {
                return Err(CatalogError::Duplicate(ty));
            }
        }
        Ok(Self { footprints })
    }

    /// Memory reserved by one container of `ty`.
    pub fn footprint(&self, ty: ContainerType) -> FleetResult<u64> {
        self.footprints
            .get(&ty)
            .copied()
            .ok_or(FleetError::UnknownContainerType(ty))
    }

    /// All known types, ascending.
    pub fn types(&self) -> impl Iterator<Item = ContainerType> + '_ {
        self.footprints.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            footprints: BTreeMap::from([
                (ContainerType(0), 1024),
                (ContainerType(1), 2048),
                (ContainerType(2), 4096),
                (ContainerType(3), 8192),
            ]),
        }
    }
}
