use std::sync::Arc;

use serde::{Deserialize, Serialize};

use storefront_core::Product;

/// Where the products of a snapshot came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Remote,
    Cache,
    Empty,
}

impl SnapshotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotSource::Remote => "remote",
            SnapshotSource::Cache => "cache",
            SnapshotSource::Empty => "empty",
        }
    }
}

impl core::fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable view of the catalog at one point in time.
///
/// `version` strictly increases with every snapshot the store accepts, so
/// consumers can detect staleness without comparing products. Snapshots
/// produced outside the store (resolver results) are *candidates* and carry
/// version `0` until the store stamps them.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSnapshot {
    products: Arc<Vec<Product>>,
    version: u64,
    source: SnapshotSource,
}

impl CatalogSnapshot {
    /// The initial snapshot of every store.
    pub fn empty() -> Self {
        Self {
            products: Arc::new(Vec::new()),
            version: 0,
            source: SnapshotSource::Empty,
        }
    }

    /// An unversioned snapshot, ready to be offered to the store.
    pub fn candidate(products: Vec<Product>, source: SnapshotSource) -> Self {
        Self {
            products: Arc::new(products),
            version: 0,
            source,
        }
    }

    pub(crate) fn stamped(products: Arc<Vec<Product>>, version: u64, source: SnapshotSource) -> Self {
        Self {
            products,
            version,
            source,
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub(crate) fn shared_products(&self) -> &Arc<Vec<Product>> {
        &self.products
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn source(&self) -> SnapshotSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Structural equality of the product lists (order included).
    pub fn same_products(&self, other: &[Product]) -> bool {
        self.products.as_slice() == other
    }

    pub fn contains(&self, id: &str) -> bool {
        self.products.iter().any(|p| p.id == id)
    }
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
