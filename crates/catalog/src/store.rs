//! The canonical in-memory catalog of one tab.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use storefront_core::{Product, dedupe_by_id};

use crate::snapshot::{CatalogSnapshot, SnapshotSource};

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Holds the latest accepted [`CatalogSnapshot`] and notifies listeners.
///
/// - `replace` absorbs structurally identical candidates as no-ops
/// - every accepted change bumps `version` by exactly one
/// - listeners run once per accepted change, after the lock is released, so a
///   listener may call [`CatalogStore::current`]
///
/// The store is shared by reference (`Arc<CatalogStore>`) between the change
/// bus, the mutation gateway and the rendering side.
pub struct CatalogStore {
    state: RwLock<CatalogSnapshot>,
    listeners: RwLock<Vec<Listener>>,
}

impl core::fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let current = self.current();
        f.debug_struct("CatalogStore")
            .field("version", &current.version())
            .field("source", &current.source())
            .field("products", &current.len())
            .finish()
    }
}

impl CatalogStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CatalogSnapshot::empty()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// The latest accepted snapshot (cheap: products are shared).
    pub fn current(&self) -> CatalogSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn version(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version()
    }

    /// Register a "catalog changed" callback.
    ///
    /// The callback receives nothing; it is expected to re-query.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Offer a candidate snapshot.
    ///
    /// Duplicate ids are dropped first (first occurrence wins). Returns
    /// `false` (and notifies nobody) when the resulting products equal the
    /// current ones.
    pub fn replace(&self, candidate: CatalogSnapshot) -> bool {
        let products = unique_products(&candidate);
        let accepted = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.same_products(&products) {
                None
            } else {
                let version = state.version() + 1;
                *state = CatalogSnapshot::stamped(Arc::clone(&products), version, candidate.source());
                Some(version)
            }
        };

        match accepted {
            Some(version) => {
                tracing::debug!(version, source = %candidate.source(), count = products.len(), "catalog replaced");
                self.notify();
                true
            }
            None => {
                tracing::trace!(source = %candidate.source(), "replace skipped, catalog unchanged");
                false
            }
        }
    }

    /// Replace the collection wholesale with an authoritative list.
    ///
    /// Always accepted; returns the new version. Duplicate ids are dropped
    /// (first occurrence wins).
    pub fn apply_patch(&self, products: Vec<Product>, source: SnapshotSource) -> u64 {
        let products = Arc::new(dedupe_by_id(products));
        let version = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let version = state.version() + 1;
            *state = CatalogSnapshot::stamped(products, version, source);
            version
        };

        tracing::debug!(version, source = %source, "catalog patched");
        self.notify();
        version
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener();
        }
    }
}

// Shares the candidate's list unless it has to be rebuilt.
fn unique_products(candidate: &CatalogSnapshot) -> Arc<Vec<Product>> {
    let mut seen = HashSet::with_capacity(candidate.len());
    if candidate.products().iter().all(|p| seen.insert(&p.id)) {
        return Arc::clone(candidate.shared_products());
    }
    Arc::new(dedupe_by_id(candidate.products().to_vec()))
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn products(ids: &[&str]) -> Vec<Product> {
        ids.iter().map(|id| Product::new(*id, *id, 1.0)).collect()
    }

    fn counting(store: &CatalogStore) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        store.on_change(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn starts_empty_at_version_zero() {
        let store = CatalogStore::new();
        let snap = store.current();
        assert_eq!(snap.version(), 0);
        assert_eq!(snap.source(), SnapshotSource::Empty);
        assert!(snap.is_empty());
    }

    #[test]
    fn identical_replace_notifies_once() {
        let store = CatalogStore::new();
        let renders = counting(&store);

        let a = CatalogSnapshot::candidate(products(&["p1", "p2"]), SnapshotSource::Remote);
        let b = CatalogSnapshot::candidate(products(&["p1", "p2"]), SnapshotSource::Remote);

        assert!(store.replace(a));
        assert!(!store.replace(b));
        assert_eq!(renders.load(Ordering::SeqCst), 1);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn identical_products_from_another_source_are_still_a_no_op() {
        let store = CatalogStore::new();
        store.replace(CatalogSnapshot::candidate(products(&["p1"]), SnapshotSource::Remote));
        assert!(!store.replace(CatalogSnapshot::candidate(products(&["p1"]), SnapshotSource::Cache)));
        assert_eq!(store.current().source(), SnapshotSource::Remote);
    }

    #[test]
    fn empty_candidate_on_empty_store_is_a_no_op() {
        let store = CatalogStore::new();
        assert!(!store.replace(CatalogSnapshot::candidate(Vec::new(), SnapshotSource::Empty)));
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn every_accepted_change_bumps_version_by_one() {
        let store = CatalogStore::new();
        let renders = counting(&store);

        store.replace(CatalogSnapshot::candidate(products(&["p1"]), SnapshotSource::Remote));
        let v = store.apply_patch(products(&["p1", "p2"]), SnapshotSource::Cache);
        store.replace(CatalogSnapshot::candidate(products(&["p2"]), SnapshotSource::Remote));

        assert_eq!(v, 2);
        assert_eq!(store.version(), 3);
        assert_eq!(renders.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn apply_patch_enforces_unique_ids() {
        let store = CatalogStore::new();
        let mut list = products(&["p1", "p2"]);
        list.push(Product::new("p1", "dupe", 5.0));

        store.apply_patch(list, SnapshotSource::Cache);
        let snap = store.current();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.products()[0].name, "p1");
    }

    #[test]
    fn replace_enforces_unique_ids() {
        let store = CatalogStore::new();
        let mut list = products(&["p1", "p2"]);
        list.insert(1, Product::new("p1", "shadow", 9.0));

        assert!(store.replace(CatalogSnapshot::candidate(list, SnapshotSource::Remote)));
        let snap = store.current();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.products()[0].name, "p1");
        assert_eq!(snap.products()[1].id, "p2");

        // Equal once deduplicated: no second change.
        let mut again = products(&["p1", "p2"]);
        again.push(Product::new("p2", "late", 1.0));
        assert!(!store.replace(CatalogSnapshot::candidate(again, SnapshotSource::Remote)));
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn listener_sees_updated_state_and_may_reenter() {
        let store = Arc::new(CatalogStore::new());
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let store2 = Arc::downgrade(&store);
            let seen = seen.clone();
            store.on_change(move || {
                if let Some(s) = store2.upgrade() {
                    seen.store(s.current().len(), Ordering::SeqCst);
                }
            });
        }

        store.apply_patch(products(&["a", "b", "c"]), SnapshotSource::Cache);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
