//! Where a tab's catalog comes from: API, then cache, then fallback endpoint.

use std::sync::Arc;

use serde_json::Value;

use storefront_catalog::{CatalogSnapshot, SnapshotSource};
use storefront_core::{CatalogResult, IngestionLedger, Product, normalize_records};

use crate::api::CatalogApi;
use crate::cache::CatalogCache;

/// Produces candidate snapshots for the store. Never fails.
///
/// Each step runs only when the previous one errored or yielded no products:
///
/// 1. remote API (on success the list is written through to the cache)
/// 2. profile cache
/// 3. direct fetch of the fallback endpoint
/// 4. an empty snapshot; nothing is synthesized
///
/// A non-empty API list is authoritative: ingestion stamps of ids it no
/// longer carries are dropped from the profile's ledger.
pub struct SourceResolver {
    api: Arc<dyn CatalogApi>,
    cache: CatalogCache,
    ledger: Arc<IngestionLedger>,
}

impl SourceResolver {
    pub fn new(api: Arc<dyn CatalogApi>, cache: CatalogCache, ledger: Arc<IngestionLedger>) -> Self {
        Self { api, cache, ledger }
    }

    pub async fn load(&self) -> CatalogSnapshot {
        let snapshot = self.resolve().await;
        tracing::info!(
            tab = %self.cache.storage().tab_id(),
            source = %snapshot.source(),
            count = snapshot.len(),
            "catalog resolved"
        );
        snapshot
    }

    async fn resolve(&self) -> CatalogSnapshot {
        match self.normalized(self.api.get_products().await) {
            Ok(products) if !products.is_empty() => {
                self.ledger.retain_only(&products);
                self.write_through(&products).await;
                return CatalogSnapshot::candidate(products, SnapshotSource::Remote);
            }
            Ok(_) => tracing::debug!("remote API returned no products, trying cache"),
            Err(err) => tracing::warn!(error = %err, "remote API unavailable, trying cache"),
        }

        match self.normalized(self.cache.read_records().await) {
            Ok(products) if !products.is_empty() => {
                return CatalogSnapshot::candidate(products, SnapshotSource::Cache);
            }
            Ok(_) => tracing::debug!(key = %self.cache.key(), "cache empty, trying fallback endpoint"),
            Err(err) => tracing::warn!(error = %err, "cache unreadable, trying fallback endpoint"),
        }

        match self.normalized(self.api.fetch_direct().await) {
            Ok(products) if !products.is_empty() => {
                return CatalogSnapshot::candidate(products, SnapshotSource::Remote);
            }
            Ok(_) => tracing::debug!("fallback endpoint returned no products"),
            Err(err) => tracing::warn!(error = %err, "fallback endpoint unavailable"),
        }

        CatalogSnapshot::candidate(Vec::new(), SnapshotSource::Empty)
    }

    fn normalized(&self, records: CatalogResult<Vec<Value>>) -> CatalogResult<Vec<Product>> {
        records.map(|raws| normalize_records(&raws, &self.ledger))
    }

    async fn write_through(&self, products: &[Product]) {
        if let Err(err) = self.cache.write_products(products).await {
            tracing::warn!(error = %err, "failed to write catalog through to cache");
        }
    }
}
