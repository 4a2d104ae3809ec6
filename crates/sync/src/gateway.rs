//! Admin-editor writes to the catalog.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use storefront_catalog::{CatalogStore, SnapshotSource};
use storefront_core::{CatalogError, CatalogResult, Product, ProductDraft, ProductPatch};
use storefront_events::{EditorAnnouncement, EventBus, InMemoryEventBus};

use crate::api::CatalogApi;
use crate::cache::CatalogCache;

/// Applies add/update/remove to the working list of a tab.
///
/// Every accepted mutation persists the full list to the profile cache (other
/// tabs pick it up from there), patches the store and announces the new list
/// on the tab's editor bus. A rejected mutation touches none of them.
///
/// Mutations run one at a time: each reads the working list and commits its
/// edit of it while holding `writer`.
pub struct MutationGateway {
    store: Arc<CatalogStore>,
    cache: CatalogCache,
    api: Arc<dyn CatalogApi>,
    editor: Arc<InMemoryEventBus<EditorAnnouncement>>,
    reconcile_delay: Duration,
    writer: Mutex<()>,
}

impl MutationGateway {
    pub fn new(
        store: Arc<CatalogStore>,
        cache: CatalogCache,
        api: Arc<dyn CatalogApi>,
        editor: Arc<InMemoryEventBus<EditorAnnouncement>>,
        reconcile_delay: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            api,
            editor,
            reconcile_delay,
            writer: Mutex::new(()),
        }
    }

    /// Validate `draft` and append it. Returns the stored product.
    pub async fn add(&self, draft: ProductDraft) -> CatalogResult<Product> {
        let product = draft.into_product(Utc::now())?;
        let _writer = self.writer.lock().await;
        let current = self.store.current();
        if current.contains(product.id.as_str()) {
            return Err(CatalogError::rejected(format!(
                "product {} already exists",
                product.id
            )));
        }

        let mut products = current.products().to_vec();
        products.push(product.clone());
        let version = self.commit(products).await?;

        tracing::info!(id = %product.id, version, "product added");
        Ok(product)
    }

    /// Apply `patch` to product `id`. Returns the updated product.
    pub async fn update(&self, id: &str, patch: ProductPatch) -> CatalogResult<Product> {
        let _writer = self.writer.lock().await;
        let current = self.store.current();
        let index = position(current.products(), id)?;
        let updated = patch.apply_to(&current.products()[index], Utc::now())?;

        let mut products = current.products().to_vec();
        products[index] = updated.clone();
        let version = self.commit(products).await?;

        tracing::info!(id, version, "product updated");
        Ok(updated)
    }

    /// Remove product `id` and schedule a reconcile with the server.
    pub async fn remove(&self, id: &str) -> CatalogResult<Product> {
        let removed = {
            let _writer = self.writer.lock().await;
            let current = self.store.current();
            let index = position(current.products(), id)?;

            let mut products = current.products().to_vec();
            let removed = products.remove(index);
            let version = self.commit(products).await?;
            tracing::info!(id, version, "product removed");
            removed
        };

        self.api.invalidate_cache().await;
        self.schedule_reconcile();
        Ok(removed)
    }

    async fn commit(&self, products: Vec<Product>) -> CatalogResult<u64> {
        // Persist first: a failing write must leave the store as it was.
        self.cache.write_products(&products).await?;
        let version = self.store.apply_patch(products.clone(), SnapshotSource::Cache);

        if let Err(err) = self.editor.publish(EditorAnnouncement::with_products(products)) {
            tracing::warn!(error = ?err, "failed to announce catalog change");
        }
        Ok(version)
    }

    // Delivered as a payload-less announcement so it is serialized with
    // every other signal on the change bus.
    fn schedule_reconcile(&self) {
        let editor = Arc::clone(&self.editor);
        let delay = self.reconcile_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!(?delay, "requesting reconcile after remove");
            if let Err(err) = editor.publish(EditorAnnouncement::reload()) {
                tracing::warn!(error = ?err, "failed to request reconcile");
            }
        });
    }
}

fn position(products: &[Product], id: &str) -> CatalogResult<usize> {
    products
        .iter()
        .position(|p| p.id == id)
        .ok_or_else(|| CatalogError::rejected(format!("unknown product {id}")))
}
