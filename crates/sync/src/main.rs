//! `catalog-sync`: runs one headless tab against a live catalog API and logs
//! every catalog change.

use std::sync::Arc;

use anyhow::Context;

use storefront_catalog::projection;
use storefront_sync::{
    BrowserProfile, CatalogEngine, EngineConfig, HttpCatalogApi, InMemoryBackend, SqliteBackend,
    StorageBackend,
};

const TRENDING_LIMIT: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_observability::init();

    let config = EngineConfig::from_env();
    tracing::info!(api_url = %config.api_url, catalog_key = %config.catalog_key, "starting catalog-sync");

    let backend: Arc<dyn StorageBackend> = match config.storage_path_or_default() {
        Some(path) => {
            tracing::info!(path = %path.display(), "using SQLite profile storage");
            Arc::new(SqliteBackend::open(path))
        }
        None => {
            tracing::warn!("no data directory available, profile storage is in memory");
            Arc::new(InMemoryBackend::new())
        }
    };
    let profile = BrowserProfile::new(backend);

    let api = Arc::new(HttpCatalogApi::new(
        &config.api_url,
        config.fallback_url.clone(),
        config.response_cache_ttl(),
    ));

    let engine = CatalogEngine::start(&config, api, profile.open_tab()).await;

    let store = Arc::downgrade(engine.store());
    engine.store().on_change(move || {
        let Some(store) = store.upgrade() else {
            return;
        };
        let snapshot = store.current();
        let products = snapshot.products();
        tracing::info!(
            version = snapshot.version(),
            source = %snapshot.source(),
            count = products.len(),
            featured = projection::featured(products).len(),
            trending = projection::trending(products, TRENDING_LIMIT).len(),
            categories = projection::categories(products).len(),
            "catalog changed"
        );
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    engine.shutdown().await;
    Ok(())
}
