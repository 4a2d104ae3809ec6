//! The catalog document in profile storage.
//!
//! Stored under one key as `{ "products": [...], ...other app state }`. The
//! other fields belong to other parts of the storefront and are preserved on
//! every write.

use serde_json::{Map, Value};

use storefront_core::{CatalogError, CatalogResult, Product};

use crate::storage::TabStorage;

const PRODUCTS_FIELD: &str = "products";

#[derive(Debug, Clone)]
pub struct CatalogCache {
    storage: TabStorage,
    key: String,
}

impl CatalogCache {
    pub fn new(storage: TabStorage, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage(&self) -> &TabStorage {
        &self.storage
    }

    /// Raw product records, unnormalized. Missing document → empty.
    pub async fn read_records(&self) -> CatalogResult<Vec<Value>> {
        let mut document = self.read_document().await?;
        match document.remove(PRODUCTS_FIELD) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(records)) => Ok(records),
            Some(other) => Err(CatalogError::cache_corrupt(format!(
                "`{PRODUCTS_FIELD}` is not an array: {}",
                type_name(&other)
            ))),
        }
    }

    /// Persist `products` as the full catalog.
    ///
    /// Returns `false` without writing (and without announcing anything to
    /// other tabs) when the stored list is already equal.
    pub async fn write_products(&self, products: &[Product]) -> CatalogResult<bool> {
        let mut document = match self.read_document().await {
            Ok(document) => document,
            Err(CatalogError::CacheCorrupt(reason)) => {
                tracing::warn!(key = %self.key, %reason, "overwriting corrupt catalog document");
                Map::new()
            }
            Err(err) => return Err(err),
        };

        let encoded = serde_json::to_value(products)
            .map_err(|err| CatalogError::storage(format!("encode products: {err}")))?;
        if document.get(PRODUCTS_FIELD) == Some(&encoded) {
            tracing::trace!(key = %self.key, "cached catalog already up to date");
            return Ok(false);
        }
        document.insert(PRODUCTS_FIELD.to_string(), encoded);

        let body = serde_json::to_string(&document)
            .map_err(|err| CatalogError::storage(format!("encode document: {err}")))?;
        self.storage.set(&self.key, &body).await?;

        tracing::debug!(key = %self.key, count = products.len(), "catalog cached");
        Ok(true)
    }

    async fn read_document(&self) -> CatalogResult<Map<String, Value>> {
        let Some(raw) = self.storage.get(&self.key).await? else {
            return Ok(Map::new());
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(document)) => Ok(document),
            // An older layout stored the bare list.
            Ok(Value::Array(records)) => {
                let mut document = Map::new();
                document.insert(PRODUCTS_FIELD.to_string(), Value::Array(records));
                Ok(document)
            }
            Ok(other) => Err(CatalogError::cache_corrupt(format!(
                "catalog document is {}",
                type_name(&other)
            ))),
            Err(err) => Err(CatalogError::cache_corrupt(err.to_string())),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::storage::{BrowserProfile, InMemoryBackend};

    const KEY: &str = "storefront.catalog";

    fn cache_with(raw: Option<&str>) -> CatalogCache {
        let backend = match raw {
            Some(raw) => InMemoryBackend::new().with_entry(KEY, raw),
            None => InMemoryBackend::new(),
        };
        let profile = BrowserProfile::new(Arc::new(backend));
        CatalogCache::new(profile.open_tab(), KEY)
    }

    #[tokio::test]
    async fn missing_document_reads_as_empty() {
        assert!(cache_with(None).read_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_json_is_cache_corrupt() {
        let err = cache_with(Some("{not json")).read_records().await.unwrap_err();
        assert!(matches!(err, CatalogError::CacheCorrupt(_)));

        let err = cache_with(Some(r#"{"products": 3}"#)).read_records().await.unwrap_err();
        assert!(matches!(err, CatalogError::CacheCorrupt(_)));
    }

    #[tokio::test]
    async fn write_preserves_unrelated_fields() {
        let cache = cache_with(Some(r#"{"cart":["p9"],"products":[]}"#));
        let wrote = cache
            .write_products(&[Product::new("p1", "Phone", 10.0)])
            .await
            .unwrap();
        assert!(wrote);

        let raw = cache.storage().get(KEY).await.unwrap().unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["cart"], json!(["p9"]));
        assert_eq!(doc["products"][0]["id"], json!("p1"));
    }

    #[tokio::test]
    async fn unchanged_list_is_not_rewritten_or_announced() {
        let cache = cache_with(None);
        let products = vec![Product::new("p1", "Phone", 10.0)];
        let mut events = cache.storage().subscribe();

        assert!(cache.write_products(&products).await.unwrap());
        assert!(!cache.write_products(&products).await.unwrap());

        assert!(events.try_recv().is_ok());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn corrupt_document_is_replaced_on_write() {
        let cache = cache_with(Some("][garbage"));
        assert!(cache.write_products(&[Product::new("p1", "x", 1.0)]).await.unwrap());
        assert_eq!(cache.read_records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bare_list_layout_is_accepted() {
        let cache = cache_with(Some(r#"[{"id":"p1"},{"id":"p2"}]"#));
        assert_eq!(cache.read_records().await.unwrap().len(), 2);
    }
}
