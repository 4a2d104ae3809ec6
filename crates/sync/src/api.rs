//! Remote catalog API client.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use storefront_core::{CatalogError, CatalogResult};

/// The server side of the catalog.
///
/// Records are returned raw; the resolver normalizes them.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Full product list, possibly served from a client-side response cache.
    async fn get_products(&self) -> CatalogResult<Vec<Value>>;

    /// Drop any cached response so the next `get_products` hits the server.
    async fn invalidate_cache(&self);

    /// One request to the fallback endpoint, bypassing every cache.
    async fn fetch_direct(&self) -> CatalogResult<Vec<Value>>;
}

/// Accept `{ "products": [...] }` or a bare array.
pub fn parse_products_payload(body: Value) -> CatalogResult<Vec<Value>> {
    match body {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => match map.remove("products") {
            Some(Value::Array(records)) => Ok(records),
            Some(_) => Err(CatalogError::source_unavailable("`products` is not an array")),
            None => Err(CatalogError::source_unavailable("payload has no `products` field")),
        },
        _ => Err(CatalogError::source_unavailable("payload is neither an object nor an array")),
    }
}

/// A simulated server for tests and offline development.
#[derive(Debug, Default)]
pub struct InMemoryCatalogApi {
    records: RwLock<Vec<Value>>,
    fallback: RwLock<Option<Vec<Value>>>,
    outage: AtomicBool,
    latency: RwLock<Option<Duration>>,
    get_calls: AtomicUsize,
    direct_calls: AtomicUsize,
    invalidations: AtomicUsize,
}

impl InMemoryCatalogApi {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Self::default()
        }
    }

    pub fn set_records(&self, records: Vec<Value>) {
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = records;
    }

    /// Server-side delete. Returns whether a record with that id existed.
    pub fn remove_record(&self, id: &str) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|r| r.get("id").and_then(Value::as_str) != Some(id));
        records.len() != before
    }

    /// Records served by the fallback endpoint. Unset: same as `get_products`.
    pub fn set_fallback_records(&self, records: Vec<Value>) {
        *self.fallback.write().unwrap_or_else(PoisonError::into_inner) = Some(records);
    }

    /// While down, both endpoints fail with `SourceUnavailable`.
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write().unwrap_or_else(PoisonError::into_inner) = Some(latency);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn direct_calls(&self) -> usize {
        self.direct_calls.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    async fn respond(&self, records: Vec<Value>) -> CatalogResult<Vec<Value>> {
        let latency = *self.latency.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.outage.load(Ordering::SeqCst) {
            return Err(CatalogError::source_unavailable("simulated outage"));
        }
        Ok(records)
    }
}

#[async_trait]
impl CatalogApi for InMemoryCatalogApi {
    async fn get_products(&self) -> CatalogResult<Vec<Value>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner).clone();
        self.respond(records).await
    }

    async fn invalidate_cache(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    async fn fetch_direct(&self) -> CatalogResult<Vec<Value>> {
        self.direct_calls.fetch_add(1, Ordering::SeqCst);
        let records = self
            .fallback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.records.read().unwrap_or_else(PoisonError::into_inner).clone());
        self.respond(records).await
    }
}

/// Last `get_products` response, served again until it is `ttl` old.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entry: Option<(Instant, Vec<Value>)>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached records, unless missing or expired.
    pub fn fresh(&self) -> Option<&[Value]> {
        match &self.entry {
            Some((at, records)) if at.elapsed() < self.ttl => Some(records),
            _ => None,
        }
    }

    pub fn store(&mut self, records: Vec<Value>) {
        self.entry = Some((Instant::now(), records));
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}

#[cfg(feature = "http")]
pub use http::HttpCatalogApi;

#[cfg(feature = "http")]
mod http {
    use tokio::sync::Mutex;

    use super::*;

    /// `reqwest` client with a short-lived response cache for `get_products`.
    #[derive(Debug)]
    pub struct HttpCatalogApi {
        client: reqwest::Client,
        products_url: String,
        fallback_url: String,
        cached: Mutex<ResponseCache>,
    }

    impl HttpCatalogApi {
        pub fn new(api_url: &str, fallback_url: impl Into<String>, ttl: Duration) -> Self {
            Self {
                client: reqwest::Client::new(),
                products_url: format!("{}/products", api_url.trim_end_matches('/')),
                fallback_url: fallback_url.into(),
                cached: Mutex::new(ResponseCache::new(ttl)),
            }
        }

        async fn fetch(&self, url: &str) -> CatalogResult<Vec<Value>> {
            let resp = self
                .client
                .get(url)
                .header(reqwest::header::CACHE_CONTROL, "no-cache")
                .send()
                .await
                .map_err(|e| CatalogError::source_unavailable(format!("network error: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(CatalogError::source_unavailable(format!(
                    "API error ({}): {body}",
                    status.as_u16()
                )));
            }

            let body: Value = resp
                .json()
                .await
                .map_err(|e| CatalogError::source_unavailable(format!("parse error: {e}")))?;
            parse_products_payload(body)
        }
    }

    #[async_trait]
    impl CatalogApi for HttpCatalogApi {
        async fn get_products(&self) -> CatalogResult<Vec<Value>> {
            // Held across the request so concurrent callers share one fetch.
            let mut cached = self.cached.lock().await;
            if let Some(records) = cached.fresh() {
                tracing::trace!(url = %self.products_url, "serving cached response");
                return Ok(records.to_vec());
            }

            let records = self.fetch(&self.products_url).await?;
            cached.store(records.clone());
            Ok(records)
        }

        async fn invalidate_cache(&self) {
            self.cached.lock().await.clear();
        }

        async fn fetch_direct(&self) -> CatalogResult<Vec<Value>> {
            self.fetch(&self.fallback_url).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_accepts_wrapped_and_bare_lists() {
        let wrapped = parse_products_payload(json!({"products": [{"id": "p1"}], "total": 1})).unwrap();
        let bare = parse_products_payload(json!([{"id": "p1"}])).unwrap();
        assert_eq!(wrapped, bare);
    }

    #[test]
    fn malformed_payloads_are_source_unavailable() {
        for body in [json!({"items": []}), json!({"products": {}}), json!("oops")] {
            let err = parse_products_payload(body).unwrap_err();
            assert!(matches!(err, CatalogError::SourceUnavailable(_)));
        }
    }

    #[tokio::test]
    async fn outage_fails_both_endpoints_and_counts_calls() {
        let api = InMemoryCatalogApi::new(vec![json!({"id": "p1"})]);
        assert_eq!(api.get_products().await.unwrap().len(), 1);

        api.set_outage(true);
        assert!(api.get_products().await.is_err());
        assert!(api.fetch_direct().await.is_err());

        assert_eq!(api.get_calls(), 2);
        assert_eq!(api.direct_calls(), 1);
    }

    #[tokio::test]
    async fn fallback_records_are_independent() {
        let api = InMemoryCatalogApi::new(Vec::new());
        api.set_fallback_records(vec![json!({"id": "f1"})]);

        assert!(api.get_products().await.unwrap().is_empty());
        assert_eq!(api.fetch_direct().await.unwrap(), vec![json!({"id": "f1"})]);
    }

    #[test]
    fn remove_record_reports_existence() {
        let api = InMemoryCatalogApi::new(vec![json!({"id": "p1"}), json!({"id": "p2"})]);
        assert!(api.remove_record("p1"));
        assert!(!api.remove_record("p1"));
    }

    #[tokio::test(start_paused = true)]
    async fn response_cache_expires_after_ttl() {
        let mut cache = ResponseCache::new(Duration::from_secs(10));
        assert!(cache.fresh().is_none());

        cache.store(vec![json!({"id": "p1"})]);
        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.fresh().map(<[Value]>::len), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.fresh().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_response_cache_misses_within_ttl() {
        let mut cache = ResponseCache::new(Duration::from_secs(10));
        cache.store(vec![json!({"id": "p1"})]);
        cache.clear();
        assert!(cache.fresh().is_none());

        cache.store(Vec::new());
        assert_eq!(cache.fresh(), Some(&[][..]));
    }

    #[test]
    fn zero_ttl_never_serves_from_cache() {
        let mut cache = ResponseCache::new(Duration::ZERO);
        cache.store(vec![json!({"id": "p1"})]);
        assert!(cache.fresh().is_none());
    }
}
