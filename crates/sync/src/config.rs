//! Engine configuration: defaults, overlaid by `STOREFRONT_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CATALOG_KEY: &str = "storefront.catalog";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the catalog API (`GET {api_url}/products`).
    pub api_url: String,
    /// Last-resort endpoint, fetched directly when the API and cache are empty.
    pub fallback_url: String,
    /// Storage key the catalog document lives under.
    pub catalog_key: String,
    pub poll_interval_secs: u64,
    pub reconcile_delay_ms: u64,
    pub response_cache_ttl_secs: u64,
    /// SQLite file backing the profile storage. `None` keeps storage in memory.
    pub storage_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api".to_string(),
            fallback_url: "http://localhost:8080/api/products".to_string(),
            catalog_key: DEFAULT_CATALOG_KEY.to_string(),
            poll_interval_secs: 30,
            reconcile_delay_ms: 1_500,
            response_cache_ttl_secs: 10,
            storage_path: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns.
    ///
    /// Malformed numbers are logged and the default is kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("STOREFRONT_API_URL") {
            config.api_url = v;
        }
        if let Some(v) = lookup("STOREFRONT_FALLBACK_URL") {
            config.fallback_url = v;
        }
        if let Some(v) = lookup("STOREFRONT_CATALOG_KEY") {
            config.catalog_key = v;
        }
        if let Some(v) = lookup("STOREFRONT_STORAGE_PATH") {
            config.storage_path = Some(PathBuf::from(v));
        }

        overlay_u64(&lookup, "STOREFRONT_POLL_INTERVAL_SECS", &mut config.poll_interval_secs);
        overlay_u64(&lookup, "STOREFRONT_RECONCILE_DELAY_MS", &mut config.reconcile_delay_ms);
        overlay_u64(
            &lookup,
            "STOREFRONT_RESPONSE_CACHE_TTL_SECS",
            &mut config.response_cache_ttl_secs,
        );

        config
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero period would make the poll timer spin.
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn reconcile_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile_delay_ms)
    }

    pub fn response_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.response_cache_ttl_secs)
    }

    /// `storage_path`, or a `storefront/profile.db` file under the user's data dir.
    pub fn storage_path_or_default(&self) -> Option<PathBuf> {
        self.storage_path.clone().or_else(|| {
            dirs::data_local_dir().map(|dir| dir.join("storefront").join("profile.db"))
        })
    }
}

fn overlay_u64<F>(lookup: &F, name: &str, slot: &mut u64)
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse::<u64>() {
        Ok(v) => *slot = v,
        Err(err) => tracing::warn!(var = name, value = %raw, error = %err, "ignoring malformed setting"),
    }
}
