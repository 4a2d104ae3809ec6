//! Key-value storage shared by every tab of a browser profile.
//!
//! A [`BrowserProfile`] owns one [`StorageBackend`] and a bus of
//! [`StorageEvent`]s. Each tab gets a [`TabStorage`] handle; every write made
//! through it is announced to all tabs, tagged with the writer's [`TabId`].
//! Writers do read-modify-write without a lock: last writer wins.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use storefront_core::{CatalogError, CatalogResult, IngestionLedger, TabId};
use storefront_events::{EventBus, InMemoryEventBus, StorageEvent, Subscription};

/// Raw string storage (the moral equivalent of `localStorage`).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Volatile backend for tests and single-process demos.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value without announcing it (e.g. a document left by a
    /// previous session).
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Everything the tabs of one profile share.
pub struct BrowserProfile {
    backend: Arc<dyn StorageBackend>,
    events: InMemoryEventBus<StorageEvent>,
    ledger: Arc<IngestionLedger>,
}

impl core::fmt::Debug for BrowserProfile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BrowserProfile")
            .field("tabs_listening", &self.events.subscriber_count())
            .field("ingested_ids", &self.ledger.len())
            .finish()
    }
}

impl BrowserProfile {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            events: InMemoryEventBus::new(),
            ledger: Arc::new(IngestionLedger::new()),
        })
    }

    pub fn in_memory() -> Arc<Self> {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    /// A storage handle for a newly opened tab.
    pub fn open_tab(self: &Arc<Self>) -> TabStorage {
        let tab = TabStorage {
            tab: TabId::new(),
            profile: Arc::clone(self),
        };
        tracing::debug!(tab = %tab.tab, "tab opened");
        tab
    }

    /// Ingestion stamps shared by every tab, so tabs normalizing the same
    /// untimestamped records agree on the result.
    pub fn ledger(&self) -> Arc<IngestionLedger> {
        Arc::clone(&self.ledger)
    }
}

/// One tab's view of the profile storage.
#[derive(Debug, Clone)]
pub struct TabStorage {
    tab: TabId,
    profile: Arc<BrowserProfile>,
}

impl TabStorage {
    pub fn tab_id(&self) -> TabId {
        self.tab
    }

    pub fn profile(&self) -> &Arc<BrowserProfile> {
        &self.profile
    }

    pub async fn get(&self, key: &str) -> CatalogResult<Option<String>> {
        self.profile
            .backend
            .get(key)
            .await
            .map_err(|err| CatalogError::storage(format!("read {key}: {err:#}")))
    }

    /// Write and announce the write to every tab (including this one; the
    /// event carries our id so we can ignore it).
    pub async fn set(&self, key: &str, value: &str) -> CatalogResult<()> {
        self.profile
            .backend
            .set(key, value)
            .await
            .map_err(|err| CatalogError::storage(format!("write {key}: {err:#}")))?;

        let event = StorageEvent {
            key: key.to_string(),
            origin: self.tab,
        };
        if let Err(err) = self.profile.events.publish(event) {
            tracing::warn!(tab = %self.tab, key, error = ?err, "failed to announce storage write");
        }
        Ok(())
    }

    /// Storage events from every tab, this one included.
    pub fn subscribe(&self) -> Subscription<StorageEvent> {
        self.profile.events.subscribe()
    }
}
