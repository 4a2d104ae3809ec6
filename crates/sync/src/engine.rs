//! One tab's catalog engine, wired end to end.

use std::sync::Arc;

use storefront_catalog::{CatalogSnapshot, CatalogStore};
use storefront_core::TabId;
use storefront_events::{ChangeSignal, EditorAnnouncement, EventBus, InMemoryEventBus, Subscription};

use crate::api::CatalogApi;
use crate::cache::CatalogCache;
use crate::change_bus::{
    BusSources, ChangeBus, ChangeBusHandle, DispatchReport, EditorPresence, SignalDispatcher,
};
use crate::config::EngineConfig;
use crate::gateway::MutationGateway;
use crate::resolver::SourceResolver;
use crate::storage::TabStorage;

/// Store, resolver, change bus and mutation gateway of one tab.
///
/// ```ignore
/// let profile = BrowserProfile::in_memory();
/// let engine = CatalogEngine::start(&config, api, profile.open_tab()).await;
/// engine.store().on_change(|| redraw());
/// ```
pub struct CatalogEngine {
    tab: TabId,
    store: Arc<CatalogStore>,
    gateway: MutationGateway,
    presence: EditorPresence,
    editor: Arc<InMemoryEventBus<EditorAnnouncement>>,
    bus: ChangeBusHandle,
}

impl CatalogEngine {
    /// Load the catalog once, then start listening for changes.
    pub async fn start(config: &EngineConfig, api: Arc<dyn CatalogApi>, storage: TabStorage) -> Self {
        let tab = storage.tab_id();
        let cache = CatalogCache::new(storage.clone(), config.catalog_key.clone());
        let resolver = Arc::new(SourceResolver::new(
            Arc::clone(&api),
            cache.clone(),
            storage.profile().ledger(),
        ));
        let store = Arc::new(CatalogStore::new());
        let editor = Arc::new(InMemoryEventBus::new());
        let presence = EditorPresence::default();

        // Subscribe before the first load so writes made meanwhile are seen.
        let sources = BusSources {
            tab,
            catalog_key: config.catalog_key.clone(),
            storage: storage.subscribe(),
            editor: editor.subscribe(),
            poll_interval: config.poll_interval(),
        };

        store.replace(resolver.load().await);

        let dispatcher = SignalDispatcher::new(Arc::clone(&store), resolver, presence.clone());
        let bus = ChangeBus::new(dispatcher).spawn(sources);
        let gateway = MutationGateway::new(
            Arc::clone(&store),
            cache,
            api,
            Arc::clone(&editor),
            config.reconcile_delay(),
        );

        let snapshot = store.current();
        tracing::info!(
            tab = %tab,
            version = snapshot.version(),
            source = %snapshot.source(),
            count = snapshot.len(),
            "catalog engine started"
        );

        Self {
            tab,
            store,
            gateway,
            presence,
            editor,
            bus,
        }
    }

    pub fn tab_id(&self) -> TabId {
        self.tab
    }

    /// Shared with the rendering side; register `on_change` listeners here.
    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.store.current()
    }

    pub fn gateway(&self) -> &MutationGateway {
        &self.gateway
    }

    pub fn editor_presence(&self) -> &EditorPresence {
        &self.presence
    }

    /// Subscribe to this tab's editor announcements.
    pub fn editor_announcements(&self) -> Subscription<EditorAnnouncement> {
        self.editor.subscribe()
    }

    /// Outcomes of every signal dispatched from now on.
    pub fn dispatch_reports(&self) -> Subscription<DispatchReport> {
        self.bus.reports()
    }

    /// Ask for a reload through the change bus (e.g. a "refresh" button).
    pub fn request_reload(&self) -> bool {
        self.bus.signal(ChangeSignal::EditorEvent { payload: None })
    }

    pub async fn shutdown(self) {
        self.bus.shutdown().await;
        tracing::info!(tab = %self.tab, "catalog engine stopped");
    }
}
