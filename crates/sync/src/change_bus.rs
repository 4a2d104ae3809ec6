//! The change bus: one serialized consumer for every "catalog may have
//! changed" signal of a tab.
//!
//! Three listener tasks forward into a single unbounded channel:
//!
//! - profile storage events written by *other* tabs under the catalog key
//! - editor announcements made in this tab
//! - a fixed-interval poll timer
//!
//! The dispatcher task owns a [`SignalQueue`] and handles one signal at a
//! time. Signals that arrive while a dispatch is in flight wait in the queue,
//! where a newer signal replaces a queued one of the same kind.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use storefront_catalog::{CatalogStore, SnapshotSource};
use storefront_core::{Product, TabId, dedupe_by_id};
use storefront_events::{
    ChangeSignal, EditorAnnouncement, EventBus, InMemoryEventBus, SignalKind, StorageEvent,
    Subscription,
};

use crate::resolver::SourceResolver;

/// Whether the admin editor is open in this tab. Polling pauses while it is.
#[derive(Debug, Clone, Default)]
pub struct EditorPresence {
    active: Arc<AtomicBool>,
}

impl EditorPresence {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Mark the editor active until the returned guard is dropped.
    pub fn enter(&self) -> EditorSession {
        self.set_active(true);
        EditorSession {
            presence: self.clone(),
        }
    }
}

#[derive(Debug)]
#[must_use = "the editor is considered closed as soon as the session is dropped"]
pub struct EditorSession {
    presence: EditorPresence,
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.presence.set_active(false);
    }
}

/// FIFO of pending signals with per-kind coalescing.
#[derive(Debug, Default)]
pub struct SignalQueue {
    pending: VecDeque<ChangeSignal>,
}

impl SignalQueue {
    /// Enqueue at the tail. A queued signal of the same kind is dropped in
    /// favour of this one; returns whether that happened.
    pub fn push(&mut self, signal: ChangeSignal) -> bool {
        let kind = signal.kind();
        let coalesced = match self.pending.iter().position(|s| s.kind() == kind) {
            Some(index) => {
                self.pending.remove(index);
                true
            }
            None => false,
        };
        self.pending.push_back(signal);
        coalesced
    }

    pub fn pop(&mut self) -> Option<ChangeSignal> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn kinds(&self) -> Vec<SignalKind> {
        self.pending.iter().map(ChangeSignal::kind).collect()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The store accepted a change and is now at `version`.
    Applied { version: u64 },
    /// The result equalled the current catalog.
    Unchanged,
    /// A poll tick while the editor is active.
    Suppressed,
}

/// What happened to one dispatched signal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub kind: SignalKind,
    pub outcome: DispatchOutcome,
}

/// Decides, per signal, between a resolver round-trip and a direct patch.
pub struct SignalDispatcher {
    store: Arc<CatalogStore>,
    resolver: Arc<SourceResolver>,
    presence: EditorPresence,
}

impl SignalDispatcher {
    pub fn new(
        store: Arc<CatalogStore>,
        resolver: Arc<SourceResolver>,
        presence: EditorPresence,
    ) -> Self {
        Self {
            store,
            resolver,
            presence,
        }
    }

    pub async fn dispatch(&self, signal: ChangeSignal) -> DispatchOutcome {
        match signal {
            ChangeSignal::PollTick if self.presence.is_active() => DispatchOutcome::Suppressed,
            ChangeSignal::EditorEvent {
                payload: Some(products),
            } => self.patch(products),
            ChangeSignal::EditorEvent { payload: None }
            | ChangeSignal::ExternalStorage
            | ChangeSignal::PollTick => self.reload().await,
        }
    }

    fn patch(&self, products: Vec<Product>) -> DispatchOutcome {
        let products = dedupe_by_id(products);
        if self.store.current().same_products(&products) {
            return DispatchOutcome::Unchanged;
        }
        let version = self.store.apply_patch(products, SnapshotSource::Cache);
        DispatchOutcome::Applied { version }
    }

    async fn reload(&self) -> DispatchOutcome {
        let candidate = self.resolver.load().await;
        if self.store.replace(candidate) {
            DispatchOutcome::Applied {
                version: self.store.version(),
            }
        } else {
            DispatchOutcome::Unchanged
        }
    }
}

/// Where a tab's signals come from.
pub struct BusSources {
    pub tab: TabId,
    pub catalog_key: String,
    pub storage: Subscription<StorageEvent>,
    pub editor: Subscription<EditorAnnouncement>,
    pub poll_interval: Duration,
}

/// A change bus that has not been started yet.
pub struct ChangeBus {
    dispatcher: SignalDispatcher,
    reports: Arc<InMemoryEventBus<DispatchReport>>,
}

impl ChangeBus {
    pub fn new(dispatcher: SignalDispatcher) -> Self {
        Self {
            dispatcher,
            reports: Arc::new(InMemoryEventBus::new()),
        }
    }

    /// Subscribe to dispatch reports before any signal is handled.
    pub fn reports(&self) -> Subscription<DispatchReport> {
        self.reports.subscribe()
    }

    /// Start the listener tasks and the dispatcher.
    pub fn spawn(self, sources: BusSources) -> ChangeBusHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let BusSources {
            tab,
            catalog_key,
            storage,
            editor,
            poll_interval,
        } = sources;

        let tasks = vec![
            tokio::spawn(forward_storage(
                storage,
                tab,
                catalog_key,
                signal_tx.clone(),
                shutdown_rx.clone(),
            )),
            tokio::spawn(forward_editor(editor, signal_tx.clone(), shutdown_rx.clone())),
            tokio::spawn(poll(poll_interval, signal_tx.clone(), shutdown_rx.clone())),
            tokio::spawn(run_dispatcher(
                self.dispatcher,
                signal_rx,
                Arc::clone(&self.reports),
                tab,
                shutdown_rx,
            )),
        ];

        tracing::debug!(tab = %tab, ?poll_interval, "change bus started");

        ChangeBusHandle {
            tab,
            signals: signal_tx,
            reports: self.reports,
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

/// Controls a running change bus.
pub struct ChangeBusHandle {
    tab: TabId,
    signals: mpsc::UnboundedSender<ChangeSignal>,
    reports: Arc<InMemoryEventBus<DispatchReport>>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChangeBusHandle {
    /// Enqueue a signal as if a listener had produced it.
    ///
    /// Returns `false` once the bus has stopped.
    pub fn signal(&self, signal: ChangeSignal) -> bool {
        self.signals.send(signal).is_ok()
    }

    pub fn reports(&self) -> Subscription<DispatchReport> {
        self.reports.subscribe()
    }

    /// Stop every task and wait for them to finish. A dispatch in flight
    /// completes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::error!(tab = %self.tab, error = %err, "change bus task failed");
            }
        }
        tracing::debug!(tab = %self.tab, "change bus stopped");
    }
}

async fn forward_storage(
    mut events: Subscription<StorageEvent>,
    tab: TabId,
    catalog_key: String,
    signals: mpsc::UnboundedSender<ChangeSignal>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = events.recv() => match event {
                Some(event) if event.concerns(tab, &catalog_key) => {
                    if signals.send(ChangeSignal::ExternalStorage).is_err() {
                        break;
                    }
                }
                Some(_) => {}
                None => break,
            },
        }
    }
}

async fn forward_editor(
    mut announcements: Subscription<EditorAnnouncement>,
    signals: mpsc::UnboundedSender<ChangeSignal>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            announcement = announcements.recv() => match announcement {
                Some(announcement) => {
                    if signals.send(announcement.into()).is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }
}

async fn poll(
    period: Duration,
    signals: mpsc::UnboundedSender<ChangeSignal>,
    mut shutdown: watch::Receiver<bool>,
) {
    // The first tick fires one period from now; the initial load already ran.
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if signals.send(ChangeSignal::PollTick).is_err() {
                    break;
                }
            }
        }
    }
}

async fn run_dispatcher(
    dispatcher: SignalDispatcher,
    mut signals: mpsc::UnboundedReceiver<ChangeSignal>,
    reports: Arc<InMemoryEventBus<DispatchReport>>,
    tab: TabId,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut queue = SignalQueue::default();

    loop {
        if queue.is_empty() {
            tokio::select! {
                _ = shutdown.changed() => break,
                received = signals.recv() => match received {
                    Some(signal) => {
                        queue.push(signal);
                    }
                    None => break,
                },
            }
        }

        // Everything that arrived during the last dispatch.
        while let Ok(signal) = signals.try_recv() {
            let kind = signal.kind();
            if queue.push(signal) {
                tracing::trace!(tab = %tab, kind = %kind, "signal coalesced");
            }
        }

        if *shutdown.borrow() {
            break;
        }

        let Some(signal) = queue.pop() else {
            continue;
        };
        let kind = signal.kind();
        let outcome = dispatcher.dispatch(signal).await;
        tracing::debug!(tab = %tab, kind = %kind, ?outcome, queued = queue.len(), "signal dispatched");

        if let Err(err) = reports.publish(DispatchReport { kind, outcome }) {
            tracing::warn!(tab = %tab, error = ?err, "failed to publish dispatch report");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::api::InMemoryCatalogApi;
    use crate::cache::CatalogCache;
    use crate::storage::BrowserProfile;

    fn storage_signal() -> ChangeSignal {
        ChangeSignal::ExternalStorage
    }

    fn editor_signal(ids: &[&str]) -> ChangeSignal {
        ChangeSignal::EditorEvent {
            payload: Some(ids.iter().map(|id| Product::new(*id, *id, 1.0)).collect()),
        }
    }

    #[test]
    fn queue_is_fifo_across_kinds() {
        let mut queue = SignalQueue::default();
        queue.push(storage_signal());
        queue.push(ChangeSignal::PollTick);

        assert_eq!(queue.pop(), Some(storage_signal()));
        assert_eq!(queue.pop(), Some(ChangeSignal::PollTick));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn same_kind_collapses_into_the_newest() {
        let mut queue = SignalQueue::default();
        assert!(!queue.push(editor_signal(&["a"])));
        assert!(!queue.push(ChangeSignal::PollTick));
        assert!(queue.push(editor_signal(&["a", "b"])));
        assert!(queue.push(editor_signal(&["a", "b", "c"])));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.kinds(), vec![SignalKind::PollTick, SignalKind::EditorEvent]);
        queue.pop();
        assert_eq!(queue.pop(), Some(editor_signal(&["a", "b", "c"])));
    }

    #[test]
    fn editor_session_guard_resets_presence() {
        let presence = EditorPresence::default();
        {
            let _session = presence.enter();
            assert!(presence.is_active());
        }
        assert!(!presence.is_active());
    }

    struct Fixture {
        api: Arc<InMemoryCatalogApi>,
        store: Arc<CatalogStore>,
        presence: EditorPresence,
        dispatcher: SignalDispatcher,
    }

    fn fixture() -> Fixture {
        let api = Arc::new(InMemoryCatalogApi::new(vec![json!({"id": "p1"}), json!({"id": "p2"})]));
        let profile = BrowserProfile::in_memory();
        let cache = CatalogCache::new(profile.open_tab(), "storefront.catalog");
        let resolver = Arc::new(SourceResolver::new(api.clone(), cache, profile.ledger()));
        let store = Arc::new(CatalogStore::new());
        let presence = EditorPresence::default();
        let dispatcher = SignalDispatcher::new(store.clone(), resolver, presence.clone());
        Fixture {
            api,
            store,
            presence,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn reload_applies_then_reports_unchanged() {
        let f = fixture();

        let first = f.dispatcher.dispatch(ChangeSignal::ExternalStorage).await;
        let second = f.dispatcher.dispatch(ChangeSignal::PollTick).await;

        assert_eq!(first, DispatchOutcome::Applied { version: 1 });
        assert_eq!(second, DispatchOutcome::Unchanged);
        assert_eq!(f.api.get_calls(), 2);
    }

    #[tokio::test]
    async fn poll_is_suppressed_while_editing() {
        let f = fixture();
        let _session = f.presence.enter();

        let outcome = f.dispatcher.dispatch(ChangeSignal::PollTick).await;
        assert_eq!(outcome, DispatchOutcome::Suppressed);
        assert_eq!(f.api.get_calls(), 0);

        // Other signals still go through.
        let outcome = f.dispatcher.dispatch(ChangeSignal::ExternalStorage).await;
        assert!(matches!(outcome, DispatchOutcome::Applied { .. }));
    }

    #[tokio::test]
    async fn editor_payload_patches_without_resolver() {
        let f = fixture();

        let outcome = f.dispatcher.dispatch(editor_signal(&["x", "y"])).await;
        assert_eq!(outcome, DispatchOutcome::Applied { version: 1 });
        assert_eq!(f.store.current().source(), SnapshotSource::Cache);

        let outcome = f.dispatcher.dispatch(editor_signal(&["x", "y"])).await;
        assert_eq!(outcome, DispatchOutcome::Unchanged);
        assert_eq!(f.api.get_calls(), 0);
    }

    #[tokio::test]
    async fn editor_without_payload_reloads() {
        let f = fixture();
        let outcome = f
            .dispatcher
            .dispatch(ChangeSignal::EditorEvent { payload: None })
            .await;
        assert!(matches!(outcome, DispatchOutcome::Applied { .. }));
        assert_eq!(f.api.get_calls(), 1);
    }

    #[tokio::test]
    async fn back_to_back_signals_of_one_kind_dispatch_once() {
        let f = fixture();
        let api = f.api.clone();
        let profile = BrowserProfile::in_memory();
        let tab = profile.open_tab();
        let editor = InMemoryEventBus::<EditorAnnouncement>::new();

        let bus = ChangeBus::new(f.dispatcher);
        let mut reports = bus.reports();
        let handle = bus.spawn(BusSources {
            tab: tab.tab_id(),
            catalog_key: "storefront.catalog".into(),
            storage: tab.subscribe(),
            editor: editor.subscribe(),
            poll_interval: Duration::from_secs(3600),
        });

        for _ in 0..5 {
            assert!(handle.signal(ChangeSignal::ExternalStorage));
        }

        let report = reports.recv().await.unwrap();
        assert_eq!(report.kind, SignalKind::ExternalStorage);
        assert_eq!(report.outcome, DispatchOutcome::Applied { version: 1 });

        handle.shutdown().await;
        assert!(reports.try_recv().is_err());
        assert_eq!(api.get_calls(), 1);
    }

    #[tokio::test]
    async fn outcomes_serialize_with_tag() {
        let v = serde_json::to_value(DispatchOutcome::Applied { version: 3 }).unwrap();
        assert_eq!(v, json!({"outcome": "applied", "version": 3}));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashSet;

        fn signal(choice: u8) -> ChangeSignal {
            match choice % 4 {
                0 => ChangeSignal::ExternalStorage,
                1 => ChangeSignal::PollTick,
                2 => ChangeSignal::EditorEvent { payload: None },
                _ => editor_signal(&["a"]),
            }
        }

        proptest! {
            /// Property: at most one queued signal per kind, and the survivor
            /// of each kind is the last one pushed.
            #[test]
            fn queue_holds_latest_signal_per_kind(choices in proptest::collection::vec(any::<u8>(), 0..40)) {
                let mut queue = SignalQueue::default();
                for c in &choices {
                    queue.push(signal(*c));
                }

                let kinds = queue.kinds();
                let distinct: HashSet<SignalKind> = kinds.iter().copied().collect();
                prop_assert_eq!(distinct.len(), kinds.len());

                let mut drained = Vec::new();
                while let Some(s) = queue.pop() {
                    drained.push(s);
                }
                for s in drained {
                    let last = choices.iter().rev().map(|c| signal(*c)).find(|x| x.kind() == s.kind());
                    prop_assert_eq!(Some(s), last);
                }
            }
        }
    }
}
