//! `storefront-sync`
//!
//! **Responsibility:** keep each tab's catalog fresh and consistent with the
//! server, the shared profile cache and the other open tabs.
//!
//! This crate provides:
//! - Profile storage with cross-tab write notifications (in-memory or SQLite)
//! - The remote catalog API client
//! - The source resolver (API → cache → fallback endpoint → empty)
//! - The change bus that serializes and coalesces change signals
//! - The mutation gateway used by the admin editor
//!
//! The server remains the authority; the cache is a best-effort mirror.

pub mod api;
pub mod cache;
pub mod change_bus;
pub mod config;
pub mod engine;
pub mod gateway;
pub mod resolver;
pub mod sqlite;
pub mod storage;

pub use api::{CatalogApi, InMemoryCatalogApi, ResponseCache};
#[cfg(feature = "http")]
pub use api::HttpCatalogApi;
pub use cache::CatalogCache;
pub use change_bus::{
    ChangeBus, ChangeBusHandle, DispatchOutcome, DispatchReport, EditorPresence, EditorSession,
    SignalDispatcher, SignalQueue,
};
pub use config::EngineConfig;
pub use engine::CatalogEngine;
pub use gateway::MutationGateway;
pub use resolver::SourceResolver;
pub use sqlite::SqliteBackend;
pub use storage::{BrowserProfile, InMemoryBackend, StorageBackend, TabStorage};
