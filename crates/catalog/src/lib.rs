//! `storefront-catalog`: the canonical catalog of a tab and its read-only views.
//!
//! Pure in-memory logic (no IO, no async): the versioned [`CatalogStore`] and
//! the projection functions the rendering side queries after every change.

pub mod projection;
pub mod query;
pub mod snapshot;
pub mod store;

pub use projection::{ALL_CATEGORIES, SortKey, UnknownSortKey};
pub use query::{CatalogQuery, DEFAULT_PAGE_SIZE, QueryPage};
pub use snapshot::{CatalogSnapshot, SnapshotSource};
pub use store::CatalogStore;
