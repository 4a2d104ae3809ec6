//! `storefront-core`: catalog domain building blocks.
//!
//! This crate contains the strictly typed product model, the ingestion-boundary
//! normalization and the error taxonomy. No IO, no async.

pub mod draft;
pub mod error;
pub mod id;
pub mod normalize;
pub mod product;

pub use draft::{ProductDraft, ProductPatch};
pub use error::{CatalogError, CatalogResult};
pub use id::{ProductId, TabId};
pub use normalize::{IngestionLedger, dedupe_by_id, normalize_records};
pub use product::{ImageRef, Product};
