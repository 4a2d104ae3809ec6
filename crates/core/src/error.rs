//! Catalog error model.

use thiserror::Error;

/// Result type used across the catalog engine.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog-level error.
///
/// Only `MutationRejected` (and a failing storage write behind it) ever reaches
/// a caller. Source and cache failures are recovered by the resolver's fallback
/// chain and only show up in logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The remote API was unreachable or returned a malformed payload.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The persistent cache holds a document that is not valid catalog JSON.
    #[error("cache corrupt: {0}")]
    CacheCorrupt(String),

    /// A mutation was refused (missing required field, unknown id, ...).
    #[error("mutation rejected: {0}")]
    MutationRejected(String),

    /// The storage backend failed to read or write.
    #[error("storage error: {0}")]
    Storage(String),

    /// An identifier could not be parsed.
    #[error("invalid id: {0}")]
    InvalidId(String),
}

impl CatalogError {
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    pub fn cache_corrupt(msg: impl Into<String>) -> Self {
        Self::CacheCorrupt(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::MutationRejected(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Whether the error is recovered inside the engine rather than surfaced.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_) | Self::CacheCorrupt(_))
    }
}
