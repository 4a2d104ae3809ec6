//! Read-only views over a snapshot's products.
//!
//! Everything here is a pure function of its inputs: no clocks, no
//! randomness, no interior state. The rendering side calls these after every
//! "catalog changed" notification.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::Product;

/// The pseudo-category that selects everything.
pub const ALL_CATEGORIES: &str = "all";

/// Exact match on `category`, or everything for [`ALL_CATEGORIES`].
pub fn by_category<'a>(products: &'a [Product], category: &str) -> Vec<&'a Product> {
    if category == ALL_CATEGORIES {
        return products.iter().collect();
    }
    products.iter().filter(|p| p.category == category).collect()
}

pub fn featured(products: &[Product]) -> Vec<&Product> {
    products.iter().filter(|p| p.featured).collect()
}

/// Trending products, capped at `limit`, in insertion order.
///
/// With nothing flagged trending, the storefront still shows something: the
/// last `limit` products, most recently added first.
pub fn trending(products: &[Product], limit: usize) -> Vec<&Product> {
    let flagged: Vec<&Product> = products.iter().filter(|p| p.trending).take(limit).collect();
    if !flagged.is_empty() {
        return flagged;
    }
    products.iter().rev().take(limit).collect()
}

/// Case-insensitive substring search over name, brand, category and model.
pub fn search<'a>(products: &'a [Product], term: &str) -> Vec<&'a Product> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return products.iter().collect();
    }
    products
        .iter()
        .filter(|p| p.matches_lowercase(&needle))
        .collect()
}

pub fn find<'a>(products: &'a [Product], id: &str) -> Option<&'a Product> {
    products.iter().find(|p| p.id == id)
}

/// Distinct non-empty categories in order of first appearance.
pub fn categories(products: &[Product]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for p in products {
        let c = p.category.as_str();
        if !c.is_empty() && !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

/// Listing order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Newest => "newest",
            SortKey::Oldest => "oldest",
            SortKey::PriceAsc => "price-asc",
            SortKey::PriceDesc => "price-desc",
            SortKey::Name => "name",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort key: {0}")]
pub struct UnknownSortKey(pub String);

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(SortKey::Newest),
            "oldest" => Ok(SortKey::Oldest),
            "price-asc" | "price_asc" | "price-low" => Ok(SortKey::PriceAsc),
            "price-desc" | "price_desc" | "price-high" => Ok(SortKey::PriceDesc),
            "name" => Ok(SortKey::Name),
            other => Err(UnknownSortKey(other.to_string())),
        }
    }
}

// Missing timestamps sort as the epoch.
fn created_millis(p: &Product) -> i64 {
    p.created_at.map(|t| t.timestamp_millis()).unwrap_or(0)
}

/// Stable sort of an already projected list.
pub fn sort(mut list: Vec<&Product>, key: SortKey) -> Vec<&Product> {
    match key {
        SortKey::Newest => list.sort_by(|a, b| created_millis(b).cmp(&created_millis(a))),
        SortKey::Oldest => list.sort_by_key(|p| created_millis(p)),
        SortKey::PriceAsc => list.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortKey::PriceDesc => list.sort_by(|a, b| b.price.total_cmp(&a.price)),
        SortKey::Name => list.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        }),
    }
    list
}

/// Cumulative "load more" window: the first `page * page_size` items.
///
/// Page numbers start at 1; page 0 is empty.
pub fn paginate<T>(list: &[T], page: usize, page_size: usize) -> &[T] {
    let end = page.saturating_mul(page_size).min(list.len());
    &list[..end]
}
