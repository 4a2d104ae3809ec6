//! Composed listing query for "load more" pages.

use serde::{Deserialize, Serialize};

use storefront_core::Product;

use crate::projection::{self, ALL_CATEGORIES, SortKey};

/// Default number of products per "load more" step.
pub const DEFAULT_PAGE_SIZE: usize = 12;

/// Category filter → search → sort → cumulative pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogQuery {
    pub category: String,
    pub term: String,
    pub sort: SortKey,
    pub page: usize,
    pub page_size: usize,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            category: ALL_CATEGORIES.to_string(),
            term: String::new(),
            sort: SortKey::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One rendered listing state.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage<'a> {
    pub items: Vec<&'a Product>,
    /// Matches before pagination.
    pub total: usize,
    pub has_more: bool,
}

impl CatalogQuery {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    pub fn sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// The same query, one "load more" step further.
    pub fn next_page(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn run<'a>(&self, products: &'a [Product]) -> QueryPage<'a> {
        let needle = self.term.trim().to_lowercase();
        let filtered: Vec<&Product> = projection::by_category(products, &self.category)
            .into_iter()
            .filter(|p| needle.is_empty() || p.matches_lowercase(&needle))
            .collect();
        let sorted = projection::sort(filtered, self.sort);
        let total = sorted.len();
        let items = projection::paginate(&sorted, self.page, self.page_size).to_vec();

        QueryPage {
            has_more: items.len() < total,
            items,
            total,
        }
    }
}
