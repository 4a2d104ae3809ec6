//! Editor-side inputs: new product drafts and partial updates.
//!
//! The admin editor is one more loosely-typed source, so drafts reuse the
//! ingestion coercions. Unlike source records they are validated strictly: a
//! draft that cannot become a sensible product is rejected, not patched up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CatalogError, CatalogResult};
use crate::id::ProductId;
use crate::normalize::{coerce_bool, coerce_id, try_coerce_price};
use crate::product::{ImageRef, Product};

/// A product as submitted by the admin editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub featured: Option<Value>,
    #[serde(default)]
    pub trending: Option<Value>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stock: Option<u64>,
}

fn required(field: &'static str, value: Option<&str>) -> CatalogResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(CatalogError::rejected(format!("{field} is required"))),
    }
}

fn price(value: &Value) -> CatalogResult<f64> {
    try_coerce_price(value)
        .ok_or_else(|| CatalogError::rejected("price must be a non-negative number"))
}

impl ProductDraft {
    /// Validate the draft and turn it into a product created at `now`.
    ///
    /// `name`, `category` and `price` are required. A missing id is generated.
    pub fn into_product(self, now: DateTime<Utc>) -> CatalogResult<Product> {
        let name = required("name", self.name.as_deref())?;
        let category = required("category", self.category.as_deref())?;
        let price = match &self.price {
            Some(v) => price(v)?,
            None => return Err(CatalogError::rejected("price is required")),
        };
        let id = match &self.id {
            None | Some(Value::Null) => ProductId::generate(),
            Some(v) => coerce_id(v).ok_or_else(|| CatalogError::rejected("id is malformed"))?,
        };

        let mut images = self.images;
        if images.is_empty() {
            images.extend(
                self.image_url
                    .filter(|u| !u.trim().is_empty())
                    .map(ImageRef::Url),
            );
        }

        Ok(Product {
            id,
            name,
            brand: self.brand.unwrap_or_default().trim().to_string(),
            category,
            model: self.model.unwrap_or_default().trim().to_string(),
            price,
            featured: self.featured.as_ref().is_some_and(coerce_bool),
            trending: self.trending.as_ref().is_some_and(coerce_bool),
            images,
            description: self.description,
            stock: self.stock,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }
}

/// Partial update of an existing product. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub featured: Option<Value>,
    #[serde(default)]
    pub trending: Option<Value>,
    #[serde(default)]
    pub images: Option<Vec<ImageRef>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stock: Option<u64>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to `product`, stamping `updatedAt`.
    pub fn apply_to(&self, product: &Product, now: DateTime<Utc>) -> CatalogResult<Product> {
        let mut next = product.clone();

        if let Some(name) = &self.name {
            next.name = required("name", Some(name))?;
        }
        if let Some(category) = &self.category {
            next.category = required("category", Some(category))?;
        }
        if let Some(brand) = &self.brand {
            next.brand = brand.trim().to_string();
        }
        if let Some(model) = &self.model {
            next.model = model.trim().to_string();
        }
        if let Some(v) = &self.price {
            next.price = price(v)?;
        }
        if let Some(v) = &self.featured {
            next.featured = coerce_bool(v);
        }
        if let Some(v) = &self.trending {
            next.trending = coerce_bool(v);
        }
        if let Some(images) = &self.images {
            next.images = images.clone();
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(stock) = self.stock {
            next.stock = Some(stock);
        }

        next.updated_at = Some(now);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: Some("Phone".into()),
            category: Some("phones".into()),
            price: Some(json!("499")),
            ..ProductDraft::default()
        }
    }

    #[test]
    fn valid_draft_becomes_product_with_generated_id() {
        let now = Utc::now();
        let p = draft().into_product(now).unwrap();

        assert!(!p.id.as_str().is_empty());
        assert_eq!(p.price, 499.0);
        assert_eq!(p.created_at, Some(now));
    }

    #[test]
    fn draft_keeps_explicit_id_and_backfills_image() {
        let p = ProductDraft {
            id: Some(json!(42)),
            image_url: Some("x.jpg".into()),
            trending: Some(json!("true")),
            ..draft()
        }
        .into_product(Utc::now())
        .unwrap();

        assert_eq!(p.id, "42");
        assert!(p.trending);
        assert_eq!(p.primary_image(), Some("x.jpg"));
    }

    #[test]
    fn draft_without_name_is_rejected() {
        let err = ProductDraft {
            name: Some("   ".into()),
            ..draft()
        }
        .into_product(Utc::now())
        .unwrap_err();

        assert_eq!(err, CatalogError::rejected("name is required"));
    }

    #[test]
    fn draft_with_bad_price_is_rejected() {
        for bad in [None, Some(json!("free")), Some(json!(-1))] {
            let err = ProductDraft { price: bad, ..draft() }
                .into_product(Utc::now())
                .unwrap_err();
            assert!(matches!(err, CatalogError::MutationRejected(_)));
        }
    }

    #[test]
    fn patch_changes_only_given_fields() {
        let base = Product::new("p1", "Phone", 10.0).with_brand("Acme");
        let now = Utc::now();
        let patch = ProductPatch {
            price: Some(json!(12)),
            featured: Some(json!(1)),
            ..ProductPatch::default()
        };

        let next = patch.apply_to(&base, now).unwrap();
        assert_eq!(next.price, 12.0);
        assert!(next.featured);
        assert_eq!(next.brand, "Acme");
        assert_eq!(next.name, "Phone");
        assert_eq!(next.updated_at, Some(now));
    }

    #[test]
    fn patch_cannot_blank_required_fields() {
        let base = Product::new("p1", "Phone", 10.0).with_category("phones");
        let patch = ProductPatch {
            category: Some("".into()),
            ..ProductPatch::default()
        };
        assert!(patch.apply_to(&base, Utc::now()).is_err());
    }
}
