//! Ingestion boundary: loosely-typed source records → strictly typed products.
//!
//! Records reach the engine from the remote API, the fallback endpoint, the
//! persistent cache and the admin editor. Their field types drift (`"1"`, `1`,
//! `true` all mean "featured"; prices arrive as strings), so everything is
//! coerced here, exactly once. Nothing downstream inspects raw values.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::id::ProductId;
use crate::product::{ImageRef, Product};

/// Remembers when a product id was first ingested.
///
/// Records without timestamps are stamped with their ingestion time. Re-using
/// the first stamp keeps repeated loads of an unchanged source structurally
/// identical, so the store can absorb them as no-ops.
#[derive(Debug, Default)]
pub struct IngestionLedger {
    first_seen: Mutex<HashMap<ProductId, DateTime<Utc>>>,
}

impl IngestionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp to use for `id` when the source omits one.
    pub fn stamp(&self, id: &ProductId, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.first_seen.lock() {
            Ok(mut seen) => *seen.entry(id.clone()).or_insert(now),
            Err(_) => now,
        }
    }

    /// Forget every id that is not in `products`.
    ///
    /// Called with an authoritative list; ids that come back later are
    /// stamped afresh.
    pub fn retain_only(&self, products: &[Product]) {
        let keep: HashSet<&ProductId> = products.iter().map(|p| &p.id).collect();
        if let Ok(mut seen) = self.first_seen.lock() {
            let before = seen.len();
            seen.retain(|id, _| keep.contains(id));
            let pruned = before - seen.len();
            if pruned > 0 {
                tracing::trace!(pruned, "ingestion ledger pruned");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.first_seen.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Coerce a loosely-typed flag. `true`, non-zero numbers, `"1"`, `"true"` and
/// `"yes"` are true; everything else (including absence) is false.
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        ),
        _ => false,
    }
}

/// Parse a price, `None` if the value is not a finite non-negative number.
pub fn try_coerce_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (price.is_finite() && price >= 0.0).then_some(price)
}

/// Price with the ingestion fallback: anything unusable becomes `0`.
pub fn coerce_price(value: &Value) -> f64 {
    try_coerce_price(value).unwrap_or(0.0)
}

/// Product id from a string or number. Blank strings are not ids.
pub fn coerce_id(value: &Value) -> Option<ProductId> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(ProductId::new(s.trim())),
        Value::Number(n) => Some(ProductId::new(n.to_string())),
        _ => None,
    }
}

/// Timestamp from RFC 3339 text or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn text(record: &Map<String, Value>, key: &str) -> String {
    match record.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn first_present<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| record.get(*k))
        .find(|v| !v.is_null())
}

fn image_ref(value: &Value) -> Option<ImageRef> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(ImageRef::Url(s.trim().to_string())),
        Value::Object(obj) => {
            let url = ["url", "image_url", "src"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .map(str::trim)
                .filter(|u| !u.is_empty())?;
            let alt = obj.get("alt").and_then(Value::as_str).map(str::to_string);
            Some(ImageRef::Record {
                url: url.to_string(),
                alt,
            })
        }
        _ => None,
    }
}

fn images(record: &Map<String, Value>) -> Vec<ImageRef> {
    if let Some(Value::Array(items)) = record.get("images") {
        return items.iter().filter_map(image_ref).collect();
    }
    first_present(record, &["image_url", "imageUrl"])
        .and_then(image_ref)
        .into_iter()
        .collect()
}

fn stock(record: &Map<String, Value>) -> Option<u64> {
    match record.get("stock")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Normalize one raw record. Returns `None` when the record has no usable id.
pub fn normalize_record(
    raw: &Value,
    ledger: &IngestionLedger,
    now: DateTime<Utc>,
) -> Option<Product> {
    let record = raw.as_object()?;
    let id = record.get("id").and_then(coerce_id)?;

    let created_at = first_present(record, &["createdAt", "created_at"])
        .and_then(parse_timestamp)
        .unwrap_or_else(|| ledger.stamp(&id, now));
    let updated_at = first_present(record, &["updatedAt", "updated_at"])
        .and_then(parse_timestamp)
        .unwrap_or(created_at);

    Some(Product {
        name: text(record, "name"),
        brand: text(record, "brand"),
        category: text(record, "category"),
        model: text(record, "model"),
        price: record.get("price").map(coerce_price).unwrap_or(0.0),
        featured: record.get("featured").is_some_and(coerce_bool),
        trending: record.get("trending").is_some_and(coerce_bool),
        images: images(record),
        description: record
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        stock: stock(record),
        created_at: Some(created_at),
        updated_at: Some(updated_at),
        id,
    })
}

/// Normalize a batch of raw records, dropping unusable and duplicate ids.
pub fn normalize_records(raws: &[Value], ledger: &IngestionLedger) -> Vec<Product> {
    normalize_records_at(raws, ledger, Utc::now())
}

/// Same as [`normalize_records`] with an explicit ingestion instant.
pub fn normalize_records_at(
    raws: &[Value],
    ledger: &IngestionLedger,
    now: DateTime<Utc>,
) -> Vec<Product> {
    let mut dropped = 0usize;
    let products: Vec<Product> = raws
        .iter()
        .filter_map(|raw| {
            let product = normalize_record(raw, ledger, now);
            if product.is_none() {
                dropped += 1;
            }
            product
        })
        .collect();

    if dropped > 0 {
        tracing::warn!(dropped, "dropped product records without a usable id");
    }

    dedupe_by_id(products)
}

/// Enforce id uniqueness; the first occurrence of an id wins.
pub fn dedupe_by_id(products: Vec<Product>) -> Vec<Product> {
    let mut seen = HashSet::with_capacity(products.len());
    let before = products.len();
    let unique: Vec<Product> = products
        .into_iter()
        .filter(|p| seen.insert(p.id.clone()))
        .collect();

    if unique.len() != before {
        tracing::warn!(
            duplicates = before - unique.len(),
            "dropped products with duplicate ids"
        );
    }
    unique
}
