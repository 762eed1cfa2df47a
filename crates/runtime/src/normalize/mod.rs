//! Maps provider payloads onto gear and seed item lists.
//!
//! Providers answer in one of a handful of JSON layouts. The layout is
//! detected by walking [`PayloadShape::PRIORITY`] and taking the first
//! match; each shape then has its own mapper.

mod fields;

use serde_json::Value;
use stock_core::{Category, FailureKind, Item, ProviderId, ProviderResult};
use tracing::{debug, warn};

use self::fields::{
    first_array, first_text, first_timestamp, item_from, CATEGORY_QUANTITY_KEYS,
    LISTED_QUANTITY_KEYS,
};

const LISTED_TIMESTAMP_KEYS: [&str; 3] = ["updatedAt", "reportedAt", "timestamp"];
const CATEGORY_TIMESTAMP_KEYS: [&str; 4] =
    ["reportedAt", "effectiveTime", "updatedAt", "timestamp"];

const DIRECT_GEAR_KEYS: [&str; 2] = ["gear", "gears"];
const DIRECT_SEED_KEYS: [&str; 2] = ["seed", "seeds"];
const NESTED_GEAR_KEYS: [&str; 3] = ["gear", "gearStock", "gears"];
const NESTED_SEED_KEYS: [&str; 3] = ["seed", "seedStock", "seeds"];

const LISTED_CATEGORY_KEYS: [&str; 3] = ["category", "id", "name"];
const ARRAY_CATEGORY_KEYS: [&str; 2] = ["type", "category"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// `{"items": [...]}` with a category hint per item.
    Items,
    /// `{"stock": {"gear": [...], "seed": [...]}}`.
    Stock,
    /// `{"gear": [...], "seed": [...]}` at the top level.
    Direct,
    /// A bare array of typed items.
    Array,
}

impl PayloadShape {
    pub const PRIORITY: [PayloadShape; 4] = [
        PayloadShape::Items,
        PayloadShape::Stock,
        PayloadShape::Direct,
        PayloadShape::Array,
    ];

    pub fn detect(doc: &Value) -> Option<Self> {
        Self::PRIORITY.into_iter().find(|shape| shape.matches(doc))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Items => "items",
            Self::Stock => "stock",
            Self::Direct => "direct",
            Self::Array => "array",
        }
    }

    fn matches(self, doc: &Value) -> bool {
        match self {
            Self::Items => doc.get("items").is_some_and(Value::is_array),
            Self::Stock => doc.get("stock").is_some_and(Value::is_object),
            Self::Direct => DIRECT_GEAR_KEYS
                .iter()
                .chain(DIRECT_SEED_KEYS.iter())
                .any(|key| doc.get(*key).is_some_and(Value::is_array)),
            Self::Array => doc.is_array(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedStock {
    pub shape: PayloadShape,
    pub gear: Vec<Item>,
    pub seed: Vec<Item>,
    pub reported_at_ms: u64,
}

/// Normalizes a raw response body. Malformed JSON becomes an errored
/// result.
pub fn normalize_body(body: &str, provider: &ProviderId, now_ms: u64) -> ProviderResult {
    match serde_json::from_str::<Value>(body) {
        Ok(doc) => normalize_payload(&doc, provider, now_ms),
        Err(err) => {
            warn!(provider = %provider, error = %err, "provider returned malformed JSON");
            ProviderResult::failed(
                provider.clone(),
                FailureKind::Parse,
                format!("invalid JSON: {err}"),
                now_ms,
            )
        }
    }
}

pub fn normalize_payload(doc: &Value, provider: &ProviderId, now_ms: u64) -> ProviderResult {
    match normalize_document(doc, now_ms) {
        Some(stock) => {
            debug!(
                provider = %provider,
                shape = stock.shape.as_str(),
                gear = stock.gear.len(),
                seed = stock.seed.len(),
                "payload normalized"
            );
            ProviderResult::from_lists(
                provider.clone(),
                stock.gear,
                stock.seed,
                stock.reported_at_ms,
            )
        }
        None => {
            warn!(provider = %provider, "provider payload has an unrecognized shape");
            ProviderResult::failed(
                provider.clone(),
                FailureKind::Parse,
                "unrecognized payload shape",
                now_ms,
            )
        }
    }
}

/// Shape-dispatching core of the normalizer. `None` means no known shape
/// matched.
pub fn normalize_document(doc: &Value, now_ms: u64) -> Option<NormalizedStock> {
    let shape = PayloadShape::detect(doc)?;
    let stock = match shape {
        PayloadShape::Items => from_items(doc, now_ms),
        PayloadShape::Stock => from_stock(doc, now_ms),
        PayloadShape::Direct => from_direct(doc, now_ms),
        PayloadShape::Array => from_array(doc, now_ms),
    };
    Some(stock)
}

fn from_items(doc: &Value, now_ms: u64) -> NormalizedStock {
    let mut gear = Vec::new();
    let mut seed = Vec::new();

    for entry in first_array(doc, &["items"]) {
        let Some(item) = item_from(entry, &LISTED_QUANTITY_KEYS) else {
            continue;
        };
        let hint = match entry {
            Value::String(name) => Some(name.as_str()),
            _ => first_text(entry, &LISTED_CATEGORY_KEYS),
        };
        match listed_category(hint) {
            Category::Gear => gear.push(item),
            Category::Seed => seed.push(item),
        }
    }

    NormalizedStock {
        shape: PayloadShape::Items,
        gear,
        seed,
        reported_at_ms: first_timestamp(doc, &LISTED_TIMESTAMP_KEYS).unwrap_or(now_ms),
    }
}

fn from_stock(doc: &Value, now_ms: u64) -> NormalizedStock {
    let stock = doc.get("stock").unwrap_or(&Value::Null);

    NormalizedStock {
        shape: PayloadShape::Stock,
        gear: category_items(first_array(stock, &NESTED_GEAR_KEYS)),
        seed: category_items(first_array(stock, &NESTED_SEED_KEYS)),
        reported_at_ms: first_timestamp(doc, &CATEGORY_TIMESTAMP_KEYS)
            .or_else(|| first_timestamp(stock, &CATEGORY_TIMESTAMP_KEYS))
            .unwrap_or(now_ms),
    }
}

fn from_direct(doc: &Value, now_ms: u64) -> NormalizedStock {
    NormalizedStock {
        shape: PayloadShape::Direct,
        gear: category_items(first_array(doc, &DIRECT_GEAR_KEYS)),
        seed: category_items(first_array(doc, &DIRECT_SEED_KEYS)),
        reported_at_ms: first_timestamp(doc, &CATEGORY_TIMESTAMP_KEYS).unwrap_or(now_ms),
    }
}

fn from_array(doc: &Value, now_ms: u64) -> NormalizedStock {
    let mut gear = Vec::new();
    let mut seed = Vec::new();

    for entry in doc.as_array().map(Vec::as_slice).unwrap_or(&[]) {
        let Some(item) = item_from(entry, &CATEGORY_QUANTITY_KEYS) else {
            continue;
        };
        let is_gear = first_text(entry, &ARRAY_CATEGORY_KEYS)
            .is_some_and(|kind| kind.to_ascii_lowercase().contains("gear"));
        if is_gear {
            gear.push(item);
        } else {
            seed.push(item);
        }
    }

    NormalizedStock {
        shape: PayloadShape::Array,
        gear,
        seed,
        reported_at_ms: now_ms,
    }
}

/// Per-item rules shared by the category-keyed shapes; also applied to
/// snapshots pushed through the API.
pub fn category_items(entries: &[Value]) -> Vec<Item> {
    entries
        .iter()
        .filter_map(|entry| item_from(entry, &CATEGORY_QUANTITY_KEYS))
        .collect()
}

fn listed_category(hint: Option<&str>) -> Category {
    let Some(hint) = hint else {
        return Category::Gear;
    };
    let hint = hint.to_ascii_lowercase();
    if hint.contains("seed") || hint.contains("plant") {
        Category::Seed
    } else {
        Category::Gear
    }
}
