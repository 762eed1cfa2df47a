use serde_json::Value;
use stock_core::{Item, UNKNOWN_ITEM_NAME};
use time::{
    format_description::{self, well_known::Rfc3339},
    OffsetDateTime, PrimitiveDateTime,
};

/// Quantity keys for entries of a flat `items` list.
pub(crate) const LISTED_QUANTITY_KEYS: [&str; 6] =
    ["currentStock", "qty", "stock", "quantity", "amount", "count"];

/// Quantity keys for entries of per-category lists.
pub(crate) const CATEGORY_QUANTITY_KEYS: [&str; 6] =
    ["quantity", "currentStock", "qty", "stock", "amount", "count"];

const NAME_KEYS: [&str; 2] = ["name", "id"];

/// ISO 8601 with a basic-format offset, e.g. `2026-03-01T12:05:12+0000`.
const BASIC_OFFSET_FORMAT: &str = "[year]-[month]-[day]T[hour]:[minute]:[second]\
    [optional [.[subsecond]]][offset_hour sign:mandatory][offset_minute]";

/// ISO 8601 without an offset; read as UTC.
const LOCAL_FORMATS: [&str; 2] = [
    "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]",
    "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]",
];

/// Builds an item from one list element. Bare strings are treated as a
/// name; other non-object elements carry no item.
pub(crate) fn item_from(value: &Value, quantity_keys: &[&str]) -> Option<Item> {
    match value {
        Value::Object(_) => Some(Item::new(item_name(value), quantity(value, quantity_keys))),
        Value::String(name) => Some(Item::new(name.as_str(), 1)),
        _ => None,
    }
}

pub(crate) fn item_name(value: &Value) -> String {
    NAME_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(non_empty_text))
        .unwrap_or_else(|| UNKNOWN_ITEM_NAME.to_string())
}

pub(crate) fn quantity(value: &Value, keys: &[&str]) -> u32 {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(parse_quantity))
        .unwrap_or(1)
}

/// Positive counts only; zero, negatives and junk fall through to the next
/// key.
fn parse_quantity(value: &Value) -> Option<u32> {
    let raw = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !raw.is_finite() || raw < 1.0 {
        return None;
    }

    Some(raw.min(f64::from(u32::MAX)) as u32)
}

/// First non-empty string among `keys`, returned as-is.
pub(crate) fn first_text<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| {
        value
            .get(*key)
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
    })
}

pub(crate) fn first_timestamp(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(parse_timestamp_ms))
}

/// ISO 8601 text or epoch milliseconds.
pub(crate) fn parse_timestamp_ms(value: &Value) -> Option<u64> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            match parse_iso_datetime(text) {
                Some(at) => u64::try_from(at.unix_timestamp_nanos() / 1_000_000).ok(),
                None => text.parse::<u64>().ok(),
            }
        }
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|raw| raw.is_finite() && *raw >= 0.0)
                .map(|raw| raw as u64)
        }),
        _ => None,
    }
}

fn parse_iso_datetime(text: &str) -> Option<OffsetDateTime> {
    if let Ok(at) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(at);
    }

    let basic = format_description::parse(BASIC_OFFSET_FORMAT).ok()?;
    if let Ok(at) = OffsetDateTime::parse(text, basic.as_slice()) {
        return Some(at);
    }

    LOCAL_FORMATS.iter().find_map(|format| {
        let description = format_description::parse(format).ok()?;
        PrimitiveDateTime::parse(text, description.as_slice())
            .ok()
            .map(PrimitiveDateTime::assume_utc)
    })
}

pub(crate) fn first_array<'a>(value: &'a Value, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn non_empty_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
