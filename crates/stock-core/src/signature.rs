use crate::model::Item;

/// Order-insensitive view of an item list: the items sorted by name, then
/// quantity. Two lists holding the same multiset of items compare equal
/// regardless of the order a provider listed them in.
pub fn content_signature(items: &[Item]) -> Vec<&Item> {
    let mut sorted: Vec<&Item> = items.iter().collect();
    sorted.sort_unstable();
    sorted
}
