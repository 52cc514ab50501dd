//! Field-wise record merge.

use crate::Entity;

/// Overlays `newer` on top of `older`.
///
/// Every attribute of `older` is copied, then every attribute of `newer`
/// overwrites it. The id is taken from `older` when non-empty, then replaced
/// by `newer`'s id when that one is non-empty. The logical name comes from
/// `older`, falling back to `newer` when `older` has none.
///
/// Neither input is modified.
pub fn merge(older: &Entity, newer: &Entity) -> Entity {
    let logical_name = if older.logical_name.is_empty() {
        newer.logical_name.clone()
    } else {
        older.logical_name.clone()
    };

    let mut merged = Entity::new(logical_name);

    if !older.id.is_empty() {
        merged.id = older.id;
    }
    if !newer.id.is_empty() {
        merged.id = newer.id;
    }

    for (field, value) in older.attributes.iter().chain(newer.attributes.iter()) {
        merged.attributes.insert(field.clone(), value.clone());
    }
    for (field, text) in older.formatted_values.iter().chain(newer.formatted_values.iter()) {
        merged.formatted_values.insert(field.clone(), text.clone());
    }

    merged
}
