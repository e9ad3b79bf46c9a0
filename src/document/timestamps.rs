//! Entity timestamp backfill.

use serde_json::{Map, Value};

use super::is_entity_key;

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Give every entity both timestamp fields.
///
/// A missing field mirrors the present one; when both are missing both get
/// `now`. Null entities become empty mappings first. Entities that are not
/// mappings are left alone. Returns the number of fields added.
pub fn backfill_timestamps(doc: &mut Map<String, Value>, now: &str) -> usize {
    let mut added = 0;

    for (key, value) in doc.iter_mut() {
        if !is_entity_key(key) {
            continue;
        }
        if value.is_null() {
            *value = Value::Object(Map::new());
        }
        let Value::Object(entity) = value else {
            tracing::debug!(entity = %key, "Skipping timestamp backfill for non-mapping entity");
            continue;
        };

        let created = entity.get(CREATED_AT).cloned();
        let updated = entity.get(UPDATED_AT).cloned();
        match (created, updated) {
            (Some(_), Some(_)) => {}
            (Some(created), None) => {
                entity.insert(UPDATED_AT.to_string(), created);
                added += 1;
            }
            (None, Some(updated)) => {
                entity.insert(CREATED_AT.to_string(), updated);
                added += 1;
            }
            (None, None) => {
                entity.insert(CREATED_AT.to_string(), Value::String(now.to_string()));
                entity.insert(UPDATED_AT.to_string(), Value::String(now.to_string()));
                added += 2;
            }
        }
    }

    added
}
