//! Deep merge of an extends chain
//!
//! Documents are folded from the least specific ancestor to the requested
//! document:
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (last wins)
//! - Scalars and null: override (last wins)

use serde_json::{Map, Value};
use std::path::Path;

use crate::document::{is_entity_key, LoadedDocument};
use crate::error::ResolveError;
use crate::paths;
use crate::writer::set_value_at;

/// Entity holding the workspace root and config path
pub const WORKSPACE_ENTITY: &str = "#workspace";

/// Entity of the javascript API
pub const JAVASCRIPT_API_ENTITY: &str = "#javascript-api";

/// Entity of the shell environment
pub const SHELL_ENV_ENTITY: &str = "#shell-env";

/// Legacy top-level keys and where their content lives now
const DEPRECATED_KEYS: &[(&str, &str)] = &[
    ("workspace", "#workspace"),
    ("javascript", "#javascript-api"),
    ("env", "#shell-env.env"),
    ("name", "#workspace.name"),
];

/// Deep merge two JSON values.
///
/// Merge semantics:
/// - Objects: deep-merge by key (recursive)
/// - Arrays: REPLACE (second wins entirely)
/// - Scalars: override (second wins)
/// - Null: override (null can override any value)
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        // Both objects: deep merge
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => {
                        let taken = std::mem::take(base_value);
                        *base_value = deep_merge(taken, overlay_value);
                    }
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
            Value::Object(base_map)
        }

        // Arrays: REPLACE (no concatenation)
        (Value::Array(_), overlay @ Value::Array(_)) => overlay,

        // Scalars and any other case: overlay wins
        (_, overlay) => overlay,
    }
}

/// Merge multiple layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

/// Fold loaded documents (root-most ancestor first) into one entity map.
///
/// Every document is checked for non-entity top-level keys after folding;
/// the first offending key aborts the merge.
pub fn merge_documents(documents: &[LoadedDocument]) -> Result<Map<String, Value>, ResolveError> {
    let merged = documents.iter().fold(Value::Object(Map::new()), |acc, doc| {
        deep_merge(acc, Value::Object(doc.entities.clone()))
    });

    for doc in documents {
        validate_top_level_keys(doc)?;
    }

    match merged {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Reject any top-level key that is not an entity key.
///
/// `extends` and `$schema` are removed by the reader, so everything left
/// must start with the entity sentinel.
pub fn validate_top_level_keys(doc: &LoadedDocument) -> Result<(), ResolveError> {
    match doc.entities.keys().find(|key| !is_entity_key(key)) {
        None => Ok(()),
        Some(key) => Err(ResolveError::InvalidTopLevelKey {
            key: key.clone(),
            file: doc.path.clone(),
            move_to: DEPRECATED_KEYS
                .iter()
                .find(|(old, _)| *old == key.as_str())
                .map(|(_, new)| *new),
        }),
    }
}

/// Overwrite the fields that must reflect the actual invocation.
///
/// Values inherited from ancestors for these fields are discarded.
pub fn apply_computed_overrides(
    merged: &mut Map<String, Value>,
    workspace_root: &Path,
    root_document: &Path,
) {
    let root_dir = Value::String(paths::to_slash(workspace_root));
    let config_path = Value::String(paths::to_slash(&paths::relative_to(
        root_document,
        workspace_root,
    )));

    set_value_at(merged, &[WORKSPACE_ENTITY, "rootDir"], root_dir.clone());
    set_value_at(merged, &[WORKSPACE_ENTITY, "configPath"], config_path);
    set_value_at(merged, &[JAVASCRIPT_API_ENTITY, "workspaceDir"], root_dir.clone());
    set_value_at(merged, &[SHELL_ENV_ENTITY, "env", "WORKSPACE_DIR"], root_dir);
}
