//! `$schema` envelope migration
//!
//! Three on-disk shapes are upgraded to the current envelope:
//! - raw documents without `$schema` are wrapped
//! - the legacy `{ $schema, config: {...} }` wrapper is hoisted
//! - a `$schema` pointing anywhere else is corrected

use serde_json::{Map, Value};

/// Envelope marker field
pub const SCHEMA_KEY: &str = "$schema";

/// Key of the legacy double-nesting wrapper
pub const LEGACY_WRAPPER_KEY: &str = "config";

/// What a migration changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeMigration {
    /// No `$schema`: wrapped with a fresh envelope
    Wrapped,
    /// Legacy `config:` wrapper hoisted to the top level
    Unnested,
    /// `$schema` did not match the expected reference
    SchemaUpdated,
}

impl EnvelopeMigration {
    pub fn describe(&self) -> &'static str {
        match self {
            EnvelopeMigration::Wrapped => "wrapped raw document in envelope",
            EnvelopeMigration::Unnested => "hoisted legacy config wrapper",
            EnvelopeMigration::SchemaUpdated => "updated stale $schema reference",
        }
    }
}

/// Bring `doc` to the current envelope shape. Returns None when it already is.
pub fn migrate_envelope(doc: &mut Map<String, Value>, expected: &str) -> Option<EnvelopeMigration> {
    if !doc.contains_key(SCHEMA_KEY) {
        *doc = with_schema_first(std::mem::take(doc), expected);
        return Some(EnvelopeMigration::Wrapped);
    }

    if is_legacy_wrapper(doc) {
        let inner = match doc.shift_remove(LEGACY_WRAPPER_KEY) {
            Some(Value::Object(inner)) => inner,
            _ => Map::new(),
        };
        *doc = with_schema_first(inner, expected);
        return Some(EnvelopeMigration::Unnested);
    }

    if doc.get(SCHEMA_KEY).and_then(Value::as_str) != Some(expected) {
        doc.insert(SCHEMA_KEY.to_string(), Value::String(expected.to_string()));
        return Some(EnvelopeMigration::SchemaUpdated);
    }

    None
}

/// `{ $schema, config: { ... } }` with nothing else beside them
fn is_legacy_wrapper(doc: &Map<String, Value>) -> bool {
    matches!(doc.get(LEGACY_WRAPPER_KEY), Some(Value::Object(_)))
        && doc
            .keys()
            .all(|key| key == SCHEMA_KEY || key == LEGACY_WRAPPER_KEY)
}

fn with_schema_first(mut body: Map<String, Value>, expected: &str) -> Map<String, Value> {
    body.shift_remove(SCHEMA_KEY);
    let mut out = Map::new();
    out.insert(SCHEMA_KEY.to_string(), Value::String(expected.to_string()));
    out.extend(body);
    out
}
