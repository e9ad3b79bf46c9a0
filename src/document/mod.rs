//! Document reader
//!
//! Loads one configuration document, upgrading its on-disk shape first:
//! 1. Legacy shapes are wrapped or unwrapped into the `$schema` envelope
//! 2. Entities get `createdAt`/`updatedAt` backfilled
//! 3. The file is written back only if one of the steps changed something
//!
//! The returned entities come from the substituted text, with the envelope
//! and the `extends` list stripped out.

mod envelope;
mod timestamps;

pub use envelope::{migrate_envelope, EnvelopeMigration, LEGACY_WRAPPER_KEY, SCHEMA_KEY};
pub use timestamps::{backfill_timestamps, CREATED_AT, UPDATED_AT};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ResolveError;
use crate::paths;
use crate::substitute::substitute_variables;

/// First character of every entity key
pub const ENTITY_SENTINEL: char = '#';

/// Top-level key listing parent documents
pub const EXTENDS_KEY: &str = "extends";

/// Whether a top-level key names an entity
pub fn is_entity_key(key: &str) -> bool {
    key.starts_with(ENTITY_SENTINEL)
}

/// One document as loaded from disk
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Absolute, normalized location
    pub path: PathBuf,

    /// Top-level keys other than `$schema` and `extends`
    pub entities: Map<String, Value>,

    /// Raw `extends` references in declaration order
    pub extends: Vec<String>,

    /// File text as it is on disk after any rewrite
    pub raw_text: String,

    /// Whether this read rewrote the file
    pub was_rewritten: bool,
}

impl LoadedDocument {
    /// Directory containing the document
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }
}

/// Reads documents and migrates them in place
#[derive(Debug, Clone)]
pub struct DocumentReader {
    schema_path: PathBuf,
    backfill: bool,
}

impl DocumentReader {
    /// `schema_path` is the absolute location `$schema` references point at
    pub fn new(schema_path: PathBuf) -> Self {
        Self {
            schema_path,
            backfill: true,
        }
    }

    /// Enable or disable timestamp backfill
    pub fn with_backfill(mut self, backfill: bool) -> Self {
        self.backfill = backfill;
        self
    }

    /// The `$schema` value a document in `dir` should carry
    pub fn expected_schema_ref(&self, dir: &Path) -> String {
        paths::relative_reference(&self.schema_path, dir)
    }

    /// Load one document
    pub fn read(&self, path: &Path) -> Result<LoadedDocument, ResolveError> {
        let path = paths::normalize(path);
        let dir = path.parent().unwrap_or_else(|| Path::new("/")).to_path_buf();

        let original_text =
            fs::read_to_string(&path).map_err(|e| ResolveError::io(&path, e))?;
        let original = parse_yaml(&original_text, &path)?;

        let mut doc = into_mapping(original.clone(), &path)?;
        let mut reasons = Vec::new();

        if let Some(migration) = migrate_envelope(&mut doc, &self.expected_schema_ref(&dir)) {
            reasons.push(migration.describe());
        }

        if self.backfill {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            let added = backfill_timestamps(&mut doc, &now);
            if added > 0 {
                reasons.push("backfilled entity timestamps");
            }
        }

        let upgraded = Value::Object(doc);
        let (raw_text, was_rewritten) = if upgraded != original {
            let text = write_yaml(&path, &upgraded)?;
            tracing::info!(
                path = %path.display(),
                reasons = %reasons.join(", "),
                "Rewrote configuration document"
            );
            (text, true)
        } else {
            (original_text, false)
        };

        let substituted = substitute_variables(&raw_text, &dir);
        let mut entities = into_mapping(parse_yaml(&substituted, &path)?, &path)?;
        entities.shift_remove(SCHEMA_KEY);
        let extends = match entities.shift_remove(EXTENDS_KEY) {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => parse_extends(value, &path)?,
        };

        Ok(LoadedDocument {
            path,
            entities,
            extends,
            raw_text,
            was_rewritten,
        })
    }
}

/// Parse YAML text into a JSON value
pub(crate) fn parse_yaml(text: &str, path: &Path) -> Result<Value, ResolveError> {
    serde_yaml::from_str::<Value>(text).map_err(|e| ResolveError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Serialize a document and write it, returning the written text
pub(crate) fn write_yaml(path: &Path, value: &Value) -> Result<String, ResolveError> {
    let text = serde_yaml::to_string(value).map_err(|e| ResolveError::Serialize {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    fs::write(path, &text).map_err(|e| ResolveError::io(path, e))?;
    Ok(text)
}

/// Top level must be a mapping; an empty file counts as an empty mapping
pub(crate) fn into_mapping(value: Value, path: &Path) -> Result<Map<String, Value>, ResolveError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ResolveError::Parse {
            path: path.to_path_buf(),
            message: format!("top level must be a mapping, found {}", kind(&other)),
        }),
    }
}

fn parse_extends(value: Value, path: &Path) -> Result<Vec<String>, ResolveError> {
    let items = match value {
        Value::String(s) => return Ok(vec![s]),
        Value::Array(items) => items,
        other => {
            return Err(ResolveError::Parse {
                path: path.to_path_buf(),
                message: format!("`extends` must be a list of strings, found {}", kind(&other)),
            })
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(ResolveError::Parse {
                path: path.to_path_buf(),
                message: format!("`extends` entries must be strings, found {}", kind(&other)),
            }),
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
