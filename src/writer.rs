//! Path-scoped value writer
//!
//! Read-modify-write of a single nested field. The document is always read
//! fresh from disk and is only written when the stored value actually
//! changes. No locking is done: two concurrent writers can lose an update.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::document::{into_mapping, parse_yaml, write_yaml};
use crate::error::ResolveError;

/// Result of a write request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Value stored and file persisted
    Written,
    /// Stored value already deep-equals the new one
    Unchanged,
    /// `only_if_absent` was set and a value exists
    AlreadyPresent,
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

/// Options for [`set_config_value`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Leave an existing value in place
    pub only_if_absent: bool,
}

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path inside the entity
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Validates one entity's sub-tree before it is persisted
pub trait EntityValidator {
    /// Return every issue found; empty means valid
    fn validate(&self, entity_key: &str, entity: &Value) -> Vec<ValidationIssue>;
}

impl<F> EntityValidator for F
where
    F: Fn(&str, &Value) -> Vec<ValidationIssue>,
{
    fn validate(&self, entity_key: &str, entity: &Value) -> Vec<ValidationIssue> {
        self(entity_key, entity)
    }
}

/// Look up a nested value. Missing segments yield None.
pub fn value_at<'a, S: AsRef<str>>(map: &'a Map<String, Value>, path: &[S]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = map.get(first.as_ref())?;
    for segment in rest {
        current = current.as_object()?.get(segment.as_ref())?;
    }
    Some(current)
}

/// Set a nested value, creating (or replacing non-mapping) intermediates.
pub fn set_value_at<S: AsRef<str>>(map: &mut Map<String, Value>, path: &[S], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = map;
    for segment in parents {
        let entry = current
            .entry(segment.as_ref().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(next) => next,
            _ => return,
        };
    }
    current.insert(last.as_ref().to_string(), value);
}

fn read_document(file: &Path) -> Result<Map<String, Value>, ResolveError> {
    let text = fs::read_to_string(file).map_err(|e| ResolveError::io(file, e))?;
    into_mapping(parse_yaml(&text, file)?, file)
}

/// Read the value at `path` from a fresh read of `file`
pub fn get_config_value<S: AsRef<str>>(
    file: &Path,
    path: &[S],
) -> Result<Option<Value>, ResolveError> {
    let doc = read_document(file)?;
    Ok(value_at(&doc, path).cloned())
}

/// Set the value at `path` in `file`.
pub fn set_config_value<S: AsRef<str>>(
    file: &Path,
    path: &[S],
    value: Value,
    options: SetOptions,
) -> Result<WriteOutcome, ResolveError> {
    reject_empty_path(file, path)?;
    let mut doc = read_document(file)?;

    if let Some(outcome) = short_circuit(&doc, path, &value, options) {
        tracing::debug!(file = %file.display(), ?outcome, "Skipped config write");
        return Ok(outcome);
    }

    set_value_at(&mut doc, path, value);
    write_yaml(file, &Value::Object(doc))?;
    tracing::debug!(file = %file.display(), path = %join_path(path), "Wrote config value");
    Ok(WriteOutcome::Written)
}

/// Set `field_path` inside `entity_key`, validating the entity before writing.
///
/// On validation failure nothing is written and every issue is reported.
pub fn set_config_value_for_entity<S: AsRef<str>>(
    file: &Path,
    entity_key: &str,
    field_path: &[S],
    value: Value,
    validator: &dyn EntityValidator,
) -> Result<WriteOutcome, ResolveError> {
    let mut path: Vec<&str> = Vec::with_capacity(field_path.len() + 1);
    path.push(entity_key);
    path.extend(field_path.iter().map(|s| s.as_ref()));
    reject_empty_path(file, &path)?;

    let mut doc = read_document(file)?;

    if let Some(outcome) = short_circuit(&doc, &path, &value, SetOptions::default()) {
        tracing::debug!(file = %file.display(), ?outcome, "Skipped entity write");
        return Ok(outcome);
    }

    set_value_at(&mut doc, &path, value);

    let entity = doc.get(entity_key).cloned().unwrap_or(Value::Null);
    let issues = validator.validate(entity_key, &entity);
    if !issues.is_empty() {
        return Err(ResolveError::SchemaValidation {
            entity: entity_key.to_string(),
            file: file.to_path_buf(),
            issues,
        });
    }

    write_yaml(file, &Value::Object(doc))?;
    tracing::debug!(file = %file.display(), path = %join_path(&path), "Wrote entity value");
    Ok(WriteOutcome::Written)
}

fn reject_empty_path<S: AsRef<str>>(file: &Path, path: &[S]) -> Result<(), ResolveError> {
    if path.is_empty() || path.iter().any(|segment| segment.as_ref().is_empty()) {
        return Err(ResolveError::EmptyPath {
            file: file.to_path_buf(),
        });
    }
    Ok(())
}

fn short_circuit<S: AsRef<str>>(
    doc: &Map<String, Value>,
    path: &[S],
    value: &Value,
    options: SetOptions,
) -> Option<WriteOutcome> {
    let existing = value_at(doc, path);
    if options.only_if_absent && existing.is_some() {
        return Some(WriteOutcome::AlreadyPresent);
    }
    if existing == Some(value) {
        return Some(WriteOutcome::Unchanged);
    }
    None
}

fn join_path<S: AsRef<str>>(path: &[S]) -> String {
    path.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(".")
}
