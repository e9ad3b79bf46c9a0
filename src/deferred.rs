//! Deferred expression compilation over the merged configuration
//!
//! Every `jit(...)` string in the merged tree becomes a
//! [`DeferredExpression`] bound to the directory of the document that
//! supplied the winning value. Subtrees without any tagged string stay
//! plain JSON.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt::Write as _;
use std::path::Path;

use wsconfig_expr::{tagged_body, DeferredExpression, ExprError};

use crate::document::LoadedDocument;
use crate::error::ResolveError;

/// A merged configuration value that may contain deferred expressions
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// Subtree with no deferred expression inside
    Plain(Value),
    Array(Vec<ConfigValue>),
    Object(IndexMap<String, ConfigValue>),
    Deferred(DeferredExpression),
}

impl ConfigValue {
    /// The value if nothing below it is deferred
    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            ConfigValue::Plain(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_deferred(&self) -> Option<&DeferredExpression> {
        match self {
            ConfigValue::Deferred(expr) => Some(expr),
            _ => None,
        }
    }

    /// Child by object key
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        match self {
            ConfigValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Evaluate every deferred expression below this value
    pub fn materialize(&self) -> Result<Value, ExprError> {
        match self {
            ConfigValue::Plain(value) => Ok(value.clone()),
            ConfigValue::Deferred(expr) => expr.evaluate(),
            ConfigValue::Array(items) => items
                .iter()
                .map(ConfigValue::materialize)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            ConfigValue::Object(map) => {
                let mut out = Map::new();
                for (key, value) in map {
                    out.insert(key.clone(), value.materialize()?);
                }
                Ok(Value::Object(out))
            }
        }
    }

    /// JSON view with deferred expressions shown as their source text
    pub fn to_display_value(&self) -> Value {
        match self {
            ConfigValue::Plain(value) => value.clone(),
            ConfigValue::Deferred(expr) => Value::String(expr.source().to_string()),
            ConfigValue::Array(items) => {
                Value::Array(items.iter().map(ConfigValue::to_display_value).collect())
            }
            ConfigValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_display_value()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_display_value().serialize(serializer)
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

fn render_location(path: &[Segment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            Segment::Key(key) if out.is_empty() => out.push_str(key),
            Segment::Key(key) => {
                let _ = write!(out, ".{}", key);
            }
            Segment::Index(i) => {
                let _ = write!(out, "[{}]", i);
            }
        }
    }
    out
}

fn lookup<'v>(entities: &'v Map<String, Value>, path: &[Segment]) -> Option<&'v Value> {
    let (first, rest) = path.split_first()?;
    let mut current = match first {
        Segment::Key(key) => entities.get(key)?,
        Segment::Index(_) => return None,
    };
    for segment in rest {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(key)?,
            (Segment::Index(i), Value::Array(items)) => items.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

fn contains_tagged(value: &Value) -> bool {
    match value {
        Value::String(s) => tagged_body(s).is_some(),
        Value::Array(items) => items.iter().any(contains_tagged),
        Value::Object(map) => map.values().any(contains_tagged),
        _ => false,
    }
}

struct Compiler<'a> {
    documents: &'a [LoadedDocument],
    fallback_dir: &'a Path,
}

impl Compiler<'_> {
    /// Most specific document whose value at `path` is exactly `text`
    fn origin(&self, path: &[Segment], text: &str) -> Option<&LoadedDocument> {
        self.documents.iter().rev().find(|doc| {
            matches!(lookup(&doc.entities, path), Some(Value::String(s)) if s == text)
        })
    }

    fn compile(&self, value: Value, path: &mut Vec<Segment>) -> Result<ConfigValue, ResolveError> {
        if !contains_tagged(&value) {
            return Ok(ConfigValue::Plain(value));
        }

        match value {
            Value::String(text) => {
                let origin = self.origin(path, &text);
                let dir = origin.map(LoadedDocument::dir).unwrap_or(self.fallback_dir);
                let compiled = DeferredExpression::compile(&text, dir).map_err(|source| {
                    ResolveError::InvalidExpression {
                        location: render_location(path),
                        file: origin
                            .map(|doc| doc.path.clone())
                            .unwrap_or_else(|| self.fallback_dir.to_path_buf()),
                        source,
                    }
                })?;
                Ok(match compiled {
                    Some(expr) => ConfigValue::Deferred(expr),
                    None => ConfigValue::Plain(Value::String(text)),
                })
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    path.push(Segment::Index(i));
                    out.push(self.compile(item, path)?);
                    path.pop();
                }
                Ok(ConfigValue::Array(out))
            }
            Value::Object(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (key, item) in map {
                    path.push(Segment::Key(key.clone()));
                    let compiled = self.compile(item, path)?;
                    path.pop();
                    out.insert(key, compiled);
                }
                Ok(ConfigValue::Object(out))
            }
            other => Ok(ConfigValue::Plain(other)),
        }
    }
}

/// Compile every tagged string in `merged`.
///
/// `documents` are the merged documents in merge order; `fallback_dir` is
/// used for values no single document supplied verbatim.
pub fn compile_deferred(
    merged: Map<String, Value>,
    documents: &[LoadedDocument],
    fallback_dir: &Path,
) -> Result<IndexMap<String, ConfigValue>, ResolveError> {
    let compiler = Compiler {
        documents,
        fallback_dir,
    };

    let mut out = IndexMap::with_capacity(merged.len());
    let mut path = Vec::new();
    for (key, value) in merged {
        path.push(Segment::Key(key.clone()));
        let compiled = compiler.compile(value, &mut path)?;
        path.pop();
        out.insert(key, compiled);
    }
    Ok(out)
}
