//! Expression evaluation.

use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::{Expr, ExprError, Function};

/// Evaluate an expression with relative files resolved against `base_dir`.
pub fn evaluate(expr: &Expr, base_dir: &Path) -> Result<Value, ExprError> {
    match expr {
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Call { function, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate(arg, base_dir))
                .collect::<Result<Vec<_>, _>>()?;
            match function {
                Function::Join => join(&values),
                Function::Pick => pick(&values, base_dir),
            }
        }
    }
}

fn join(values: &[Value]) -> Result<Value, ExprError> {
    let mut out = String::new();
    for (index, value) in values.iter().enumerate() {
        match value {
            Value::String(s) => out.push_str(s),
            Value::Number(n) => out.push_str(&n.to_string()),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            other => {
                return Err(ExprError::Type {
                    function: "join",
                    index,
                    expected: "a string, number or boolean",
                    actual: type_name(other).to_string(),
                })
            }
        }
    }
    Ok(Value::String(out))
}

fn pick(values: &[Value], base_dir: &Path) -> Result<Value, ExprError> {
    if values.len() != 2 {
        return Err(ExprError::Arity {
            function: "pick",
            expected: "2",
            actual: values.len(),
        });
    }
    let file = string_arg("pick", 0, &values[0])?;
    let path = string_arg("pick", 1, &values[1])?;

    let file_path = base_dir.join(file);
    let contents = fs::read_to_string(&file_path).map_err(|e| ExprError::PickFile {
        file: file_path.clone(),
        message: e.to_string(),
    })?;
    let document: Value = serde_json::from_str(&contents).map_err(|e| ExprError::PickFile {
        file: file_path.clone(),
        message: format!("invalid JSON: {}", e),
    })?;

    pick_path(&document, path)
        .cloned()
        .map_err(|segment| ExprError::PickPath {
            file: file_path,
            path: path.to_string(),
            segment,
        })
}

fn string_arg<'v>(
    function: &'static str,
    index: usize,
    value: &'v Value,
) -> Result<&'v str, ExprError> {
    value.as_str().ok_or_else(|| ExprError::Type {
        function,
        index,
        expected: "a string",
        actual: type_name(value).to_string(),
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Descend `document` by a dotted path.
///
/// Each segment is either `name`, `name[index]`, or a bare array index.
/// On failure returns the segment that could not be resolved.
pub fn pick_path<'d>(document: &'d Value, path: &str) -> Result<&'d Value, String> {
    let mut current = document;
    if path.is_empty() {
        return Ok(current);
    }

    for segment in path.split('.') {
        let (name, index) = split_index(segment).ok_or_else(|| segment.to_string())?;

        if !name.is_empty() {
            current = match current {
                Value::Object(map) => map.get(name),
                Value::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(|| segment.to_string())?;
        }

        if let Some(i) = index {
            current = current
                .as_array()
                .and_then(|items| items.get(i))
                .ok_or_else(|| segment.to_string())?;
        }
    }

    Ok(current)
}

/// Split `name[3]` into `("name", Some(3))`. Returns None when malformed.
fn split_index(segment: &str) -> Option<(&str, Option<usize>)> {
    match segment.find('[') {
        None => Some((segment, None)),
        Some(open) => {
            let rest = segment[open + 1..].strip_suffix(']')?;
            let index = rest.parse::<usize>().ok()?;
            Some((&segment[..open], Some(index)))
        }
    }
}
