//! Deferred expressions for workspace configuration values.
//!
//! A configuration string of the form `jit(<body>)` is not resolved when the
//! configuration is loaded. It is compiled into a [`DeferredExpression`] that
//! reads its inputs every time it is evaluated.
//!
//! The body language has exactly two functions:
//! - `join(a, b, ...)` concatenates its arguments
//! - `pick(file, path)` reads a JSON file and descends a dotted path
//!
//! Arguments are string literals or nested calls. Nothing else is executed.

mod error;
mod eval;
mod parser;

pub use error::ExprError;
pub use eval::{evaluate, pick_path};
pub use parser::parse;

use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// Tag that opens a deferred expression string.
pub const TAG_PREFIX: &str = "jit(";

/// Tag that closes a deferred expression string.
pub const TAG_SUFFIX: &str = ")";

/// Callable primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Join,
    Pick,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "join" => Some(Function::Join),
            "pick" => Some(Function::Pick),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Join => "join",
            Function::Pick => "pick",
        }
    }
}

/// Parsed expression body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// String literal
    Str(String),

    /// Call to one of the primitives
    Call { function: Function, args: Vec<Expr> },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Str(s) => {
                write!(f, "'")?;
                for c in s.chars() {
                    match c {
                        '\'' => write!(f, "\\'")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "'")
            }
            Expr::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Return the body of a tagged `jit(...)` string, if the string is one.
pub fn tagged_body(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    trimmed
        .strip_prefix(TAG_PREFIX)
        .and_then(|rest| rest.strip_suffix(TAG_SUFFIX))
}

/// A compiled `jit(...)` value bound to the directory it was declared in.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredExpression {
    source: String,
    expr: Expr,
    base_dir: PathBuf,
}

impl DeferredExpression {
    /// Compile a tagged string. Returns `Ok(None)` for untagged strings.
    pub fn compile(value: &str, base_dir: &Path) -> Result<Option<Self>, ExprError> {
        let Some(body) = tagged_body(value) else {
            return Ok(None);
        };
        let expr = parse(body)?;
        Ok(Some(Self {
            source: value.to_string(),
            expr,
            base_dir: base_dir.to_path_buf(),
        }))
    }

    /// The original tagged string
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Directory relative file references are resolved against
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Evaluate now. Every call re-reads any file the expression picks from.
    pub fn evaluate(&self) -> Result<Value, ExprError> {
        evaluate(&self.expr, &self.base_dir)
    }
}
