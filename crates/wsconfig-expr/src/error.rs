//! Expression errors.

use std::path::PathBuf;

/// Errors raised while compiling or evaluating an expression
#[derive(Debug, thiserror::Error)]
pub enum ExprError {
    #[error("Syntax error at offset {offset} in `{input}`: {message}")]
    Syntax {
        input: String,
        offset: usize,
        message: String,
    },

    #[error("Unknown function `{0}`; only join() and pick() are supported")]
    UnknownFunction(String),

    #[error("{function}() expects {expected} argument(s), got {actual}")]
    Arity {
        function: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("{function}() argument {index} must be {expected}, got {actual}")]
    Type {
        function: &'static str,
        index: usize,
        expected: &'static str,
        actual: String,
    },

    #[error("pick() could not read {}: {message}", .file.display())]
    PickFile { file: PathBuf, message: String },

    #[error("pick() path `{path}` is undefined at segment `{segment}` in {}", .file.display())]
    PickPath {
        file: PathBuf,
        path: String,
        segment: String,
    },
}
