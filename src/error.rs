//! Resolution errors
//!
//! Every error here aborts the whole resolution or write. Messages are
//! long-form and meant to be printed as-is by the CLI.

use std::io;
use std::path::{Path, PathBuf};

use wsconfig_expr::ExprError;

use crate::writer::ValidationIssue;

/// Errors raised by the resolution engine and the value writer
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("{}", missing_target_message(.path, .referenced_from.as_deref(), .chain))]
    MissingExtendsTarget {
        path: PathBuf,
        referenced_from: Option<PathBuf>,
        chain: Vec<PathBuf>,
    },

    #[error("{}", circular_message(.repeated, .chain))]
    CircularExtends { chain: Vec<PathBuf>, repeated: PathBuf },

    #[error("{}", invalid_key_message(.key, .file, .move_to.as_deref()))]
    InvalidTopLevelKey {
        key: String,
        file: PathBuf,
        move_to: Option<&'static str>,
    },

    #[error("{}", package_message(.reference, .referenced_from, .reason, .searched))]
    PackageResolution {
        reference: String,
        referenced_from: PathBuf,
        reason: String,
        searched: Vec<PathBuf>,
    },

    #[error("Invalid deferred expression at `{location}` (declared in {}):\n  {source}", .file.display())]
    InvalidExpression {
        location: String,
        file: PathBuf,
        #[source]
        source: ExprError,
    },

    #[error("{}", schema_message(.entity, .file, .issues))]
    SchemaValidation {
        entity: String,
        file: PathBuf,
        issues: Vec<ValidationIssue>,
    },

    #[error("Deferred expression evaluation failed: {0}")]
    Expression(#[from] ExprError),

    #[error("Cannot set a value in {}: the path must name at least one key and contain no empty keys", .file.display())]
    EmptyPath { file: PathBuf },

    #[error("Failed to serialize {}: {message}", .path.display())]
    Serialize { path: PathBuf, message: String },
}

impl ResolveError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        ResolveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn write_chain(out: &mut String, chain: &[PathBuf]) {
    out.push_str("\n\nResolution chain:");
    if chain.is_empty() {
        out.push_str("\n  (root document)");
    }
    for (i, location) in chain.iter().enumerate() {
        out.push_str(&format!("\n  {}. {}", i + 1, location.display()));
    }
}

fn missing_target_message(path: &Path, referenced_from: Option<&Path>, chain: &[PathBuf]) -> String {
    let mut out = format!("Extends target not found: {}", path.display());
    if let Some(from) = referenced_from {
        out.push_str(&format!("\n  referenced from: {}", from.display()));
    }
    write_chain(&mut out, chain);
    match referenced_from {
        Some(from) => out.push_str(&format!(
            "\n\nCreate {} or fix the `extends` entry in {}.",
            path.display(),
            from.display()
        )),
        None => out.push_str(&format!(
            "\n\nCreate {} or point the command at an existing config file.",
            path.display()
        )),
    }
    out
}

fn circular_message(repeated: &Path, chain: &[PathBuf]) -> String {
    let mut out = format!(
        "Circular extends detected: {} already appears in its own extends chain.",
        repeated.display()
    );
    write_chain(&mut out, chain);
    out.push_str(&format!("\n  -> {} (repeated)", repeated.display()));
    out.push_str("\n\nRemove one of the `extends` entries that closes the loop.");
    out
}

fn invalid_key_message(key: &str, file: &Path, move_to: Option<&str>) -> String {
    let mut out = format!(
        "Invalid top-level key `{}` in {}.\nOnly `extends` and entity keys starting with '#' are allowed at the top level.",
        key,
        file.display()
    );
    if let Some(target) = move_to {
        out.push_str(&format!(
            "\nThe `{}` key is deprecated: move its contents to `{}`.",
            key, target
        ));
    }
    out
}

fn package_message(reference: &str, from: &Path, reason: &str, searched: &[PathBuf]) -> String {
    let mut out = format!(
        "Cannot resolve packaged extends reference `{}` from {}: {}",
        reference,
        from.display(),
        reason
    );
    if !searched.is_empty() {
        out.push_str("\n\nSearched:");
        for dir in searched {
            out.push_str(&format!("\n  {}", dir.display()));
        }
    }
    out.push_str("\n\nInstall the package or use a relative `./` reference.");
    out
}

fn schema_message(entity: &str, file: &Path, issues: &[ValidationIssue]) -> String {
    let mut out = format!(
        "Entity `{}` in {} failed schema validation; nothing was written.",
        entity,
        file.display()
    );
    for issue in issues {
        out.push_str(&format!("\n  - {}: {}", issue.path, issue.message));
    }
    out
}
