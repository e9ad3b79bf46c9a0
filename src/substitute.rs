//! Variable substitution on raw document text
//!
//! Runs before YAML parsing, so it reaches every scalar in the document.
//! Injected paths always use forward slashes.

use regex_lite::{Captures, Regex};
use std::path::Path;
use std::sync::OnceLock;

use crate::paths;

/// Placeholder replaced with the document's own directory
pub const DIR_TOKEN: &str = "{__dirname}";

fn resolve_call() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"resolve\(\s*(?:'([^']*)'|"([^"]*)")\s*\)"#).unwrap())
}

/// Replace [`DIR_TOKEN`] and every `resolve('<path>')` call in `text`.
///
/// `resolve` paths are taken relative to `dir` unless already absolute.
pub fn substitute_variables(text: &str, dir: &Path) -> String {
    let dir_text = paths::to_slash(dir);
    let with_dir = text.replace(DIR_TOKEN, &dir_text);

    resolve_call()
        .replace_all(&with_dir, |caps: &Captures| {
            let literal = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            paths::to_slash(&paths::absolutize(Path::new(literal), dir))
        })
        .into_owned()
}
