//! Lexical path helpers.
//!
//! Locations are compared after lexical normalization only. Symlinks are
//! never followed, so a path reached through a link and through its target
//! are different locations.

use std::path::{Component, Path, PathBuf};

/// Remove `.` components and fold `..` into the preceding component.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Join `path` onto `base` unless it is already absolute, then normalize.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Compute `path` relative to `base`. Both should be absolute and normalized.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path_parts: Vec<Component> = path.components().collect();
    let base_parts: Vec<Component> = base.components().collect();

    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &path_parts[common..] {
        out.push(part.as_os_str());
    }
    out
}

/// Render a path with forward slashes.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Relative reference from `from_dir` to `target`, always starting with
/// `./` or `../`.
pub fn relative_reference(target: &Path, from_dir: &Path) -> String {
    let rel = to_slash(&relative_to(target, from_dir));
    if rel.starts_with("../") || rel == ".." {
        rel
    } else {
        format!("./{}", rel)
    }
}
