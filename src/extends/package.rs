//! Packaged extends references
//!
//! `@scope/name/path/to/file.yaml` or `name/path/to/file.yaml` resolve the
//! remainder path inside the installed package directory.

use std::path::{Path, PathBuf};

use crate::error::ResolveError;
use crate::paths;

/// Split a packaged reference into package name and remainder path.
///
/// Scoped names take two segments. Returns None when no package name can
/// be formed.
pub fn split_package_reference(reference: &str) -> Option<(&str, &str)> {
    let segments = if reference.starts_with('@') { 2 } else { 1 };

    let mut parts = reference.split('/');
    let mut name_len = 0;
    for i in 0..segments {
        let part = parts.next()?;
        if part.is_empty() || part == "@" {
            return None;
        }
        name_len += part.len() + usize::from(i > 0);
    }

    let remainder = reference.get(name_len + 1..).unwrap_or("");
    Some((&reference[..name_len], remainder))
}

/// Finds installed packages on disk
#[derive(Debug, Clone)]
pub struct PackageLocator {
    module_dirs: Vec<String>,
    module_paths: Vec<PathBuf>,
}

impl PackageLocator {
    /// `module_dirs` are directory names looked up in every ancestor
    /// (e.g. `node_modules`); `module_paths` are package roots searched first.
    pub fn new(module_dirs: Vec<String>, module_paths: Vec<PathBuf>) -> Self {
        Self {
            module_dirs,
            module_paths,
        }
    }

    /// Directories that would be checked for `package`, in search order
    pub fn candidates(&self, package: &str, from_dir: &Path) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = self
            .module_paths
            .iter()
            .map(|root| root.join(package))
            .collect();

        for ancestor in from_dir.ancestors() {
            for dir_name in &self.module_dirs {
                out.push(ancestor.join(dir_name).join(package));
            }
        }
        out
    }

    /// Installed directory of `package`, or every directory searched
    pub fn locate_package(&self, package: &str, from_dir: &Path) -> Result<PathBuf, Vec<PathBuf>> {
        let candidates = self.candidates(package, from_dir);
        match candidates.iter().find(|dir| dir.is_dir()) {
            Some(dir) => Ok(paths::normalize(dir)),
            None => Err(candidates),
        }
    }

    /// Absolute location of a packaged reference
    pub fn resolve(
        &self,
        reference: &str,
        from_dir: &Path,
        referenced_from: &Path,
    ) -> Result<PathBuf, ResolveError> {
        let failure = |reason: String, searched: Vec<PathBuf>| ResolveError::PackageResolution {
            reference: reference.to_string(),
            referenced_from: referenced_from.to_path_buf(),
            reason,
            searched,
        };

        let (package, remainder) = split_package_reference(reference)
            .ok_or_else(|| failure("not a valid package name".to_string(), Vec::new()))?;
        if remainder.is_empty() {
            return Err(failure(
                format!("reference names package `{}` but no file inside it", package),
                Vec::new(),
            ));
        }

        // the remainder must stay inside the package directory
        let inside = paths::normalize(Path::new(remainder));
        if inside.has_root() || inside.is_absolute() || inside.starts_with("..") {
            return Err(failure(
                format!("path `{}` points outside package `{}`", remainder, package),
                Vec::new(),
            ));
        }

        let package_dir = self
            .locate_package(package, from_dir)
            .map_err(|searched| failure(format!("package `{}` is not installed", package), searched))?;

        Ok(package_dir.join(inside))
    }
}
