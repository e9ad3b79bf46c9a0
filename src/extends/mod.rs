//! Extends resolution
//!
//! Follows `extends` references depth-first, parents before the document
//! that names them. Each branch carries its own visitation chain, so a
//! document reached through two separate branches (a diamond) is loaded
//! twice while a document reappearing inside its own chain is a cycle.

mod package;
mod tree;

pub use package::{split_package_reference, PackageLocator};
pub use tree::ExtendsTreeNode;

use std::path::{Path, PathBuf};

use crate::document::{DocumentReader, LoadedDocument};
use crate::error::ResolveError;
use crate::paths;

/// Result of following the extends chain of one document
#[derive(Debug, Clone)]
pub struct ResolvedChain {
    pub tree: ExtendsTreeNode,

    /// Loaded documents in merge order: least specific first, the
    /// requested document last
    pub documents: Vec<LoadedDocument>,
}

/// Compute the absolute location an `extends` reference points to
pub fn locate_reference(
    reference: &str,
    referencing_file: &Path,
    packages: &PackageLocator,
) -> Result<PathBuf, ResolveError> {
    let dir = referencing_file.parent().unwrap_or_else(|| Path::new("/"));
    if reference.starts_with('.') || Path::new(reference).is_absolute() {
        Ok(paths::absolutize(Path::new(reference), dir))
    } else {
        packages.resolve(reference, dir, referencing_file)
    }
}

/// Walks extends chains with a reader and a package locator
pub struct ExtendsResolver<'a> {
    reader: &'a DocumentReader,
    packages: &'a PackageLocator,
}

impl<'a> ExtendsResolver<'a> {
    pub fn new(reader: &'a DocumentReader, packages: &'a PackageLocator) -> Self {
        Self { reader, packages }
    }

    /// Resolve `root` and everything it extends
    pub fn resolve(&self, root: &Path) -> Result<ResolvedChain, ResolveError> {
        let root = paths::normalize(root);
        if !root.is_file() {
            return Err(ResolveError::MissingExtendsTarget {
                path: root,
                referenced_from: None,
                chain: Vec::new(),
            });
        }
        self.resolve_branch(&root, &[], None)
    }

    fn resolve_branch(
        &self,
        path: &Path,
        chain: &[PathBuf],
        reference: Option<&str>,
    ) -> Result<ResolvedChain, ResolveError> {
        let document = self.reader.read(path)?;
        let mut tree = ExtendsTreeNode::new(document.path.clone(), reference.map(String::from));
        let mut documents = Vec::new();

        let mut branch = chain.to_vec();
        branch.push(document.path.clone());

        for entry in &document.extends {
            let target = locate_reference(entry, &document.path, self.packages)?;

            if branch.contains(&target) {
                return Err(ResolveError::CircularExtends {
                    chain: branch,
                    repeated: target,
                });
            }
            if !target.is_file() {
                return Err(ResolveError::MissingExtendsTarget {
                    path: target,
                    referenced_from: Some(document.path.clone()),
                    chain: branch,
                });
            }

            tracing::debug!(
                from = %document.path.display(),
                reference = %entry,
                target = %target.display(),
                "Resolving extends"
            );

            let parent = self.resolve_branch(&target, &branch, Some(entry))?;
            tree.extends.push(parent.tree);
            documents.extend(parent.documents);
        }

        documents.push(document);
        Ok(ResolvedChain { tree, documents })
    }
}
