//! Extends tree for display.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// One resolved document and the documents it extends
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendsTreeNode {
    pub absolute_location: PathBuf,
    pub extends: Vec<ExtendsTreeNode>,

    /// Reference text as written in the parent; None for the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_reference_text: Option<String>,
}

impl ExtendsTreeNode {
    pub fn new(absolute_location: PathBuf, original_reference_text: Option<String>) -> Self {
        Self {
            absolute_location,
            extends: Vec::new(),
            original_reference_text,
        }
    }

    /// Every location in the tree, depth-first, parents before children
    pub fn locations(&self) -> Vec<&Path> {
        let mut out = vec![self.absolute_location.as_path()];
        for child in &self.extends {
            out.extend(child.locations());
        }
        out
    }

    /// Render as an indented tree, paths relative to `base` when possible
    pub fn to_human(&self, base: &Path) -> String {
        let mut out = String::new();
        self.render(base, "", true, true, &mut out);
        out
    }

    fn render(&self, base: &Path, prefix: &str, is_last: bool, is_root: bool, out: &mut String) {
        let shown = self
            .absolute_location
            .strip_prefix(base)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| self.absolute_location.display().to_string());

        let (branch, child_prefix) = if is_root {
            (String::new(), String::new())
        } else if is_last {
            (format!("{}└── ", prefix), format!("{}    ", prefix))
        } else {
            (format!("{}├── ", prefix), format!("{}│   ", prefix))
        };

        out.push_str(&branch);
        out.push_str(&shown);
        if let Some(reference) = &self.original_reference_text {
            out.push_str(&format!("  ({})", reference));
        }
        out.push('\n');

        for (i, child) in self.extends.iter().enumerate() {
            child.render(base, &child_prefix, i + 1 == self.extends.len(), false, out);
        }
    }
}
