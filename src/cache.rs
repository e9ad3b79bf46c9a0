//! Entity metadata cache
//!
//! Writes one JSON sidecar per resolved document describing where each of
//! its entities is declared. Sidecars are regenerated on every resolution
//! and can be deleted at any time.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::document::LoadedDocument;
use crate::error::ResolveError;
use crate::paths;
use crate::provenance::scan_declarations;

/// One entity in a sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntity {
    pub line: usize,
    pub data: Value,
}

/// Sidecar file body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCacheFile {
    pub file_path: String,
    pub rel_path: String,
    pub entities: IndexMap<String, CachedEntity>,
    pub updated_at: DateTime<Utc>,
}

/// Sidecar file name for a workspace-relative document path
pub fn cache_file_name(rel_path: &str) -> String {
    format!("{}.json", rel_path.replace(['/', '\\'], "~"))
}

/// Writes and clears sidecars under one cache directory
#[derive(Debug, Clone)]
pub struct EntityCacheEmitter {
    workspace_root: PathBuf,
    cache_dir: PathBuf,
}

impl EntityCacheEmitter {
    pub fn new(workspace_root: PathBuf, cache_dir: PathBuf) -> Self {
        Self {
            workspace_root,
            cache_dir,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn rel_path(&self, document: &Path) -> String {
        paths::to_slash(&paths::relative_to(document, &self.workspace_root))
    }

    /// Location of the sidecar for `document`
    pub fn sidecar_path(&self, document: &Path) -> PathBuf {
        self.cache_dir.join(cache_file_name(&self.rel_path(document)))
    }

    /// Build the sidecar body for one document
    pub fn project(&self, document: &LoadedDocument) -> EntityCacheFile {
        let lines = scan_declarations(&document.raw_text);
        let entities = document
            .entities
            .iter()
            .map(|(key, data)| {
                let entity = CachedEntity {
                    line: lines.get(key).copied().unwrap_or(1),
                    data: data.clone(),
                };
                (key.clone(), entity)
            })
            .collect();

        EntityCacheFile {
            file_path: paths::to_slash(&document.path),
            rel_path: self.rel_path(&document.path),
            entities,
            updated_at: Utc::now(),
        }
    }

    /// Write sidecars for `documents`; each document is written once
    pub fn emit(&self, documents: &[LoadedDocument]) -> Result<Vec<PathBuf>, ResolveError> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| ResolveError::io(&self.cache_dir, e))?;

        let mut seen = HashSet::new();
        let mut written = Vec::new();
        for document in documents {
            if !seen.insert(document.path.clone()) {
                continue;
            }
            let target = self.sidecar_path(&document.path);
            let body = serde_json::to_string_pretty(&self.project(document)).map_err(|e| {
                ResolveError::Serialize {
                    path: target.clone(),
                    message: e.to_string(),
                }
            })?;
            fs::write(&target, body).map_err(|e| ResolveError::io(&target, e))?;
            tracing::debug!(sidecar = %target.display(), "Wrote entity cache");
            written.push(target);
        }
        Ok(written)
    }

    /// Read the sidecar for `document`, if one exists
    pub fn load(&self, document: &Path) -> Result<Option<EntityCacheFile>, ResolveError> {
        let target = self.sidecar_path(document);
        if !target.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&target).map_err(|e| ResolveError::io(&target, e))?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ResolveError::Parse {
                path: target,
                message: e.to_string(),
            })
    }

    /// Delete every sidecar. Returns how many files were removed.
    pub fn clear(&self) -> Result<usize, ResolveError> {
        if !self.cache_dir.is_dir() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in WalkDir::new(&self.cache_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| ResolveError::Io {
                path: self.cache_dir.clone(),
                source: e.into(),
            })?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(path).map_err(|e| ResolveError::io(path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
