//! Resolution pipeline
//!
//! Ties the pieces together for one workspace: read the root document,
//! follow its extends chain, fold the chain, apply computed fields,
//! compile deferred expressions, track provenance and emit sidecars.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::cache::EntityCacheEmitter;
use crate::deferred::{compile_deferred, ConfigValue};
use crate::document::{DocumentReader, LoadedDocument};
use crate::error::ResolveError;
use crate::extends::{ExtendsResolver, ExtendsTreeNode, PackageLocator};
use crate::merge::{apply_computed_overrides, merge_documents};
use crate::paths;
use crate::provenance::{track_entity_sources, EntitySources};
use crate::settings::EngineSettings;

/// Default root document, relative to the workspace root
pub const DEFAULT_ROOT_DOCUMENT: &str = ".workspace/workspace.yaml";

/// Final entity map of one resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MergedConfig {
    entities: IndexMap<String, ConfigValue>,
}

impl MergedConfig {
    pub fn new(entities: IndexMap<String, ConfigValue>) -> Self {
        Self { entities }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entities.get(key)
    }

    /// Entity value, if it contains no deferred expression
    pub fn entity(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(ConfigValue::as_plain)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entities.keys()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entities.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Look up a dotted path such as `#Foo.list.0.name`.
    ///
    /// The first segment is the entity key. Deferred expressions met along
    /// the way are evaluated.
    pub fn get_path(&self, path: &str) -> Result<Option<Value>, ResolveError> {
        let segments: Vec<&str> = path.split('.').collect();
        let Some((first, rest)) = segments.split_first() else {
            return Ok(None);
        };
        let Some(mut current) = self.entities.get(*first) else {
            return Ok(None);
        };

        for (i, segment) in rest.iter().enumerate() {
            let next = match current {
                ConfigValue::Object(map) => map.get(*segment),
                ConfigValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                ConfigValue::Plain(value) => return Ok(descend(value, &rest[i..]).cloned()),
                ConfigValue::Deferred(expr) => {
                    let value = expr.evaluate()?;
                    return Ok(descend(&value, &rest[i..]).cloned());
                }
            };
            match next {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }

        Ok(Some(current.materialize()?))
    }

    /// Evaluate every deferred expression into a plain entity map
    pub fn materialize(&self) -> Result<Map<String, Value>, ResolveError> {
        let mut out = Map::new();
        for (key, value) in &self.entities {
            out.insert(key.clone(), value.materialize()?);
        }
        Ok(out)
    }
}

fn descend<'v>(value: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    segments.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Output of [`Resolver::resolve`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub merged_config: MergedConfig,
    pub extends_tree: ExtendsTreeNode,
    pub entity_sources: EntitySources,

    /// Loaded documents in merge order
    #[serde(skip)]
    pub documents: Vec<LoadedDocument>,

    /// Sidecars written by this resolution
    #[serde(skip)]
    pub cache_files: Vec<PathBuf>,
}

impl Resolution {
    /// JSON view. With `materialize`, deferred expressions are evaluated;
    /// otherwise they show as their source text.
    pub fn to_value(&self, materialize: bool) -> Result<Value, ResolveError> {
        let serialize_error = |e: serde_json::Error| ResolveError::Serialize {
            path: self.extends_tree.absolute_location.clone(),
            message: e.to_string(),
        };

        let merged = if materialize {
            Value::Object(self.merged_config.materialize()?)
        } else {
            serde_json::to_value(&self.merged_config).map_err(serialize_error)?
        };

        Ok(serde_json::json!({
            "mergedConfig": merged,
            "extendsTree": serde_json::to_value(&self.extends_tree).map_err(serialize_error)?,
            "entitySources": serde_json::to_value(&self.entity_sources).map_err(serialize_error)?,
        }))
    }
}

/// Resolves documents of one workspace
#[derive(Debug, Clone)]
pub struct Resolver {
    workspace_root: PathBuf,
    settings: EngineSettings,
    reader: DocumentReader,
    packages: PackageLocator,
    cache: EntityCacheEmitter,
}

impl Resolver {
    /// A relative `workspace_root` is taken from the current directory
    pub fn new(workspace_root: &Path, settings: EngineSettings) -> Result<Self, ResolveError> {
        let workspace_root = if workspace_root.is_absolute() {
            paths::normalize(workspace_root)
        } else {
            let cwd = std::env::current_dir().map_err(|e| ResolveError::io(workspace_root, e))?;
            paths::absolutize(workspace_root, &cwd)
        };

        let reader = DocumentReader::new(settings.schema_location(&workspace_root))
            .with_backfill(settings.backfill_timestamps);
        let packages = PackageLocator::new(
            settings.module_dirs.clone(),
            settings.module_path_locations(&workspace_root),
        );
        let cache =
            EntityCacheEmitter::new(workspace_root.clone(), settings.cache_location(&workspace_root));

        Ok(Self {
            workspace_root,
            settings,
            reader,
            packages,
            cache,
        })
    }

    pub fn with_defaults(workspace_root: &Path) -> Result<Self, ResolveError> {
        Self::new(workspace_root, EngineSettings::default())
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn cache(&self) -> &EntityCacheEmitter {
        &self.cache
    }

    /// `.workspace/workspace.yaml` under the workspace root
    pub fn default_root_document(&self) -> PathBuf {
        self.workspace_root.join(DEFAULT_ROOT_DOCUMENT)
    }

    /// Resolve the workspace's default root document
    pub fn resolve_workspace(&self) -> Result<Resolution, ResolveError> {
        self.resolve(&self.default_root_document())
    }

    /// Resolve `root`; a relative path is taken from the workspace root
    pub fn resolve(&self, root: &Path) -> Result<Resolution, ResolveError> {
        let root = paths::absolutize(root, &self.workspace_root);

        let chain = ExtendsResolver::new(&self.reader, &self.packages).resolve(&root)?;
        let root = chain.tree.absolute_location.clone();
        let root_dir = root.parent().unwrap_or(&self.workspace_root).to_path_buf();

        let mut merged = merge_documents(&chain.documents)?;
        apply_computed_overrides(&mut merged, &self.workspace_root, &root);

        let entities = compile_deferred(merged, &chain.documents, &root_dir)?;
        let entity_sources = track_entity_sources(&chain.documents);

        let cache_files = if self.settings.emit_cache {
            self.cache.emit(&chain.documents)?
        } else {
            Vec::new()
        };

        tracing::info!(
            root = %root.display(),
            documents = chain.documents.len(),
            entities = entities.len(),
            "Resolved configuration"
        );

        Ok(Resolution {
            merged_config: MergedConfig::new(entities),
            extends_tree: chain.tree,
            entity_sources,
            documents: chain.documents,
            cache_files,
        })
    }

    /// Delete every sidecar of this workspace
    pub fn clear_cache(&self) -> Result<usize, ResolveError> {
        let removed = self.cache.clear()?;
        tracing::info!(cache_dir = %self.cache.cache_dir().display(), removed, "Cleared entity cache");
        Ok(removed)
    }
}

/// Resolve `root` inside `workspace_root` with default settings
pub fn resolve_config(root: &Path, workspace_root: &Path) -> Result<Resolution, ResolveError> {
    Resolver::with_defaults(workspace_root)?.resolve(root)
}

/// Delete every sidecar under the workspace's configured cache directory
pub fn clear_entity_cache(
    workspace_root: &Path,
    settings: &EngineSettings,
) -> Result<usize, ResolveError> {
    Resolver::new(workspace_root, settings.clone())?.clear_cache()
}
