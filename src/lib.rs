//! Workspace Config - hierarchical configuration resolution
//!
//! This crate resolves a root workspace configuration document into one
//! merged configuration. Documents name their parents through `extends`
//! (relative files or files shipped in installed packages); the chain is
//! folded parent-first with object deep-merge and array replacement.
//! Legacy document shapes are migrated in place, `jit(...)` strings become
//! deferred expressions, and every entity is traced back to the files and
//! lines that declare it.

pub mod cache;
pub mod deferred;
pub mod document;
pub mod engine;
pub mod error;
pub mod extends;
pub mod merge;
pub mod paths;
pub mod provenance;
pub mod settings;
pub mod substitute;
pub mod writer;

pub use cache::{EntityCacheEmitter, EntityCacheFile};
pub use deferred::ConfigValue;
pub use document::{DocumentReader, LoadedDocument};
pub use engine::{clear_entity_cache, resolve_config, MergedConfig, Resolution, Resolver};
pub use error::ResolveError;
pub use extends::ExtendsTreeNode;
pub use provenance::{EntitySource, EntitySources};
pub use settings::{EngineSettings, SettingsError};
pub use writer::{
    get_config_value, set_config_value, set_config_value_for_entity, EntityValidator, SetOptions,
    ValidationIssue, WriteOutcome,
};
pub use wsconfig_expr::{DeferredExpression, ExprError};
