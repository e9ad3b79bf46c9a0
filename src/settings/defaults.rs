//! Built-in engine defaults (layer 1)
//!
//! Hardcoded defaults for all engine settings.

use serde::{Deserialize, Serialize};

/// Built-in default engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Schema file referenced by `$schema` (workspace-relative)
    pub schema_path: String,

    /// Sidecar directory (workspace-relative)
    pub cache_dir: String,

    /// Write sidecars on every resolution (default: true)
    pub emit_cache: bool,

    /// Directory names searched in every ancestor for packages
    pub module_dirs: Vec<String>,

    /// Package roots searched before any ancestor (workspace-relative)
    pub module_paths: Vec<String>,

    /// Backfill entity timestamps on read (default: true)
    pub backfill_timestamps: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            schema_path: ".workspace/schema/workspace-config.schema.json".to_string(),
            cache_dir: ".workspace/cache/entities".to_string(),
            emit_cache: true,
            module_dirs: vec!["node_modules".to_string()],
            module_paths: Vec::new(),
            backfill_timestamps: true,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "schema_path": self.schema_path,
            "cache_dir": self.cache_dir,
            "emit_cache": self.emit_cache,
            "module_dirs": self.module_dirs,
            "module_paths": self.module_paths,
            "backfill_timestamps": self.backfill_timestamps
        })
    }
}
