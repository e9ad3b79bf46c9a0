//! Engine settings
//!
//! Implements the 3-layer settings merge:
//! 1. Built-in defaults
//! 2. Settings file (.workspace/wsconfig.toml)
//! 3. CLI overrides
//!
//! Layers are merged with the same deep merge used for documents, then
//! deserialized into [`EngineSettings`].

mod defaults;

pub use defaults::BuiltinDefaults;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::merge::merge_layers;
use crate::paths;

/// Default settings file, relative to the workspace root
pub const SETTINGS_FILE: &str = ".workspace/wsconfig.toml";

/// Origin of a settings layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SettingsOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing settings layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsSource {
    /// Origin of this layer
    pub origin: SettingsOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Effective engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub schema_path: String,
    pub cache_dir: String,
    pub emit_cache: bool,
    pub module_dirs: Vec<String>,
    #[serde(default)]
    pub module_paths: Vec<String>,
    pub backfill_timestamps: bool,

    /// Contributing layers in precedence order
    #[serde(default, skip_deserializing)]
    pub sources: Vec<SettingsSource>,
}

impl From<BuiltinDefaults> for EngineSettings {
    fn from(defaults: BuiltinDefaults) -> Self {
        Self {
            schema_path: defaults.schema_path,
            cache_dir: defaults.cache_dir,
            emit_cache: defaults.emit_cache,
            module_dirs: defaults.module_dirs,
            module_paths: defaults.module_paths,
            backfill_timestamps: defaults.backfill_timestamps,
            sources: vec![SettingsSource {
                origin: SettingsOrigin::Builtin,
                path: None,
            }],
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        BuiltinDefaults::default().into()
    }
}

impl EngineSettings {
    /// Build settings from layers.
    ///
    /// With no explicit `settings_file`, `<workspace_root>/.workspace/wsconfig.toml`
    /// is used if it exists. An explicit file must exist.
    pub fn load(
        workspace_root: &Path,
        settings_file: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, SettingsError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        // Layer 1: Built-in defaults
        layers.push(BuiltinDefaults::default().to_value());
        sources.push(SettingsSource {
            origin: SettingsOrigin::Builtin,
            path: None,
        });

        // Layer 2: Settings file
        let file = match settings_file {
            Some(path) => Some(paths::absolutize(path, workspace_root)),
            None => {
                let default = workspace_root.join(SETTINGS_FILE);
                default.is_file().then_some(default)
            }
        };
        if let Some(path) = file {
            layers.push(Self::load_toml_file(&path)?);
            sources.push(SettingsSource {
                origin: SettingsOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
            });
        }

        // Layer 3: CLI overrides
        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(SettingsSource {
                origin: SettingsOrigin::Cli,
                path: None,
            });
        }

        let merged = merge_layers(layers);
        let mut settings: EngineSettings = serde_json::from_value(merged)
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        settings.validate()?;
        settings.sources = sources;

        Ok(settings)
    }

    /// Load and parse a TOML settings file
    fn load_toml_file(path: &Path) -> Result<Value, SettingsError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SettingsError::Io(format!("{}: {}", path.display(), e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| SettingsError::Parse(format!("TOML parse error: {}", e)))?;

        Ok(Self::toml_to_json(toml_value))
    }

    /// Convert TOML Value to JSON Value
    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => Value::Array(arr.into_iter().map(Self::toml_to_json).collect()),
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    /// Validate settings values
    fn validate(&self) -> Result<(), SettingsError> {
        for (name, value) in [("schema_path", &self.schema_path), ("cache_dir", &self.cache_dir)] {
            if value.trim().is_empty() {
                return Err(SettingsError::Invalid(format!("{} must not be empty", name)));
            }
            if Path::new(value).is_absolute() {
                return Err(SettingsError::Invalid(format!(
                    "{} must be relative to the workspace root, got {}",
                    name, value
                )));
            }
        }

        if self.module_dirs.is_empty() {
            return Err(SettingsError::Invalid(
                "module_dirs must list at least one directory name".to_string(),
            ));
        }

        Ok(())
    }

    /// Absolute schema location for a workspace
    pub fn schema_location(&self, workspace_root: &Path) -> PathBuf {
        paths::absolutize(Path::new(&self.schema_path), workspace_root)
    }

    /// Absolute sidecar directory for a workspace
    pub fn cache_location(&self, workspace_root: &Path) -> PathBuf {
        paths::absolutize(Path::new(&self.cache_dir), workspace_root)
    }

    /// Extra package roots, made absolute against the workspace root
    pub fn module_path_locations(&self, workspace_root: &Path) -> Vec<PathBuf> {
        self.module_paths
            .iter()
            .map(|p| paths::absolutize(Path::new(p), workspace_root))
            .collect()
    }
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}
