//! Shared workspace fixtures for integration tests
//!
//! Each [`Workspace`] is a throwaway directory tree with helpers to write
//! documents and build resolvers against it.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::TempDir;
use workspace_config::{paths, DocumentReader, EngineSettings, Resolver};

pub struct Workspace {
    temp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    /// Absolute, normalized workspace root
    pub fn root(&self) -> PathBuf {
        paths::normalize(self.temp.path())
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Write `text` to `rel`, creating parent directories
    pub fn write(&self, rel: &str, text: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    /// Write a document that already carries the expected `$schema`
    pub fn write_enveloped(&self, rel: &str, body: &str) -> PathBuf {
        let path = self.path(rel);
        let schema = self.schema_ref(path.parent().unwrap());
        self.write(rel, &format!("$schema: {}\n{}", schema, body))
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap()
    }

    pub fn modified(&self, rel: &str) -> SystemTime {
        fs::metadata(self.path(rel)).unwrap().modified().unwrap()
    }

    /// `$schema` value a document in `dir` should carry under default settings
    pub fn schema_ref(&self, dir: &Path) -> String {
        let settings = EngineSettings::default();
        DocumentReader::new(settings.schema_location(&self.root())).expected_schema_ref(dir)
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::new(&self.root(), EngineSettings::default()).unwrap()
    }

    /// Resolver that neither backfills timestamps nor writes sidecars
    pub fn plain_resolver(&self) -> Resolver {
        self.resolver_with(plain_settings())
    }

    pub fn resolver_with(&self, settings: EngineSettings) -> Resolver {
        Resolver::new(&self.root(), settings).unwrap()
    }
}

pub fn plain_settings() -> EngineSettings {
    EngineSettings {
        emit_cache: false,
        backfill_timestamps: false,
        ..EngineSettings::default()
    }
}
