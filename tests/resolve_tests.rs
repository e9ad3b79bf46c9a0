//! End-to-end resolution tests
//!
//! Each test builds a throwaway workspace, resolves a root document and
//! checks the merged config, the extends tree and the provenance map.

mod fixtures;

use std::fs;
use std::path::PathBuf;

use serde_json::{json, Value};

use fixtures::{plain_settings, Workspace};
use workspace_config::{EngineSettings, EntitySource, ResolveError};

// =============================================================================
// Merge laws
// =============================================================================

#[test]
fn test_end_to_end_scenario() {
    let ws = Workspace::new();
    let base = ws.write_enveloped("base.yaml", "'#Foo':\n  a: 1\n  b: 1\n");
    let root = ws.write_enveloped(
        "root.yaml",
        "extends:\n  - ./base.yaml\n'#Foo':\n  b: 2\n",
    );

    let resolution = ws.plain_resolver().resolve(&root).unwrap();

    assert_eq!(
        resolution.merged_config.entity("#Foo"),
        Some(&json!({"a": 1, "b": 2}))
    );

    let tree = &resolution.extends_tree;
    assert_eq!(tree.absolute_location, root);
    assert!(tree.original_reference_text.is_none());
    assert_eq!(tree.extends.len(), 1);
    assert_eq!(tree.extends[0].absolute_location, base);
    assert_eq!(tree.extends[0].original_reference_text.as_deref(), Some("./base.yaml"));

    assert_eq!(
        resolution.entity_sources["#Foo"],
        vec![
            EntitySource {
                document_location: base,
                line_number: 2,
            },
            EntitySource {
                document_location: root,
                line_number: 4,
            },
        ]
    );
}

#[test]
fn test_more_specific_document_wins_field_by_field() {
    let ws = Workspace::new();
    ws.write_enveloped(
        "parent.yaml",
        "'#Svc':\n  port: 80\n  host: example.org\n  tls:\n    enabled: false\n    cert: a.pem\n",
    );
    let root = ws.write_enveloped(
        "root.yaml",
        "extends: ./parent.yaml\n'#Svc':\n  port: 8080\n  tls:\n    enabled: true\n",
    );

    let merged = ws.plain_resolver().resolve(&root).unwrap().merged_config;

    assert_eq!(
        merged.entity("#Svc"),
        Some(&json!({
            "port": 8080,
            "host": "example.org",
            "tls": {"enabled": true, "cert": "a.pem"}
        }))
    );
}

#[test]
fn test_arrays_are_replaced_not_concatenated() {
    let ws = Workspace::new();
    ws.write_enveloped("parent.yaml", "'#E':\n  list: [1, 2, 3]\n");
    let root = ws.write_enveloped("root.yaml", "extends: [./parent.yaml]\n'#E':\n  list: [9]\n");

    let merged = ws.plain_resolver().resolve(&root).unwrap().merged_config;
    assert_eq!(merged.entity("#E").unwrap()["list"], json!([9]));
}

#[test]
fn test_later_sibling_overrides_earlier_sibling() {
    let ws = Workspace::new();
    ws.write_enveloped("a.yaml", "'#E':\n  v: a\n  only_a: true\n");
    ws.write_enveloped("b.yaml", "'#E':\n  v: b\n");
    let root = ws.write_enveloped("root.yaml", "extends:\n  - ./a.yaml\n  - ./b.yaml\n");

    let merged = ws.plain_resolver().resolve(&root).unwrap().merged_config;
    assert_eq!(merged.entity("#E"), Some(&json!({"v": "b", "only_a": true})));
}

#[test]
fn test_every_ancestor_entity_is_present() {
    let ws = Workspace::new();
    ws.write_enveloped("grand.yaml", "'#Grand': {x: 1}\n");
    ws.write_enveloped("parent.yaml", "extends: [./grand.yaml]\n'#Parent': {y: 2}\n");
    let root = ws.write_enveloped("root.yaml", "extends: [./parent.yaml]\n'#Root': {z: 3}\n");

    let merged = ws.plain_resolver().resolve(&root).unwrap().merged_config;
    for key in ["#Grand", "#Parent", "#Root", "#workspace", "#javascript-api", "#shell-env"] {
        assert!(merged.contains_key(key), "missing {}", key);
    }
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_cycle_message_names_both_documents() {
    let ws = Workspace::new();
    let a = ws.write_enveloped("cycle-a.yaml", "extends: [./cycle-b.yaml]\n");
    ws.write_enveloped("cycle-b.yaml", "extends: [./cycle-a.yaml]\n");

    let err = ws.plain_resolver().resolve(&a).unwrap_err();
    assert!(matches!(err, ResolveError::CircularExtends { .. }));

    let message = err.to_string();
    assert!(message.contains("cycle-a.yaml"), "{}", message);
    assert!(message.contains("cycle-b.yaml"), "{}", message);
}

#[test]
fn test_missing_target_names_file_to_fix() {
    let ws = Workspace::new();
    let root = ws.write_enveloped("root.yaml", "extends: [./nowhere.yaml]\n");

    let err = ws.plain_resolver().resolve(&root).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("nowhere.yaml"), "{}", message);
    assert!(message.contains(&root.display().to_string()), "{}", message);
}

#[test]
fn test_deprecated_key_in_parent_is_rejected_with_guidance() {
    let ws = Workspace::new();
    ws.write_enveloped("parent.yaml", "javascript:\n  entry: index.js\n");
    let root = ws.write_enveloped("root.yaml", "extends: [./parent.yaml]\n'#Foo': {}\n");

    let err = ws.plain_resolver().resolve(&root).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("`javascript`"), "{}", message);
    assert!(message.contains("#javascript-api"), "{}", message);
    assert!(message.contains("parent.yaml"), "{}", message);
}

#[test]
fn test_uninstalled_package_lists_searched_directories() {
    let ws = Workspace::new();
    let root = ws.write_enveloped("app/root.yaml", "extends: ['@acme/config/base.yaml']\n");

    match ws.plain_resolver().resolve(&root).unwrap_err() {
        ResolveError::PackageResolution { searched, .. } => {
            assert!(searched.contains(&ws.path("app/node_modules/@acme/config")));
            assert!(searched.contains(&ws.path("node_modules/@acme/config")));
        }
        other => panic!("expected PackageResolution, got {:?}", other),
    }
}

#[test]
fn test_invalid_expression_fails_resolution() {
    let ws = Workspace::new();
    let root = ws.write_enveloped("root.yaml", "'#Foo':\n  v: \"jit(process('x'))\"\n");

    let err = ws.plain_resolver().resolve(&root).unwrap_err();
    assert!(matches!(err, ResolveError::InvalidExpression { .. }));
    assert!(err.to_string().contains("#Foo.v"));
}

// =============================================================================
// Packages
// =============================================================================

#[test]
fn test_packaged_reference_resolves_from_ancestor_modules() {
    let ws = Workspace::new();
    let shared = ws.write_enveloped(
        "node_modules/@acme/config/presets/base.yaml",
        "'#Lint':\n  strict: true\n",
    );
    let root = ws.write_enveloped(
        "apps/web/root.yaml",
        "extends: ['@acme/config/presets/base.yaml']\n'#Lint':\n  rules: [a]\n",
    );

    let resolution = ws.plain_resolver().resolve(&root).unwrap();
    assert_eq!(resolution.extends_tree.extends[0].absolute_location, shared);
    assert_eq!(
        resolution.merged_config.entity("#Lint"),
        Some(&json!({"strict": true, "rules": ["a"]}))
    );
}

#[test]
fn test_packaged_reference_cannot_escape_package() {
    let ws = Workspace::new();
    ws.write_enveloped("node_modules/pkg/base.yaml", "'#P': {}\n");
    let leak = ws.write_enveloped("secret/leak.yaml", "'#Leak': {}\n");
    let root = ws.write_enveloped(
        "root.yaml",
        &format!("extends: ['pkg/{}']\n", leak.display()),
    );

    match ws.plain_resolver().resolve(&root).unwrap_err() {
        ResolveError::PackageResolution { reference, .. } => {
            assert!(reference.starts_with("pkg//"), "{}", reference);
        }
        other => panic!("expected PackageResolution, got {:?}", other),
    }
}

#[test]
fn test_module_paths_are_searched_first() {
    let ws = Workspace::new();
    ws.write_enveloped("node_modules/preset/base.yaml", "'#P': {from: node_modules}\n");
    ws.write_enveloped("vendor/preset/base.yaml", "'#P': {from: vendor}\n");
    let root = ws.write_enveloped("root.yaml", "extends: [preset/base.yaml]\n");

    let settings = EngineSettings {
        module_paths: vec!["vendor".to_string()],
        ..plain_settings()
    };
    let merged = ws.resolver_with(settings).resolve(&root).unwrap().merged_config;
    assert_eq!(merged.entity("#P").unwrap()["from"], "vendor");
}

// =============================================================================
// Computed fields and substitution
// =============================================================================

#[test]
fn test_computed_fields_reflect_invocation() {
    let ws = Workspace::new();
    ws.write_enveloped(
        "shared/base.yaml",
        "'#workspace':\n  rootDir: /somewhere/else\n  name: demo\n'#shell-env':\n  env:\n    FOO: bar\n",
    );
    let root = ws.write_enveloped(".workspace/workspace.yaml", "extends: [../shared/base.yaml]\n");

    let resolver = ws.plain_resolver();
    let merged = resolver.resolve(&root).unwrap().merged_config;
    let root_dir = ws.root().to_string_lossy().replace('\\', "/");

    let workspace = merged.entity("#workspace").unwrap();
    assert_eq!(workspace["rootDir"], json!(root_dir));
    assert_eq!(workspace["configPath"], ".workspace/workspace.yaml");
    assert_eq!(workspace["name"], "demo");
    assert_eq!(merged.entity("#javascript-api").unwrap()["workspaceDir"], json!(root_dir));
    assert_eq!(
        merged.entity("#shell-env").unwrap()["env"],
        json!({"FOO": "bar", "WORKSPACE_DIR": root_dir})
    );
}

#[test]
fn test_directory_token_and_resolve_calls_use_declaring_directory() {
    let ws = Workspace::new();
    ws.write_enveloped(
        "pkg/base.yaml",
        "'#Paths':\n  here: '{__dirname}'\n  assets: \"resolve('./assets')\"\n",
    );
    let root = ws.write_enveloped("root.yaml", "extends: [./pkg/base.yaml]\n");

    let merged = ws.plain_resolver().resolve(&root).unwrap().merged_config;
    let pkg = ws.path("pkg").to_string_lossy().replace('\\', "/");

    let paths = merged.entity("#Paths").unwrap();
    assert_eq!(paths["here"], json!(pkg));
    assert_eq!(paths["assets"], json!(format!("{}/assets", pkg)));

    // substituted text never reaches disk
    assert!(ws.read("pkg/base.yaml").contains("{__dirname}"));
}

// =============================================================================
// Deferred expressions
// =============================================================================

#[test]
fn test_deferred_pick_is_relative_to_declaring_document() {
    let ws = Workspace::new();
    ws.write("package.json", r#"{"version": "0.0.0"}"#);
    ws.write("pkg/package.json", r#"{"version": "1.2.3", "repo": {"urls": ["a", "b"]}}"#);
    ws.write_enveloped(
        "pkg/base.yaml",
        "'#Release':\n  version: \"jit(pick('./package.json', 'version'))\"\n  mirror: \"jit(join('git+', pick('./package.json', 'repo.urls[1]')))\"\n",
    );
    let root = ws.write_enveloped("root.yaml", "extends: [./pkg/base.yaml]\n'#Release':\n  channel: beta\n");

    let merged = ws.plain_resolver().resolve(&root).unwrap().merged_config;

    let release = merged.get("#Release").unwrap();
    let version = release.get("version").and_then(|v| v.as_deferred()).unwrap();
    assert_eq!(version.base_dir(), ws.path("pkg"));

    assert_eq!(
        merged.materialize().unwrap()["#Release"],
        json!({"version": "1.2.3", "mirror": "git+b", "channel": "beta"})
    );
}

#[test]
fn test_deferred_reads_file_on_every_access() {
    let ws = Workspace::new();
    ws.write("version.json", r#"{"v": 1}"#);
    let root = ws.write_enveloped("root.yaml", "'#Build':\n  v: \"jit(pick('./version.json', 'v'))\"\n");

    let merged = ws.plain_resolver().resolve(&root).unwrap().merged_config;
    assert_eq!(merged.get_path("#Build.v").unwrap(), Some(json!(1)));

    ws.write("version.json", r#"{"v": 2}"#);
    assert_eq!(merged.get_path("#Build.v").unwrap(), Some(json!(2)));
}

#[test]
fn test_deferred_pick_failure_names_missing_segment() {
    let ws = Workspace::new();
    ws.write("meta.json", r#"{"a": {}}"#);
    let root = ws.write_enveloped("root.yaml", "'#M':\n  v: \"jit(pick('./meta.json', 'a.b'))\"\n");

    let merged = ws.plain_resolver().resolve(&root).unwrap().merged_config;
    let err = merged.materialize().unwrap_err();
    assert!(matches!(err, ResolveError::Expression(_)));
    assert!(err.to_string().contains("a.b"), "{}", err);
}

// =============================================================================
// Auto-upgrade
// =============================================================================

#[test]
fn test_auto_upgrade_is_idempotent() {
    let ws = Workspace::new();
    ws.write("base.yaml", "'#Foo':\n  a: 1\n");
    let root = ws.write("root.yaml", "extends: [./base.yaml]\n'#Foo':\n  b: 2\n");

    let resolver = ws.resolver();

    let first = resolver.resolve(&root).unwrap();
    assert!(first.documents.iter().all(|d| d.was_rewritten));
    let root_after_first = ws.read("root.yaml");
    let base_after_first = ws.read("base.yaml");
    assert!(root_after_first.contains("$schema"));
    assert!(root_after_first.contains("createdAt"));

    let second = resolver.resolve(&root).unwrap();
    assert!(second.documents.iter().all(|d| !d.was_rewritten));
    assert_eq!(ws.read("root.yaml"), root_after_first);
    assert_eq!(ws.read("base.yaml"), base_after_first);

    assert_eq!(first.to_value(false).unwrap(), second.to_value(false).unwrap());
}

#[test]
fn test_legacy_wrapper_is_hoisted() {
    let ws = Workspace::new();
    let root = ws.write(
        "root.yaml",
        "$schema: ./old/schema.json\nconfig:\n  '#Foo':\n    a: 1\n",
    );

    let resolution = ws.plain_resolver().resolve(&root).unwrap();
    assert_eq!(resolution.merged_config.entity("#Foo"), Some(&json!({"a": 1})));

    let on_disk: Value = serde_yaml::from_str(&ws.read("root.yaml")).unwrap();
    assert!(on_disk.get("config").is_none());
    assert_eq!(on_disk["$schema"], json!(ws.schema_ref(&ws.root())));
    assert_eq!(on_disk["#Foo"], json!({"a": 1}));
}

#[test]
fn test_backfilled_timestamps_mirror_existing_value() {
    let ws = Workspace::new();
    let root = ws.write_enveloped(
        "root.yaml",
        "'#Foo':\n  createdAt: '2024-01-02T03:04:05.000Z'\n",
    );

    let merged = ws.resolver().resolve(&root).unwrap().merged_config;
    let foo = merged.entity("#Foo").unwrap();
    assert_eq!(foo["updatedAt"], "2024-01-02T03:04:05.000Z");
}

// =============================================================================
// Entity cache
// =============================================================================

#[test]
fn test_sidecars_written_per_document() {
    let ws = Workspace::new();
    ws.write_enveloped("base.yaml", "'#Foo':\n  a: 1\n");
    let root = ws.write_enveloped(".workspace/workspace.yaml", "extends: [../base.yaml]\n'#Bar': {}\n");

    let settings = EngineSettings {
        backfill_timestamps: false,
        ..EngineSettings::default()
    };
    let resolver = ws.resolver_with(settings);
    let resolution = resolver.resolve(&root).unwrap();

    let cache_dir = ws.path(".workspace/cache/entities");
    let mut expected = vec![
        cache_dir.join("base.yaml.json"),
        cache_dir.join(".workspace~workspace.yaml.json"),
    ];
    let mut written = resolution.cache_files.clone();
    expected.sort();
    written.sort();
    assert_eq!(written, expected);

    let sidecar: Value =
        serde_json::from_str(&fs::read_to_string(cache_dir.join("base.yaml.json")).unwrap()).unwrap();
    assert_eq!(sidecar["relPath"], "base.yaml");
    assert_eq!(sidecar["entities"]["#Foo"], json!({"line": 2, "data": {"a": 1}}));

    assert_eq!(resolver.clear_cache().unwrap(), 2);
    assert!(!cache_dir.join("base.yaml.json").exists());
}

#[test]
fn test_no_sidecars_when_disabled() {
    let ws = Workspace::new();
    let root = ws.write_enveloped("root.yaml", "'#Foo': {}\n");

    let resolution = ws.plain_resolver().resolve(&root).unwrap();
    assert!(resolution.cache_files.is_empty());
    assert!(!ws.path(".workspace/cache").exists());
}

// =============================================================================
// Provenance
// =============================================================================

#[test]
fn test_provenance_lists_less_specific_first_across_three_levels() {
    let ws = Workspace::new();
    let grand = ws.write_enveloped("grand.yaml", "'#E': {}\n");
    let parent = ws.write_enveloped("parent.yaml", "extends: [./grand.yaml]\n'#E': {}\n");
    let root = ws.write_enveloped("root.yaml", "extends: [./parent.yaml]\n'#E': {}\n'#Only': {}\n");

    let sources = ws.plain_resolver().resolve(&root).unwrap().entity_sources;

    let order: Vec<PathBuf> = sources["#E"].iter().map(|s| s.document_location.clone()).collect();
    assert_eq!(order, vec![grand, parent, root.clone()]);
    assert_eq!(sources["#Only"].len(), 1);
    assert_eq!(sources["#Only"][0].line_number, 4);
}
