//! Workspace Config CLI
//!
//! Entry point for the `wsconfig` command-line tool.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workspace_config::{set_config_value, EngineSettings, Resolution, Resolver, SetOptions};

#[derive(Parser)]
#[command(name = "wsconfig")]
#[command(about = "Resolve hierarchical workspace configuration", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a configuration document and print the result as JSON
    Resolve {
        /// Root document (default: .workspace/workspace.yaml)
        root: Option<PathBuf>,

        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Evaluate deferred expressions instead of printing their source
        #[arg(long)]
        materialize: bool,

        /// Do not write entity cache sidecars
        #[arg(long)]
        no_cache: bool,
    },

    /// Print the extends tree of a configuration document
    Tree {
        /// Root document (default: .workspace/workspace.yaml)
        root: Option<PathBuf>,

        #[command(flatten)]
        workspace: WorkspaceArgs,
    },

    /// Print where each entity is declared
    Sources {
        /// Root document (default: .workspace/workspace.yaml)
        root: Option<PathBuf>,

        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Only show this entity key (e.g. '#workspace')
        #[arg(long, short = 'e')]
        entity: Option<String>,
    },

    /// Set one value inside a configuration document
    Set {
        /// Document to modify
        file: PathBuf,

        /// Dot-separated path (e.g. '#workspace.name')
        path: String,

        /// Value, parsed as JSON when possible, otherwise taken as a string
        value: String,

        /// Leave an existing value untouched
        #[arg(long)]
        if_absent: bool,
    },

    /// Entity cache management commands
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Delete every entity cache sidecar
    Clear {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },
}

#[derive(clap::Args)]
struct WorkspaceArgs {
    /// Workspace root directory
    #[arg(long, short = 'w', default_value = ".")]
    workspace: PathBuf,

    /// Path to settings file (default: .workspace/wsconfig.toml)
    #[arg(long, short = 's')]
    settings: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wsconfig=info,workspace_config=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            root,
            workspace,
            materialize,
            no_cache,
        } => {
            run_resolve(root, &workspace, materialize, no_cache);
        }
        Commands::Tree { root, workspace } => {
            run_tree(root, &workspace);
        }
        Commands::Sources {
            root,
            workspace,
            entity,
        } => {
            run_sources(root, &workspace, entity);
        }
        Commands::Set {
            file,
            path,
            value,
            if_absent,
        } => {
            run_set(&file, &path, &value, if_absent);
        }
        Commands::Cache { action } => match action {
            CacheCommands::Clear { workspace } => {
                run_cache_clear(&workspace);
            }
        },
    }
}

fn build_resolver(args: &WorkspaceArgs, no_cache: bool) -> Resolver {
    let overrides = no_cache.then(|| serde_json::json!({ "emit_cache": false }));

    let settings = match EngineSettings::load(&args.workspace, args.settings.as_deref(), overrides) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            process::exit(1);
        }
    };

    match Resolver::new(&args.workspace, settings) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn resolve_or_exit(resolver: &Resolver, root: Option<PathBuf>) -> Resolution {
    let root = root.unwrap_or_else(|| resolver.default_root_document());

    match resolver.resolve(&root) {
        Ok(resolution) => resolution,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_resolve(root: Option<PathBuf>, args: &WorkspaceArgs, materialize: bool, no_cache: bool) {
    let resolver = build_resolver(args, no_cache);
    let resolution = resolve_or_exit(&resolver, root);

    match resolution.to_value(materialize) {
        Ok(value) => print_json(&value),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn run_tree(root: Option<PathBuf>, args: &WorkspaceArgs) {
    let resolver = build_resolver(args, false);
    let resolution = resolve_or_exit(&resolver, root);

    print!("{}", resolution.extends_tree.to_human(resolver.workspace_root()));
}

fn run_sources(root: Option<PathBuf>, args: &WorkspaceArgs, entity: Option<String>) {
    let resolver = build_resolver(args, false);
    let resolution = resolve_or_exit(&resolver, root);

    let output = match entity {
        Some(key) => match resolution.entity_sources.get(&key) {
            Some(sources) => serde_json::to_value(sources),
            None => {
                eprintln!("Entity '{}' is not declared in any document.", key);
                eprintln!(
                    "Declared entities: {}",
                    resolution
                        .entity_sources
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                process::exit(1);
            }
        },
        None => serde_json::to_value(&resolution.entity_sources),
    };

    match output {
        Ok(value) => print_json(&value),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_set(file: &Path, path: &str, raw_value: &str, if_absent: bool) {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        eprintln!("Path must name at least one key");
        process::exit(1);
    }

    let value = serde_json::from_str::<Value>(raw_value)
        .unwrap_or_else(|_| Value::String(raw_value.to_string()));
    let options = SetOptions {
        only_if_absent: if_absent,
    };

    match set_config_value(file, &segments, value, options) {
        Ok(outcome) => match serde_json::to_value(outcome) {
            Ok(Value::String(name)) => println!("{}", name),
            Ok(other) => println!("{}", other),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn run_cache_clear(args: &WorkspaceArgs) {
    let resolver = build_resolver(args, false);

    match resolver.clear_cache() {
        Ok(removed) => {
            println!(
                "Removed {} sidecar(s) from {}",
                removed,
                resolver.cache().cache_dir().display()
            );
        }
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}
