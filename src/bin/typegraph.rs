//! Type Graph CLI
//!
//! Builds the type graph of a schema document, or checks every schema
//! document under a directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schema_typegraph::config::OutputFormat;
use schema_typegraph::{
    analyze_recursion, DocumentLoader, FsLoader, GraphSummary, SchemaTransformer, TypeGraphConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "typegraph")]
#[command(about = "Resolve JSON Schema documents into a type graph")]
struct Cli {
    /// Configuration file (defaults to typegraph.toml lookup)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform one document and print its graph summary as JSON
    Build {
        /// Schema document
        file: PathBuf,
        /// Name of the root type (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
        /// Single-line JSON output
        #[arg(long)]
        compact: bool,
    },

    /// Transform every schema document under a directory and report issues
    Check {
        /// Directory to scan (defaults to the configured loader root)
        dir: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether everything was free of errors
fn run(cli: Cli) -> Result<bool> {
    let config = TypeGraphConfig::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Build { file, name, compact } => {
            let loader = FsLoader::from_config(&config.loader);
            let transformer =
                SchemaTransformer::new(Box::new(loader.clone()), config.formats.registry());

            let document = loader.document_id(&file);
            let value = loader
                .load(&document)
                .with_context(|| format!("Failed to load {}", file.display()))?;
            let graph = transformer
                .transform(name.as_deref(), Some(document), &value)
                .with_context(|| format!("Failed to transform {}", file.display()))?;

            let summary = GraphSummary::from_graph(&graph);
            let compact = compact || config.output.format == OutputFormat::Compact;
            let rendered = if compact {
                serde_json::to_string(&summary)?
            } else {
                serde_json::to_string_pretty(&summary)?
            };
            println!("{}", rendered);
            Ok(!graph.has_errors())
        }

        Commands::Check { dir } => {
            let mut loader_config = config.loader.clone();
            if let Some(dir) = dir {
                loader_config.root = dir;
            }
            let loader = FsLoader::from_config(&loader_config);
            let transformer =
                SchemaTransformer::new(Box::new(loader.clone()), config.formats.registry());

            let files = loader.discover();
            println!("Checking {} schema documents in {}", files.len(), loader.root().display());

            let mut clean = true;
            for file in files {
                let document = loader.document_id(&file);
                let value = match loader.load(&document) {
                    Ok(value) => value,
                    Err(e) => {
                        println!("  ✗ {}: {}", document, e);
                        clean = false;
                        continue;
                    }
                };
                let graph = match transformer.transform(None, Some(document.clone()), &value) {
                    Ok(graph) => graph,
                    Err(e) => {
                        println!("  ✗ {}: {}", document, e);
                        clean = false;
                        continue;
                    }
                };

                let issues = graph.all_issues();
                if graph.has_errors() {
                    clean = false;
                    println!("  ✗ {}", document);
                } else {
                    println!("  ✓ {}", document);
                }
                for issue in issues {
                    println!("      {}", issue);
                }

                if let Some(root) = graph.root_id() {
                    let recursion = analyze_recursion(&graph, root);
                    for group in &recursion.groups {
                        let members: Vec<&str> = group
                            .members
                            .iter()
                            .map(|m| graph.node(*m).name())
                            .collect();
                        println!(
                            "      recursive: {} ({} indirect edges)",
                            members.join(", "),
                            group.indirect_edges.len()
                        );
                    }
                }
            }

            if clean {
                println!("All documents transformed cleanly");
            }
            Ok(clean)
        }
    }
}
