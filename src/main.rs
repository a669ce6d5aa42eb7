//! revgraph CLI - assemble and merge per-revision code databases

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;
use revgraph::assembler::assemble_from_database;
use revgraph::cache::{load_snapshot, store_snapshot};
use revgraph::config::{default_config_path, resolve_config, write_config, RevgraphConfig};
use revgraph::pipeline::{Pipeline, RevisionInfo};
use revgraph::ui::{self, Icons, Spinner, TableBuilder};
use revgraph::{merge, Revision, Snapshot};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "revgraph")]
#[command(version)]
#[command(about = "Cross-revision code database: function definitions and call graph kept current along VCS diffs")]
#[command(long_about = r#"
revgraph turns the raw tables emitted by a compiler plugin into a snapshot
(files, functions, resolved call graph) and keeps a rolling snapshot current
by merging file-scoped rebuilds along each revision's diff.

Example usage:
  revgraph prepare --database full.sqlite --revision 1a2b3c
  hg export tip | revgraph update --database tip.sqlite --revision 4d5e6f --diff -
  revgraph stats --snapshot .revgraph/snapshot.json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress decorative output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a snapshot from a raw extraction database
    Assemble {
        /// Raw extraction database (SQLite)
        #[arg(short, long)]
        database: PathBuf,

        /// Revision the database was built from
        #[arg(short, long)]
        revision: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge two snapshots along a diff
    Merge {
        /// Rolling snapshot before the revision
        #[arg(short, long)]
        before: PathBuf,

        /// Snapshot of the recompiled files
        #[arg(short, long)]
        after: PathBuf,

        /// Diff file, or - for stdin
        #[arg(short, long)]
        diff: String,

        /// Output file for the merged snapshot (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output file for the change set
        #[arg(long)]
        changes: Option<PathBuf>,
    },

    /// Seed the rolling snapshot from a full build
    Prepare {
        /// Raw extraction database (SQLite)
        #[arg(short, long)]
        database: PathBuf,

        /// Revision the database was built from
        #[arg(short, long)]
        revision: String,
    },

    /// Advance the rolling snapshot by one revision and publish its changes
    Update {
        /// Raw extraction database of the recompiled files
        #[arg(short, long)]
        database: PathBuf,

        /// Revision the database was built from
        #[arg(short, long)]
        revision: String,

        /// Diff file, or - for stdin
        #[arg(long)]
        diff: String,

        /// Author recorded in the change report
        #[arg(long, default_value = "")]
        author: String,

        /// Description recorded in the change report
        #[arg(short, long, default_value = "")]
        message: String,
    },

    /// Show statistics about a snapshot
    Stats {
        /// Snapshot file (the rolling snapshot when omitted)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Write a config file with the current settings
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

fn read_diff(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(source).with_context(|| format!("reading diff {}", source))
}

fn read_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    load_snapshot(path)?.with_context(|| format!("no snapshot at {}", path.display()))
}

fn write_or_print(output: Option<&Path>, json: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{}", json),
    }
    Ok(())
}

fn print_stats(snapshot: &Snapshot) {
    let mut table = TableBuilder::new();
    table
        .add_row("Revision", snapshot.revision())
        .add_row("Files", snapshot.files().len())
        .add_row("Functions", snapshot.len())
        .add_row("Call edges", snapshot.edge_count())
        .add_row("Virtual (ambiguous) edges", snapshot.ambiguous_edge_count())
        .add_row("Dangling edges", snapshot.dangling_edges().len());
    println!("{}", table.build());
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.quiet {
        revgraph::output::set_quiet(true);
    }

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = resolve_config(cli.config.as_deref())?;
    let started = Instant::now();

    match cli.command {
        Commands::Assemble { database, revision, output } => {
            let spinner = Spinner::new("Assembling snapshot");
            let assembly = assemble_from_database(&database, Revision::new(revision))?;
            spinner.finish_and_clear();

            write_or_print(output.as_deref(), &assembly.snapshot.to_json()?)?;
            if output.is_some() {
                ui::success(&format!(
                    "Assembled {} functions in {} files",
                    assembly.stats.functions, assembly.stats.files
                ));
            }
            tracing::debug!("\n{}", assembly.stats);
        }

        Commands::Merge { before, after, diff, output, changes } => {
            let before = read_snapshot(&before)?;
            let after = read_snapshot(&after)?;
            let diff = read_diff(&diff)?;

            let outcome = merge(before, after, &diff)?;
            write_or_print(output.as_deref(), &outcome.snapshot.to_json()?)?;
            if let Some(path) = changes {
                std::fs::write(&path, outcome.changeset.to_json()?)?;
            }
            if output.is_some() {
                ui::section("Changes");
                ui::changeset(&outcome.changeset);
            }
        }

        Commands::Prepare { database, revision } => {
            ui::header(&format!("Preparing revision {}", revision));
            let spinner = Spinner::new("Assembling full build");
            let snapshot = Pipeline::new(config).prepare(&database, Revision::new(revision))?;
            spinner.finish_and_clear();

            ui::status(Icons::FILE, "Files", &snapshot.files().len().to_string());
            ui::status(Icons::LINK, "Functions", &snapshot.len().to_string());
            ui::success("Rolling snapshot ready");
        }

        Commands::Update { database, revision, diff, author, message } => {
            let diff = read_diff(&diff)?;
            let info = RevisionInfo {
                revision: Revision::new(revision),
                author,
                description: message,
            };

            ui::header(&format!("Updating to revision {}", info.revision));
            let spinner = Spinner::new("Assembling and merging");
            let summary = Pipeline::from_config(config).update(&database, info, &diff)?;
            spinner.finish_and_clear();

            if summary.bootstrapped {
                ui::warn("No rolling snapshot yet: this build became the baseline");
            } else {
                ui::status(Icons::BRANCH, "Deleted", &summary.partition.deleted.len().to_string());
                ui::status(Icons::NEW, "Inserted", &summary.partition.inserted.len().to_string());
                ui::status(Icons::MOD, "Modified", &summary.partition.modified.len().to_string());
                ui::section("Changes");
                ui::changeset(&summary.changeset);
            }
            if summary.dangling_edges > 0 {
                ui::warn(&format!("{} call edges point at removed functions", summary.dangling_edges));
            }
            ui::success(&format!(
                "Revision {}: {} functions in {} files",
                summary.revision, summary.functions, summary.files
            ));
        }

        Commands::Stats { snapshot } => {
            let path = snapshot.unwrap_or_else(|| config.cache_dir().join("snapshot.json"));
            let snapshot = read_snapshot(&path)?;
            ui::status(Icons::DATABASE, "Snapshot", &path.display().to_string());
            print_stats(&snapshot);
        }

        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(default_config_path);
            let config = RevgraphConfig {
                cache_dir: Some(config.cache_dir()),
                ..config
            };
            write_config(&path, &config, force)?;
            ui::success(&format!("Wrote {}", path.display()));
        }
    }

    ui::timing(&format!("{:.2?}", started.elapsed()));
    Ok(())
}
