//! Deepgraph CLI entry point.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use deepgraph_engine::{DeepWriter, EngineConfig, SweepPolicy};
use deepgraph_foundation::Document;
use deepgraph_runtime::{ReportStyle, Schema, load_from_file, render, render_entities, save_to_file};
use deepgraph_storage::{MemoryStore, World};

/// Exit status when the operation rolled back.
const CONFLICT: u8 = 2;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "deepgraph", version)]
#[command(about = "Deep update-or-create of nested documents into typed entities")]
struct Cli {
    /// Debug logging (overridden by DEEPGRAPH_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a document (or a JSON array of documents) to a snapshot
    Apply(ApplyArgs),
    /// Print the entities stored in a snapshot
    Show(ShowArgs),
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Schema file (JSON)
    #[arg(short, long, value_name = "PATH")]
    schema: PathBuf,

    /// Entity type of the root document
    #[arg(short, long)]
    root: String,

    /// Snapshot to read and, on commit, rewrite; created if missing
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    /// Entity type whose untouched related entities are deleted (repeatable)
    #[arg(short, long = "delete", value_name = "TYPE")]
    delete: Vec<String>,

    /// Use case selecting write profiles
    #[arg(long, default_value = "")]
    use_case: String,

    /// Roll back when an orphan cannot be deleted
    #[arg(long)]
    strict_sweep: bool,

    /// Allow documents to change unique-key fields of existing entities
    #[arg(long)]
    allow_key_mutation: bool,

    /// Report identities and actions only
    #[arg(long)]
    compact: bool,

    /// Document file, or `-` for standard input
    document: PathBuf,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Schema file (JSON)
    #[arg(short, long, value_name = "PATH")]
    schema: PathBuf,

    /// Snapshot to read
    #[arg(long, value_name = "PATH")]
    snapshot: PathBuf,

    /// Only show entities of this type
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    entity_type: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Apply(args) => apply(&args),
        Command::Show(args) => show(&args).map(|()| ExitCode::SUCCESS),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "deepgraph=debug" } else { "deepgraph=info" };
    let filter = EnvFilter::try_from_env("DEEPGRAPH_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn apply(args: &ApplyArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let schema = Schema::load(&args.schema)?;
    let world = match &args.snapshot {
        Some(path) if path.exists() => load_from_file(schema.registry.clone(), path)?,
        _ => World::new(schema.registry.clone()),
    };
    debug!(entities = world.entity_count(), "snapshot loaded");

    let json: serde_json::Value = serde_json::from_str(&read_document(&args.document)?)?;
    let writer = DeepWriter::new(engine_config(args)).with_profiles(schema.profiles);
    let delete: Vec<&str> = args.delete.iter().map(String::as_str).collect();

    let mut store = MemoryStore::from_world(world).with_key_mutation(args.allow_key_mutation);
    let report = if json.is_array() {
        let documents = Document::batch_from_json(&json)?;
        writer.deep_update_or_create_batch(&mut store, &args.root, &documents, &delete)?
    } else {
        let document = Document::from_json(&json)?;
        writer.deep_update_or_create(&mut store, &args.root, &document, &delete)?
    };

    let style = if args.compact {
        ReportStyle::Compact
    } else {
        ReportStyle::Verbose
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&render(&report, store.world(), style))?
    );

    if !report.committed {
        return Ok(ExitCode::from(CONFLICT));
    }
    if let Some(path) = &args.snapshot {
        save_to_file(store.world(), path)?;
        info!(path = %path.display(), "snapshot saved");
    }
    Ok(ExitCode::SUCCESS)
}

fn engine_config(args: &ApplyArgs) -> EngineConfig {
    EngineConfig::default()
        .with_use_case(args.use_case.as_str())
        .with_sweep_policy(if args.strict_sweep {
            SweepPolicy::Strict
        } else {
            SweepPolicy::BestEffort
        })
        .with_key_mutation(args.allow_key_mutation)
}

fn show(args: &ShowArgs) -> Result<(), Box<dyn std::error::Error>> {
    let schema = Schema::load(&args.schema)?;
    let world = load_from_file(schema.registry, &args.snapshot)?;
    let entities = render_entities(&world, args.entity_type.as_deref());
    println!("{}", serde_json::to_string_pretty(&entities)?);
    Ok(())
}

fn read_document(path: &Path) -> io::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        fs::read_to_string(path)
    }
}
