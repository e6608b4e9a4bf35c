///
/// This module implements the CLI interface for nc-chunker: command parsing,
/// argument exposure and the async entrypoint shared by `main` and the tests.
///
/// All pipeline logic (resolution, indexing, consolidation) lives in the
/// [`nc-chunker-core`] crate. This module only builds the configuration, picks
/// the default collaborators and reports the outcome.
///
/// ## How To Use
/// - For command-line users: run the `nc-chunker` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`nc-chunker-core`]: ../../nc-chunker-core/
use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use nc_chunker_core::combine::GroupStackCombiner;
use nc_chunker_core::config::{options_from_json, ChunkerConfig};
use nc_chunker_core::consolidate::ConsolidateOutcome;
use nc_chunker_core::contract::StorageOptions;
use nc_chunker_core::indexer::IndexOutcome;
use nc_chunker_core::pipeline::{self, ScanReport};
use nc_chunker_core::storage::DefaultStorage;
use nc_chunker_core::translate::SignatureTranslator;

use crate::load_config::build_config;

/// CLI for ker-chunking local or remote NetCDF files.
#[derive(Debug, Parser)]
#[command(
    name = "nc-chunker",
    version,
    about = "Index local or remote NetCDF files into one consolidated chunk-reference dataset"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase logging verbosity (-v debug, -vv trace; RUST_LOG overrides)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan every input and consolidate the dataset
    Run(ChunkArgs),
    /// Scan inputs into per-source index files only
    Scan(ChunkArgs),
    /// Merge the existing per-source index files only
    Consolidate(ChunkArgs),
}

/// Options shared by every subcommand. Unset options fall back to the config
/// file, then to the built-in defaults.
#[derive(Debug, Clone, Default, Args)]
pub struct ChunkArgs {
    /// YAML config file; flags given here override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Dataset name [default: mydataset]
    #[arg(long)]
    pub dataset_name: Option<String>,

    /// Input file url or glob, readable by the storage backend (repeatable)
    #[arg(short = 'i', long = "input")]
    pub inputs: Vec<String>,

    /// Input format: nc or hdf5 [default: nc]
    #[arg(long)]
    pub input_format: Option<String>,

    /// Storage backend options as a JSON object, applied to every input
    #[arg(long, visible_alias = "storage-options", value_parser = parse_storage_options)]
    pub input_fs_args: Option<StorageOptions>,

    /// Where to store per-source scan output as json [default: json]
    #[arg(long, visible_alias = "index-dir")]
    pub json_dir: Option<PathBuf>,

    /// Directory of the fully merged output [default: zarr]
    #[arg(long, visible_alias = "output-dir")]
    pub zarr_output: Option<PathBuf>,

    /// Force scanning input files, even if their json file exists
    #[arg(long)]
    pub force_scan: bool,

    /// Dimension to concatenate along (repeatable) [default: analysis_time, step]
    #[arg(long = "concat-dim")]
    pub concat_dims: Vec<String>,

    /// Largest source (bytes) inlined into its index [default: 100]
    #[arg(long)]
    pub inline_threshold: Option<u64>,

    /// Sources indexed concurrently [default: 4]
    #[arg(long)]
    pub workers: Option<usize>,
}

fn parse_storage_options(raw: &str) -> Result<StorageOptions, String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    options_from_json(value)
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let (command, args) = match &cli.command {
        Commands::Run(args) => ("run", args),
        Commands::Scan(args) => ("scan", args),
        Commands::Consolidate(args) => ("consolidate", args),
    };
    let config = build_config(args)?;
    config.trace_loaded();
    tracing::info!(command, dataset = %config.dataset_name, "Starting");

    let storage = DefaultStorage::new();
    let translator = SignatureTranslator::new(config.input_format);
    let combiner = GroupStackCombiner;

    let result = match cli.command {
        Commands::Run(_) => pipeline::run(&config, &storage, &translator, &combiner)
            .await
            .map(|report| {
                print_scan(&report.scan);
                print_consolidation(&config, &report.consolidation);
            }),
        Commands::Scan(_) => pipeline::scan(&config, &storage, &translator)
            .await
            .map(|report| print_scan(&report)),
        Commands::Consolidate(_) => pipeline::consolidate(&config, &combiner)
            .map(|outcome| print_consolidation(&config, &outcome)),
    };

    match result {
        Ok(()) => {
            tracing::info!(command, "Complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(command, error = %e, "Failed");
            Err(anyhow::Error::new(e).context(format!("{command} failed for dataset `{}`", config.dataset_name)))
        }
    }
}

fn print_scan(report: &ScanReport) {
    println!(
        "Scan complete: {} written, {} skipped, {} failed",
        report.written(),
        report.skipped(),
        report.failed()
    );
    for outcome in &report.outcomes {
        if let IndexOutcome::Failed { uri, error } = outcome {
            println!("  failed: {uri}: {error}");
        }
    }
}

fn print_consolidation(config: &ChunkerConfig, outcome: &ConsolidateOutcome) {
    match outcome {
        ConsolidateOutcome::Written { path, artifacts } => {
            println!("Consolidated {artifacts} index files into {}", path.display());
        }
        ConsolidateOutcome::Empty => {
            println!(
                "No index files found for dataset `{}`; nothing consolidated",
                config.dataset_name
            );
        }
    }
}
