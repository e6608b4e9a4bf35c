/// `load_config` module: loads an optional YAML config file and merges the CLI
/// flags over it into the core [`ChunkerConfig`].
///
/// # Responsibilities
/// - Parse user-supplied YAML into the strongly-typed config
/// - Apply command-line overrides on top (flags win over the file)
/// - Validate the result so every failure surfaces before any storage is touched
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich diagnostics,
/// and are surfaced at the CLI boundary.
use std::fs;
use std::path::Path;

use anyhow::Result;
use nc_chunker_core::config::{ChunkerConfig, InputFormat, InputSpec};
use tracing::{error, info};

use crate::cli::ChunkArgs;

/// Reads a YAML config file. Missing keys take their defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ChunkerConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid "all defaults" config.
    if config_content.trim().is_empty() {
        return Ok(ChunkerConfig::default());
    }

    match serde_yaml::from_str(&config_content) {
        Ok(config) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(config)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Config file (if any) with the flags of `args` applied on top, validated.
pub fn build_config(args: &ChunkArgs) -> Result<ChunkerConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ChunkerConfig::default(),
    };

    if let Some(name) = &args.dataset_name {
        config.dataset_name = name.clone();
    }
    if !args.inputs.is_empty() {
        config.inputs = args.inputs.iter().map(|i| InputSpec::from(i.as_str())).collect();
    }
    if let Some(format) = &args.input_format {
        config.input_format = InputFormat::from(format.as_str());
    }
    if let Some(options) = &args.input_fs_args {
        config.storage_options = options.clone();
    }
    if let Some(dir) = &args.json_dir {
        config.index_dir = dir.clone();
    }
    if let Some(dir) = &args.zarr_output {
        config.output_dir = dir.clone();
    }
    if args.force_scan {
        config.force_scan = true;
    }
    if !args.concat_dims.is_empty() {
        config.concat_dims = args.concat_dims.clone();
    }
    if let Some(threshold) = args.inline_threshold {
        config.inline_threshold = threshold;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    config.validate()?;
    Ok(config)
}
