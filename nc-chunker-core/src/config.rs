use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::contract::StorageOptions;
use crate::error::PipelineError;
use crate::resolve::InputPattern;

pub const DEFAULT_DATASET_NAME: &str = "mydataset";
pub const DEFAULT_INLINE_THRESHOLD: u64 = 100;
pub const DEFAULT_WORKERS: usize = 4;

pub fn default_concat_dims() -> Vec<String> {
    vec!["analysis_time".to_string(), "step".to_string()]
}

/// Everything one run needs. Built once (YAML file and/or CLI flags) and passed by
/// reference into each component; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub dataset_name: String,
    pub inputs: Vec<InputSpec>,
    pub input_format: InputFormat,
    /// Options for every input that does not bring its own.
    #[serde(deserialize_with = "deserialize_options")]
    pub storage_options: StorageOptions,
    /// Root of the index store; artifacts land in `index_dir/dataset_name/`.
    pub index_dir: PathBuf,
    /// Directory receiving `{dataset_name}.zarr`.
    pub output_dir: PathBuf,
    pub force_scan: bool,
    pub inline_threshold: u64,
    pub concat_dims: Vec<String>,
    pub workers: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            dataset_name: DEFAULT_DATASET_NAME.to_string(),
            inputs: Vec::new(),
            input_format: InputFormat::default(),
            storage_options: StorageOptions::new(),
            index_dir: PathBuf::from("json"),
            output_dir: PathBuf::from("zarr"),
            force_scan: false,
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
            concat_dims: default_concat_dims(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ChunkerConfig {
    pub fn trace_loaded(&self) {
        info!(
            dataset_name = %self.dataset_name,
            inputs_count = self.inputs.len(),
            index_dir = %self.index_dir.display(),
            output_dir = %self.output_dir.display(),
            force_scan = self.force_scan,
            workers = self.workers,
            "Loaded ChunkerConfig"
        );
        // Option values may hold credentials; only their keys are logged.
        debug!(
            input_format = ?self.input_format,
            storage_option_keys = ?self.storage_options.keys().collect::<Vec<_>>(),
            concat_dims = ?self.concat_dims,
            inline_threshold = self.inline_threshold,
            "ChunkerConfig details"
        );
    }

    /// Rejects values no component can work with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let name = self.dataset_name.trim();
        if name.is_empty() {
            return Err(PipelineError::Config("dataset name must not be empty".into()));
        }
        if name == "." || name == ".." || name.contains(|c| c == '/' || c == '\\') {
            return Err(PipelineError::Config(format!(
                "dataset name `{}` must be a single path component",
                self.dataset_name
            )));
        }
        if self.workers == 0 {
            return Err(PipelineError::Config("workers must be at least 1".into()));
        }
        Ok(())
    }

    /// Directory of this dataset inside the index store.
    pub fn dataset_dir(&self) -> PathBuf {
        self.index_dir.join(&self.dataset_name)
    }

    /// Fixed location of the consolidated artifact.
    pub fn merged_output_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.zarr", self.dataset_name))
    }

    /// Inputs paired with the options they resolve and open with.
    pub fn input_patterns(&self) -> Vec<InputPattern> {
        self.inputs
            .iter()
            .map(|input| InputPattern {
                pattern: input.pattern().to_string(),
                options: input
                    .storage_options()
                    .cloned()
                    .unwrap_or_else(|| self.storage_options.clone()),
            })
            .collect()
    }
}

/// An input glob, either bare or with its own backend options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputSpec {
    Pattern(String),
    Detailed {
        pattern: String,
        #[serde(default, deserialize_with = "deserialize_optional_options")]
        storage_options: Option<StorageOptions>,
    },
}

impl InputSpec {
    pub fn pattern(&self) -> &str {
        match self {
            InputSpec::Pattern(pattern) => pattern,
            InputSpec::Detailed { pattern, .. } => pattern,
        }
    }

    pub fn storage_options(&self) -> Option<&StorageOptions> {
        match self {
            InputSpec::Pattern(_) => None,
            InputSpec::Detailed {
                storage_options, ..
            } => storage_options.as_ref(),
        }
    }
}

impl From<&str> for InputSpec {
    fn from(pattern: &str) -> Self {
        InputSpec::Pattern(pattern.to_string())
    }
}

/// Which file signatures the default translator accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// NetCDF: classic (`CDF`) or netCDF-4 (HDF5 based).
    #[default]
    #[serde(alias = "netcdf", alias = "netcdf4")]
    Nc,
    #[serde(alias = "h5")]
    Hdf5,
}

impl From<&str> for InputFormat {
    fn from(s: &str) -> Self {
        match s {
            "nc" | "netcdf" | "netcdf4" | "NetCDF" => InputFormat::Nc,
            "hdf5" | "h5" | "HDF5" => InputFormat::Hdf5,
            other => {
                warn!(format = other, "Unknown input format, defaulting to nc");
                InputFormat::Nc
            }
        }
    }
}

/// Flattens a JSON object of backend options into strings. Non-string scalars keep
/// their JSON spelling (`true`, `3`), so `{"skip_signature": true}` works.
pub fn options_from_json(value: serde_json::Value) -> Result<StorageOptions, String> {
    let serde_json::Value::Object(map) = value else {
        return Err(format!("storage options must be a JSON object, got `{value}`"));
    };
    map.into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => Ok((key, s)),
            serde_json::Value::Null => Err(format!("storage option `{key}` has no value")),
            other => Ok((key, other.to_string())),
        })
        .collect()
}

fn deserialize_options<'de, D>(deserializer: D) -> Result<StorageOptions, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None => Ok(StorageOptions::new()),
        Some(value) => options_from_json(value).map_err(serde::de::Error::custom),
    }
}

fn deserialize_optional_options<'de, D>(deserializer: D) -> Result<Option<StorageOptions>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    value
        .map(options_from_json)
        .transpose()
        .map_err(serde::de::Error::custom)
}
