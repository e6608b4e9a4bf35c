use std::fs::write;
use std::path::PathBuf;

use nc_chunker::cli::ChunkArgs;
use nc_chunker::load_config::{build_config, load_config};
use nc_chunker_core::config::{ChunkerConfig, InputFormat, InputSpec};
use nc_chunker_core::contract::StorageOptions;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), yaml).unwrap();
    config_file
}

/// A config naming every field loads exactly as written.
#[test]
fn test_load_config_full_file() {
    let file = config_file(
        r#"
dataset_name: forecasts
inputs:
  - "s3://bucket/2024/*.nc"
  - pattern: "/data/local/**/*.nc"
    storage_options:
      anon: true
      max_retries: 3
input_format: hdf5
storage_options:
  region: eu-west-1
index_dir: ./tmp/json
output_dir: ./tmp/zarr
force_scan: true
inline_threshold: 500
concat_dims: [time]
workers: 8
"#,
    );

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.dataset_name, "forecasts");
    assert_eq!(config.input_format, InputFormat::Hdf5);
    assert_eq!(config.index_dir, PathBuf::from("./tmp/json"));
    assert_eq!(config.output_dir, PathBuf::from("./tmp/zarr"));
    assert!(config.force_scan);
    assert_eq!(config.inline_threshold, 500);
    assert_eq!(config.concat_dims, vec!["time".to_string()]);
    assert_eq!(config.workers, 8);
    assert_eq!(
        config.storage_options,
        StorageOptions::from([("region".to_string(), "eu-west-1".to_string())])
    );

    assert_eq!(config.inputs.len(), 2);
    assert_eq!(config.inputs[0], InputSpec::from("s3://bucket/2024/*.nc"));
    assert_eq!(config.inputs[1].pattern(), "/data/local/**/*.nc");
    let options = config.inputs[1].storage_options().expect("per-input options");
    assert_eq!(options.get("anon").map(String::as_str), Some("true"));
    assert_eq!(options.get("max_retries").map(String::as_str), Some("3"));

    let patterns = config.input_patterns();
    assert_eq!(patterns[0].options.get("region").map(String::as_str), Some("eu-west-1"));
    assert!(patterns[1].options.get("region").is_none());
}

#[test]
fn test_missing_keys_take_defaults() {
    let file = config_file("inputs: [\"a/*.nc\"]\n");
    let config = load_config(file.path()).unwrap();
    assert_eq!(
        config,
        ChunkerConfig {
            inputs: vec![InputSpec::from("a/*.nc")],
            ..ChunkerConfig::default()
        }
    );

    let empty = config_file("");
    assert_eq!(load_config(empty.path()).unwrap(), ChunkerConfig::default());
}

#[test]
fn test_defaults() {
    let config = ChunkerConfig::default();
    assert_eq!(config.dataset_name, "mydataset");
    assert_eq!(config.index_dir, PathBuf::from("json"));
    assert_eq!(config.output_dir, PathBuf::from("zarr"));
    assert_eq!(config.inline_threshold, 100);
    assert_eq!(config.workers, 4);
    assert_eq!(config.concat_dims, vec!["analysis_time", "step"]);
    assert_eq!(config.merged_output_path(), PathBuf::from("zarr/mydataset.zarr"));
    assert_eq!(config.dataset_dir(), PathBuf::from("json/mydataset"));
}

#[test]
fn test_invalid_yaml_is_reported() {
    let file = config_file("inputs: [unclosed\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("parse"), "{err}");
}

#[test]
fn test_missing_file_is_reported() {
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"), "{err}");
}

#[test]
fn test_flags_override_file_values() {
    let file = config_file("dataset_name: fromfile\ninputs: [\"a/*.nc\"]\nworkers: 2\n");
    let args = ChunkArgs {
        config: Some(file.path().to_path_buf()),
        dataset_name: Some("fromflag".into()),
        inputs: vec!["b/*.nc".into(), "c/*.nc".into()],
        input_fs_args: Some(StorageOptions::from([(
            "anon".to_string(),
            "true".to_string(),
        )])),
        json_dir: Some(PathBuf::from("idx")),
        force_scan: true,
        concat_dims: vec!["time".into()],
        ..Default::default()
    };

    let config = build_config(&args).unwrap();

    assert_eq!(config.dataset_name, "fromflag");
    assert_eq!(
        config.inputs,
        vec![InputSpec::from("b/*.nc"), InputSpec::from("c/*.nc")]
    );
    assert_eq!(config.storage_options.get("anon").map(String::as_str), Some("true"));
    assert_eq!(config.index_dir, PathBuf::from("idx"));
    assert!(config.force_scan);
    assert_eq!(config.concat_dims, vec!["time".to_string()]);
    // Untouched by flags.
    assert_eq!(config.workers, 2);
    assert_eq!(config.output_dir, PathBuf::from("zarr"));
}

#[test]
fn test_unusable_values_are_rejected() {
    for args in [
        ChunkArgs {
            dataset_name: Some("a/b".into()),
            ..Default::default()
        },
        ChunkArgs {
            dataset_name: Some("  ".into()),
            ..Default::default()
        },
        ChunkArgs {
            workers: Some(0),
            ..Default::default()
        },
    ] {
        let err = build_config(&args).unwrap_err();
        assert!(err.to_string().contains("invalid configuration"), "{err}");
    }
}

#[test]
fn test_input_format_aliases() {
    for (raw, expected) in [
        ("nc", InputFormat::Nc),
        ("netcdf4", InputFormat::Nc),
        ("h5", InputFormat::Hdf5),
        ("hdf5", InputFormat::Hdf5),
        ("grib", InputFormat::Nc),
    ] {
        let args = ChunkArgs {
            input_format: Some(raw.into()),
            ..Default::default()
        };
        assert_eq!(build_config(&args).unwrap().input_format, expected, "{raw}");
    }
}
