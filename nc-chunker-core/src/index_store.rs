//! Addressing and enumeration of per-source index artifacts.
//!
//! Layout: `{index_dir}/{dataset}/{mirrored source path}.json`. The mirrored path
//! is a pure function of the source URI, so a source always maps to the same file
//! and two workers never write the same artifact.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::contract::ChunkIndex;
use crate::error::ConsolidateError;

pub const INDEX_EXTENSION: &str = "json";

/// Prefix of in-flight temporary files; they carry a non-index extension too.
const TEMP_PREFIX: &str = ".tmp-";
const TEMP_SUFFIX: &str = ".partial";

#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(index_dir: impl AsRef<Path>, dataset_name: &str) -> Self {
        Self {
            root: index_dir.as_ref().join(dataset_name),
        }
    }

    /// The dataset namespace.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, uri: &str) -> PathBuf {
        self.root.join(mirrored_path(uri))
    }

    pub fn exists(&self, artifact: &Path) -> bool {
        artifact.is_file()
    }

    /// Creates every missing parent directory of `artifact`. Safe to race.
    pub fn ensure_parent(&self, artifact: &Path) -> io::Result<()> {
        match artifact.parent() {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        }
    }

    pub fn write_artifact(&self, artifact: &Path, index: &ChunkIndex) -> io::Result<()> {
        write_json_atomic(artifact, index)
    }

    pub fn read_artifact(artifact: &Path) -> Result<ChunkIndex, ConsolidateError> {
        let file = File::open(artifact).map_err(|source| ConsolidateError::Read {
            path: artifact.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConsolidateError::Parse {
            path: artifact.to_path_buf(),
            source,
        })
    }

    /// Every artifact currently in the namespace, sorted by path.
    pub fn list_artifacts(&self) -> io::Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(TEMP_PREFIX));
            let is_index = entry.path().extension().and_then(|ext| ext.to_str())
                == Some(INDEX_EXTENSION);
            if is_index && !is_temp {
                artifacts.push(entry.into_path());
            }
        }
        artifacts.sort();
        debug!(root = %self.root.display(), found = artifacts.len(), "Listed index artifacts");
        Ok(artifacts)
    }
}

/// Relative artifact path for a source URI.
///
/// The scheme and any root are dropped (a remote host stays as the first
/// component), `.` components vanish, `..` becomes `__` so nothing escapes the
/// namespace, and the file extension is replaced by `.json`.
pub fn mirrored_path(uri: &str) -> PathBuf {
    let without_scheme = uri.split_once("://").map_or(uri, |(_, rest)| rest);

    let mut mirrored = PathBuf::new();
    for component in Path::new(without_scheme).components() {
        match component {
            Component::Normal(part) => mirrored.push(part),
            Component::ParentDir => mirrored.push("__"),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    mirrored.set_extension(INDEX_EXTENSION);
    mirrored
}

/// Pretty-prints `value` next to `path` and renames it into place, so readers see
/// either the previous file or the complete new one.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
