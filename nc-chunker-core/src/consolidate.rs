//! Consolidation of every artifact of a dataset into the merged output.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::contract::IndexCombiner;
use crate::error::ConsolidateError;
use crate::index_store::{write_json_atomic, IndexStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsolidateOutcome {
    Written { path: PathBuf, artifacts: usize },
    /// No artifacts in the namespace; nothing was written.
    Empty,
}

pub struct Consolidator<'a, C: ?Sized> {
    store: &'a IndexStore,
    combiner: &'a C,
    concat_dims: &'a [String],
    output_path: PathBuf,
}

impl<'a, C> Consolidator<'a, C>
where
    C: IndexCombiner + ?Sized,
{
    pub fn new(
        store: &'a IndexStore,
        combiner: &'a C,
        concat_dims: &'a [String],
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            combiner,
            concat_dims,
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Rebuilds the merged artifact from scratch. On any error the previous merged
    /// artifact is left as it was.
    pub fn consolidate(&self) -> Result<ConsolidateOutcome, ConsolidateError> {
        let root = self.store.root();
        let artifacts = self
            .store
            .list_artifacts()
            .map_err(|source| ConsolidateError::Read {
                path: root.to_path_buf(),
                source,
            })?;
        info!(index_dir = %root.display(), found = artifacts.len(), "[CONSOLIDATE] Index artifacts loaded");

        if artifacts.is_empty() {
            warn!(
                index_dir = %root.display(),
                output = %self.output_path.display(),
                "[CONSOLIDATE] No index artifacts found, merged output left untouched"
            );
            return Ok(ConsolidateOutcome::Empty);
        }

        let indexes = artifacts
            .iter()
            .map(|artifact| IndexStore::read_artifact(artifact))
            .collect::<Result<Vec<_>, _>>()?;
        let merged = self.combiner.combine(indexes, self.concat_dims)?;

        info!(output = %self.output_path.display(), concat_dims = ?self.concat_dims, "[CONSOLIDATE] Writing merged index");
        let write_error = |source| ConsolidateError::Write {
            path: self.output_path.clone(),
            source,
        };
        if let Some(parent) = self.output_path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        write_json_atomic(&self.output_path, &merged).map_err(write_error)?;

        Ok(ConsolidateOutcome::Written {
            path: self.output_path.clone(),
            artifacts: artifacts.len(),
        })
    }
}
