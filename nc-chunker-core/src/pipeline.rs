//! High-level pipeline: orchestrates resolve → index → consolidate for one dataset.
//!
//! This module is the top-level orchestration for a dataset described by a
//! [`ChunkerConfig`]. It:
//!   - Resolves every input pattern into a sorted, deduplicated list of sources
//!   - Indexes each source through a bounded worker pool, reusing artifacts that
//!     already exist unless a re-scan is forced
//!   - Consolidates whatever artifacts the dataset namespace holds into the merged output
//!   - Returns a report of what was written, skipped and failed
//!
//! # Entry points
//! - [`scan`]: resolve and index only
//! - [`consolidate`]: merge existing artifacts only
//! - [`run`]: both, in that order
//!
//! # Error Handling
//! Sources that cannot be read are logged and reported as failed; the run goes
//! on. Resolution errors, non-I/O indexing errors and consolidation errors abort
//! the run with a [`PipelineError`]. Artifacts written before a fatal error stay
//! in place, so re-running resumes where the failed run stopped.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

use futures::{stream, StreamExt, TryStreamExt};
use tracing::{info, warn};

use crate::config::ChunkerConfig;
use crate::consolidate::{ConsolidateOutcome, Consolidator};
use crate::contract::{IndexCombiner, SourceTranslator, StorageAccess};
use crate::error::PipelineError;
use crate::index_store::IndexStore;
use crate::indexer::{IndexOutcome, SourceIndexer};
use crate::resolve::{resolve, SourceUri};

#[derive(Debug, Default)]
pub struct ScanReport {
    /// One outcome per resolved source, ordered by URI.
    pub outcomes: Vec<IndexOutcome>,
}

impl ScanReport {
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, IndexOutcome::Written { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, IndexOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, IndexOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&IndexOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub scan: ScanReport,
    pub consolidation: ConsolidateOutcome,
}

pub async fn scan<S, T>(
    config: &ChunkerConfig,
    storage: &S,
    translator: &T,
) -> Result<ScanReport, PipelineError>
where
    S: StorageAccess + ?Sized,
    T: SourceTranslator + ?Sized,
{
    config.validate()?;
    if config.inputs.is_empty() {
        return Err(PipelineError::Config("no input patterns given".into()));
    }
    info!(dataset = %config.dataset_name, inputs = config.inputs.len(), "[SCAN] Starting scan");

    let sources = resolve(storage, &config.input_patterns()).await?;
    let store = IndexStore::new(&config.index_dir, &config.dataset_name);
    let indexer = SourceIndexer::new(storage, translator, &store, config.inline_threshold);

    let (units, shadowed) = claim_artifacts(&store, &sources);
    let mut outcomes: Vec<IndexOutcome> = stream::iter(units)
        .map(|source| indexer.index(source, config.force_scan))
        .buffer_unordered(config.workers)
        .try_collect()
        .await?;
    outcomes.extend(shadowed);
    outcomes.sort_by(|a, b| a.uri().cmp(b.uri()));

    let report = ScanReport { outcomes };
    info!(
        dataset = %config.dataset_name,
        sources = sources.len(),
        written = report.written(),
        skipped = report.skipped(),
        failed = report.failed(),
        "[SCAN] Scan complete"
    );
    Ok(report)
}

/// Gives every artifact path to the first source (in URI order) that maps to it.
/// Later sources with the same path are reported as skipped and never reach the
/// worker pool, so no two units write the same file.
fn claim_artifacts<'s>(
    store: &IndexStore,
    sources: &'s [SourceUri],
) -> (Vec<&'s SourceUri>, Vec<IndexOutcome>) {
    let mut owners: HashMap<PathBuf, &str> = HashMap::new();
    let mut units = Vec::with_capacity(sources.len());
    let mut shadowed = Vec::new();

    for source in sources {
        match owners.entry(store.artifact_path(&source.uri)) {
            Entry::Vacant(entry) => {
                entry.insert(&source.uri);
                units.push(source);
            }
            Entry::Occupied(entry) => {
                warn!(
                    uri = %source.uri,
                    owner = %entry.get(),
                    artifact = %entry.key().display(),
                    "[SCAN] Artifact path already belongs to another source, skipping"
                );
                shadowed.push(IndexOutcome::Skipped {
                    uri: source.uri.clone(),
                    artifact: entry.key().clone(),
                });
            }
        }
    }
    (units, shadowed)
}

pub fn consolidate<C>(config: &ChunkerConfig, combiner: &C) -> Result<ConsolidateOutcome, PipelineError>
where
    C: IndexCombiner + ?Sized,
{
    config.validate()?;
    let store = IndexStore::new(&config.index_dir, &config.dataset_name);
    let consolidator = Consolidator::new(
        &store,
        combiner,
        &config.concat_dims,
        config.merged_output_path(),
    );
    Ok(consolidator.consolidate()?)
}

pub async fn run<S, T, C>(
    config: &ChunkerConfig,
    storage: &S,
    translator: &T,
    combiner: &C,
) -> Result<RunReport, PipelineError>
where
    S: StorageAccess + ?Sized,
    T: SourceTranslator + ?Sized,
    C: IndexCombiner + ?Sized,
{
    info!(dataset = %config.dataset_name, "[RUN] Starting full pipeline");
    let scan = scan(config, storage, translator).await?;
    let consolidation = consolidate(config, combiner)?;
    Ok(RunReport {
        scan,
        consolidation,
    })
}
