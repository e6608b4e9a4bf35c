//! Per-source indexing: one unit of work per resolved source.
//!
//! A unit either reuses the existing artifact (cache hit), or opens the source,
//! translates it and writes the artifact atomically. I/O-class failures on the
//! source are logged and reported as [`IndexOutcome::Failed`]; anything else is
//! returned as an [`IndexError`] and aborts the run.

use std::io;
use std::path::PathBuf;

use tracing::{error, info};

use crate::contract::{SourceTranslator, StorageAccess};
use crate::error::{IndexError, TranslateError};
use crate::index_store::IndexStore;
use crate::resolve::SourceUri;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Written { uri: String, artifact: PathBuf },
    Skipped { uri: String, artifact: PathBuf },
    Failed { uri: String, error: String },
}

impl IndexOutcome {
    pub fn uri(&self) -> &str {
        match self {
            IndexOutcome::Written { uri, .. }
            | IndexOutcome::Skipped { uri, .. }
            | IndexOutcome::Failed { uri, .. } => uri,
        }
    }
}

/// Runs blocking filesystem work on the runtime's blocking pool.
async fn blocking<F>(work: F) -> io::Result<()>
where
    F: FnOnce() -> io::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(io::Error::other)?
}

pub struct SourceIndexer<'a, S: ?Sized, T: ?Sized> {
    storage: &'a S,
    translator: &'a T,
    store: &'a IndexStore,
    inline_threshold: u64,
}

impl<'a, S, T> SourceIndexer<'a, S, T>
where
    S: StorageAccess + ?Sized,
    T: SourceTranslator + ?Sized,
{
    pub fn new(storage: &'a S, translator: &'a T, store: &'a IndexStore, inline_threshold: u64) -> Self {
        Self {
            storage,
            translator,
            store,
            inline_threshold,
        }
    }

    pub async fn index(&self, source: &SourceUri, force: bool) -> Result<IndexOutcome, IndexError> {
        let uri = source.uri.as_str();
        let artifact = self.store.artifact_path(uri);
        let store = self.store.clone();
        let target = artifact.clone();
        blocking(move || store.ensure_parent(&target))
            .await
            .map_err(|e| IndexError::Store {
                path: artifact.clone(),
                source: e,
            })?;

        if !force && self.store.exists(&artifact) {
            info!(uri, artifact = %artifact.display(), "[SCAN] Artifact already exists, skipping");
            return Ok(IndexOutcome::Skipped {
                uri: uri.to_string(),
                artifact,
            });
        }

        info!(uri, "[SCAN] Scanning source");
        let handle = match self.storage.open(uri, &source.options).await {
            Ok(handle) => handle,
            Err(e) if e.is_io() => {
                error!(uri, error = %e, "[SCAN][ERROR] Cannot open source, skipping");
                return Ok(IndexOutcome::Failed {
                    uri: uri.to_string(),
                    error: e.to_string(),
                });
            }
            Err(e) => {
                return Err(IndexError::Open {
                    uri: uri.to_string(),
                    source: e,
                })
            }
        };

        let translated = self
            .translator
            .translate(handle.as_ref(), self.inline_threshold)
            .await;
        drop(handle);

        let index = match translated {
            Ok(index) => index,
            Err(TranslateError::Io(e)) => {
                error!(uri, error = %e, "[SCAN][ERROR] Source unreadable, skipping");
                return Ok(IndexOutcome::Failed {
                    uri: uri.to_string(),
                    error: e.to_string(),
                });
            }
            Err(e) => {
                return Err(IndexError::Translate {
                    uri: uri.to_string(),
                    source: e,
                })
            }
        };

        info!(uri, artifact = %artifact.display(), refs = index.refs.len(), "[SCAN] Saving artifact");
        let store = self.store.clone();
        let target = artifact.clone();
        blocking(move || store.write_artifact(&target, &index))
            .await
            .map_err(|e| IndexError::Store {
                path: artifact.clone(),
                source: e,
            })?;

        Ok(IndexOutcome::Written {
            uri: uri.to_string(),
            artifact,
        })
    }
}
