//! Error types for every stage of the pipeline.
//!
//! The split matters for the failure policy: [`StorageError::is_io`] and
//! [`TranslateError::Io`] mark per-source problems the indexer contains to a
//! single source, everything else unwinds the run.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid uri `{uri}`: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("invalid glob pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("storage backend for `{uri}` is unavailable: {reason}")]
    Backend { uri: String, reason: String },

    #[error("I/O error on `{uri}`: {source}")]
    Io {
        uri: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// True for errors raised while reaching or reading one concrete source.
    pub fn is_io(&self) -> bool {
        matches!(self, StorageError::Io { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    /// Unreadable, truncated or corrupt input.
    #[error("I/O error while indexing: {0}")]
    Io(#[from] io::Error),

    #[error("indexing failed: {0}")]
    Internal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CombineError {
    #[error("incompatible inputs: {0}")]
    Incompatible(String),

    #[error("combining failed: {0}")]
    Internal(String),
}

/// Fatal failure of a single unit of indexing work.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("cannot open `{uri}`: {source}")]
    Open {
        uri: String,
        #[source]
        source: StorageError,
    },

    #[error("indexing `{uri}` failed: {source}")]
    Translate {
        uri: String,
        #[source]
        source: TranslateError,
    },

    #[error("cannot write index artifact {}: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConsolidateError {
    #[error("cannot read index artifacts under {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("index artifact {} is not a valid chunk index: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Combine(#[from] CombineError),

    #[error("cannot write merged index {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("resolving inputs failed: {0}")]
    Resolve(#[from] StorageError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Consolidate(#[from] ConsolidateError),
}
