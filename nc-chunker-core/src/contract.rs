//! # contract: collaborator interfaces and the chunk-index document
//!
//! The pipeline never touches storage backends or file formats directly. It talks
//! to three collaborators through the traits below:
//!
//! - [`StorageAccess`]: expands glob patterns and opens sources as [`SourceHandle`]s.
//! - [`SourceTranslator`]: turns one open source into a [`ChunkIndex`].
//! - [`IndexCombiner`]: merges many [`ChunkIndex`]es along named dimensions.
//!
//! Default implementations live in [`crate::storage`], [`crate::translate`] and
//! [`crate::combine`].
//!
//! ## Mocking & Testing
//! - `StorageAccess` and `IndexCombiner` are annotated for `mockall`; the mocks are
//!   exported behind the default `test-export-mocks` feature so integration tests
//!   in other crates can use them.
//!
//! ## Error contract
//! - Storage implementations must report problems with one concrete source as
//!   [`StorageError::Io`] so the indexer can skip that source and carry on.
//! - Translators must report unreadable or corrupt input as [`TranslateError::Io`];
//!   [`TranslateError::Internal`] aborts the run.

use std::collections::BTreeMap;
use std::ops::Range;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::{CombineError, StorageError, TranslateError};

/// Backend connection options (credentials, region, endpoint, ...), passed through
/// to the storage backend untouched.
pub type StorageOptions = BTreeMap<String, String>;

/// Version tag written into every chunk-index document.
pub const CHUNK_INDEX_VERSION: u32 = 1;

/// A reference document mapping Zarr keys to inline data or byte ranges of a source.
///
/// `refs` is ordered so serialising the same index twice yields identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkIndex {
    pub version: u32,
    pub refs: BTreeMap<String, ChunkRef>,
}

impl ChunkIndex {
    pub fn new() -> Self {
        Self {
            version: CHUNK_INDEX_VERSION,
            refs: BTreeMap::new(),
        }
    }

    /// Stores `value` as an inline JSON string under `key` (Zarr metadata keys).
    pub fn insert_json(
        &mut self,
        key: impl Into<String>,
        value: &serde_json::Value,
    ) -> Result<(), serde_json::Error> {
        let encoded = serde_json::to_string(value)?;
        self.refs.insert(key.into(), ChunkRef::Inline(encoded));
        Ok(())
    }

    /// Parses the inline JSON stored under `key`, if any.
    pub fn json(&self, key: &str) -> Option<Result<serde_json::Value, serde_json::Error>> {
        match self.refs.get(key)? {
            ChunkRef::Inline(text) => Some(serde_json::from_str(text)),
            _ => None,
        }
    }
}

impl Default for ChunkIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry of [`ChunkIndex::refs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkRef {
    /// Data or metadata stored in the index itself (`base64:` prefixed for binary).
    Inline(String),
    /// `[uri, offset, length]`
    Range(String, u64, u64),
    /// `[uri]`: the whole object.
    Whole([String; 1]),
}

/// An open, randomly addressable source. Dropping the handle releases it.
#[async_trait]
pub trait SourceHandle: Send + Sync {
    fn uri(&self) -> &str;

    /// Total size in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads exactly `range`; a range past the end is an `UnexpectedEof` error.
    async fn read_range(&self, range: Range<u64>) -> std::io::Result<Vec<u8>>;
}

/// Storage-access capability: glob expansion and source opening over any backend.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StorageAccess: Send + Sync {
    /// Expands `pattern` against the backend its scheme selects. Returns concrete
    /// URIs in the same scheme as the pattern; no match is an empty vector.
    async fn glob(
        &self,
        pattern: &str,
        options: &StorageOptions,
    ) -> Result<Vec<String>, StorageError>;

    /// Opens one source for reading.
    async fn open(
        &self,
        uri: &str,
        options: &StorageOptions,
    ) -> Result<Box<dyn SourceHandle>, StorageError>;
}

/// Single-source indexing collaborator.
#[async_trait]
pub trait SourceTranslator: Send + Sync {
    /// Describes the chunk layout of `source`. Data no larger than
    /// `inline_threshold` bytes may be embedded instead of referenced.
    async fn translate(
        &self,
        source: &dyn SourceHandle,
        inline_threshold: u64,
    ) -> Result<ChunkIndex, TranslateError>;
}

/// Multi-source consolidation collaborator.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait IndexCombiner: Send + Sync {
    fn combine(
        &self,
        indexes: Vec<ChunkIndex>,
        concat_dims: &[String],
    ) -> Result<ChunkIndex, CombineError>;
}
