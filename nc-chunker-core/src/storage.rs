//! Default storage access: local files and anything `object_store` can reach.
//!
//! The backend is picked from the URI scheme. No scheme, or `file://`, means the
//! local filesystem; `s3://`, `gs://`, `az://`, `http(s)://` and the other schemes
//! understood by [`object_store::parse_url_opts`] go to an object store built from
//! `scheme://host` plus the caller's options. Clients are cached per
//! `(scheme://host, options)` so opening thousands of sources reuses one client.

use std::collections::HashMap;
use std::io::{self, SeekFrom};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::TryStreamExt;
use glob::{MatchOptions, Pattern};
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;
use url::Url;

use crate::contract::{SourceHandle, StorageAccess, StorageOptions};
use crate::error::StorageError;

/// `*` and `?` stay within one path segment, `**` spans segments.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Where a URI points, split once so glob and open agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Local path, with the `file://` prefix if the URI carried one.
    Local { path: String, prefix: &'static str },
    /// `base` is `scheme://host`, `key` the object key below it.
    Remote { base: String, key: String },
}

impl Location {
    pub fn parse(uri: &str) -> Result<Self, StorageError> {
        let Some((scheme, rest)) = uri.split_once("://") else {
            return Ok(Location::Local {
                path: uri.to_string(),
                prefix: "",
            });
        };
        if scheme.eq_ignore_ascii_case("file") {
            return Ok(Location::Local {
                path: rest.to_string(),
                prefix: "file://",
            });
        }
        let (host, key) = rest.split_once('/').unwrap_or((rest, ""));
        if scheme.is_empty() || host.is_empty() {
            return Err(StorageError::InvalidUri {
                uri: uri.to_string(),
                reason: "expected scheme://host/key".into(),
            });
        }
        Ok(Location::Remote {
            base: format!("{scheme}://{host}"),
            key: key.to_string(),
        })
    }
}

type StoreKey = (String, StorageOptions);

#[derive(Default)]
pub struct DefaultStorage {
    stores: Mutex<HashMap<StoreKey, Arc<dyn ObjectStore>>>,
}

impl DefaultStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn object_store(
        &self,
        base: &str,
        options: &StorageOptions,
    ) -> Result<Arc<dyn ObjectStore>, StorageError> {
        let key = (base.to_string(), options.clone());
        let mut stores = self.stores.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(store) = stores.get(&key) {
            return Ok(store.clone());
        }

        let url = Url::parse(base).map_err(|e| StorageError::InvalidUri {
            uri: base.to_string(),
            reason: e.to_string(),
        })?;
        let (store, _) =
            object_store::parse_url_opts(&url, options.iter()).map_err(|e| {
                StorageError::Backend {
                    uri: base.to_string(),
                    reason: e.to_string(),
                }
            })?;
        let store: Arc<dyn ObjectStore> = Arc::from(store);
        debug!(backend = base, "Created object store client");
        stores.insert(key, store.clone());
        Ok(store)
    }

    async fn glob_remote(
        &self,
        pattern: &str,
        base: &str,
        key_pattern: &str,
        options: &StorageOptions,
    ) -> Result<Vec<String>, StorageError> {
        let matcher = Pattern::new(key_pattern).map_err(|e| StorageError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let store = self.object_store(base, options)?;
        let prefix = literal_prefix(key_pattern);
        let prefix = (!prefix.is_empty()).then(|| ObjectPath::from(prefix));

        let objects: Vec<_> = store
            .list(prefix.as_ref())
            .try_collect()
            .await
            .map_err(|e| StorageError::Backend {
                uri: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .filter(|key| matcher.matches_with(key, MATCH_OPTIONS))
            .map(|key| format!("{base}/{key}"))
            .collect())
    }
}

fn glob_local(pattern: &str, path: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
    let entries =
        glob::glob_with(path, MATCH_OPTIONS).map_err(|e| StorageError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

    let mut uris = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StorageError::Io {
            uri: e.path().display().to_string(),
            source: e.into(),
        })?;
        if path.is_file() {
            uris.push(format!("{prefix}{}", path.to_string_lossy()));
        }
    }
    Ok(uris)
}

/// The part of a key pattern before its first wildcard, cut back to a whole
/// directory, used as the listing prefix.
pub fn literal_prefix(key_pattern: &str) -> &str {
    let wildcard = key_pattern
        .find(|c| matches!(c, '*' | '?' | '['))
        .unwrap_or(key_pattern.len());
    match key_pattern[..wildcard].rfind('/') {
        Some(slash) => &key_pattern[..slash],
        None => "",
    }
}

fn object_error_to_io(error: object_store::Error) -> io::Error {
    match error {
        object_store::Error::NotFound { .. } => io::Error::new(io::ErrorKind::NotFound, error),
        other => io::Error::other(other),
    }
}

fn check_range(range: &Range<u64>, len: u64) -> io::Result<()> {
    if range.start > range.end || range.end > len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("range {}..{} outside of {len} bytes", range.start, range.end),
        ));
    }
    Ok(())
}

#[async_trait]
impl StorageAccess for DefaultStorage {
    async fn glob(
        &self,
        pattern: &str,
        options: &StorageOptions,
    ) -> Result<Vec<String>, StorageError> {
        match Location::parse(pattern)? {
            Location::Local { path, prefix } => glob_local(pattern, &path, prefix),
            Location::Remote { base, key } => {
                self.glob_remote(pattern, &base, &key, options).await
            }
        }
    }

    async fn open(
        &self,
        uri: &str,
        options: &StorageOptions,
    ) -> Result<Box<dyn SourceHandle>, StorageError> {
        let io_error = |source: io::Error| StorageError::Io {
            uri: uri.to_string(),
            source,
        };

        match Location::parse(uri)? {
            Location::Local { path, .. } => {
                let path = PathBuf::from(path);
                let file = tokio::fs::File::open(&path).await.map_err(io_error)?;
                let len = file.metadata().await.map_err(io_error)?.len();
                Ok(Box::new(LocalHandle {
                    uri: uri.to_string(),
                    file: tokio::sync::Mutex::new(file),
                    len,
                }))
            }
            Location::Remote { base, key } => {
                let store = self.object_store(&base, options)?;
                let path = ObjectPath::parse(&key).map_err(|e| StorageError::InvalidUri {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                })?;
                let meta = store
                    .head(&path)
                    .await
                    .map_err(|e| io_error(object_error_to_io(e)))?;
                Ok(Box::new(ObjectHandle {
                    uri: uri.to_string(),
                    store,
                    path,
                    len: meta.size as u64,
                }))
            }
        }
    }
}

/// Local file handle; reads seek under a lock so concurrent reads never interleave.
pub struct LocalHandle {
    uri: String,
    file: tokio::sync::Mutex<tokio::fs::File>,
    len: u64,
}

#[async_trait]
impl SourceHandle for LocalHandle {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn len(&self) -> u64 {
        self.len
    }

    async fn read_range(&self, range: Range<u64>) -> io::Result<Vec<u8>> {
        check_range(&range, self.len)?;
        let mut buf = vec![0u8; (range.end - range.start) as usize];
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(range.start)).await?;
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

pub struct ObjectHandle {
    uri: String,
    store: Arc<dyn ObjectStore>,
    path: ObjectPath,
    len: u64,
}

#[async_trait]
impl SourceHandle for ObjectHandle {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn len(&self) -> u64 {
        self.len
    }

    async fn read_range(&self, range: Range<u64>) -> io::Result<Vec<u8>> {
        check_range(&range, self.len)?;
        if range.start == range.end {
            return Ok(Vec::new());
        }
        let bytes = self
            .store
            .get_range(&self.path, range.start as usize..range.end as usize)
            .await
            .map_err(object_error_to_io)?;
        Ok(bytes.to_vec())
    }
}
