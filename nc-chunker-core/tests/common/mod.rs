#![allow(dead_code)]

use std::fs;
use std::io;
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nc_chunker_core::contract::{SourceHandle, StorageAccess, StorageOptions};
use nc_chunker_core::error::StorageError;
use nc_chunker_core::storage::DefaultStorage;
use nc_chunker_core::translate::HDF5_SIGNATURE;
use tracing_subscriber::layer::{Context, Layer};

/// Writes a small file carrying the HDF5 signature (what netCDF-4 files start with).
pub fn write_nc(path: &Path, payload: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut bytes = HDF5_SIGNATURE.to_vec();
    bytes.extend_from_slice(payload);
    fs::write(path, bytes).unwrap();
}

/// Writes a file that stops in the middle of the HDF5 signature.
pub fn write_truncated(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, &HDF5_SIGNATURE[..3]).unwrap();
}

/// Local storage that counts how many sources were opened.
#[derive(Default)]
pub struct CountingStorage {
    inner: DefaultStorage,
    opens: AtomicUsize,
}

impl CountingStorage {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageAccess for CountingStorage {
    async fn glob(
        &self,
        pattern: &str,
        options: &StorageOptions,
    ) -> Result<Vec<String>, StorageError> {
        self.inner.glob(pattern, options).await
    }

    async fn open(
        &self,
        uri: &str,
        options: &StorageOptions,
    ) -> Result<Box<dyn SourceHandle>, StorageError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open(uri, options).await
    }
}

/// In-memory source for translator tests.
pub struct MemoryHandle {
    pub uri: String,
    pub bytes: Vec<u8>,
}

impl MemoryHandle {
    pub fn new(uri: &str, bytes: &[u8]) -> Self {
        Self {
            uri: uri.to_string(),
            bytes: bytes.to_vec(),
        }
    }
}

#[async_trait]
impl SourceHandle for MemoryHandle {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    async fn read_range(&self, range: Range<u64>) -> io::Result<Vec<u8>> {
        self.bytes
            .get(range.start as usize..range.end as usize)
            .map(|slice| slice.to_vec())
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "out of range"))
    }
}

/// Custom Layer to collect emitted events as their debug representation.
pub struct EventCollector {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let msg = format!("{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}
