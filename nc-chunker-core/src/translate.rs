//! Default single-source translator.
//!
//! Does not parse the NetCDF/HDF5 layout. It verifies the file signature, then
//! describes the whole file as one byte array `data` (`|u1`, one chunk), either
//! inlined as base64 or referenced by byte range. Swap in a real format reader
//! through [`SourceTranslator`] for variable-level indexes.

use std::io;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use tracing::debug;

use crate::config::InputFormat;
use crate::contract::{ChunkIndex, ChunkRef, SourceHandle, SourceTranslator};
use crate::error::TranslateError;

pub const HDF5_SIGNATURE: &[u8; 8] = b"\x89HDF\r\n\x1a\n";
pub const NETCDF_CLASSIC_MAGIC: &[u8; 3] = b"CDF";

/// Name of the array describing the raw file bytes.
pub const DATA_ARRAY: &str = "data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Hdf5,
    NetcdfClassic,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Hdf5 => "hdf5",
            SourceKind::NetcdfClassic => "netcdf3",
        }
    }
}

/// Identifies the file from its first bytes. Short input is `UnexpectedEof`,
/// anything unrecognised is `InvalidData`.
pub fn sniff(header: &[u8], format: InputFormat) -> io::Result<SourceKind> {
    if header.starts_with(HDF5_SIGNATURE) {
        return Ok(SourceKind::Hdf5);
    }
    if format == InputFormat::Nc
        && header.len() >= 4
        && header.starts_with(NETCDF_CLASSIC_MAGIC)
        && matches!(header[3], 1 | 2 | 5)
    {
        return Ok(SourceKind::NetcdfClassic);
    }
    if header.len() < 4 || (header.len() < HDF5_SIGNATURE.len() && HDF5_SIGNATURE.starts_with(header)) {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("truncated file: {} bytes is too short for a signature", header.len()),
        ));
    }
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unrecognised file signature for {format:?} input"),
    ))
}

#[derive(Debug, Clone, Default)]
pub struct SignatureTranslator {
    format: InputFormat,
}

impl SignatureTranslator {
    pub fn new(format: InputFormat) -> Self {
        Self { format }
    }
}

fn metadata_error(e: serde_json::Error) -> TranslateError {
    TranslateError::Internal(format!("cannot encode metadata: {e}"))
}

#[async_trait]
impl SourceTranslator for SignatureTranslator {
    async fn translate(
        &self,
        source: &dyn SourceHandle,
        inline_threshold: u64,
    ) -> Result<ChunkIndex, TranslateError> {
        let uri = source.uri();
        let len = source.len();
        let header = source
            .read_range(0..len.min(HDF5_SIGNATURE.len() as u64))
            .await?;
        let kind = sniff(&header, self.format)?;
        debug!(uri, kind = kind.as_str(), len, "Recognised source signature");

        let mut index = ChunkIndex::new();
        index
            .insert_json(".zgroup", &json!({ "zarr_format": 2 }))
            .map_err(metadata_error)?;
        index
            .insert_json(
                ".zattrs",
                &json!({ "source": uri, "source_format": kind.as_str() }),
            )
            .map_err(metadata_error)?;
        index
            .insert_json(
                format!("{DATA_ARRAY}/.zarray"),
                &json!({
                    "chunks": [len],
                    "compressor": null,
                    "dtype": "|u1",
                    "fill_value": null,
                    "filters": null,
                    "order": "C",
                    "shape": [len],
                    "zarr_format": 2,
                }),
            )
            .map_err(metadata_error)?;
        index
            .insert_json(
                format!("{DATA_ARRAY}/.zattrs"),
                &json!({ "_ARRAY_DIMENSIONS": ["byte"] }),
            )
            .map_err(metadata_error)?;

        let chunk = if len <= inline_threshold {
            let bytes = source.read_range(0..len).await?;
            ChunkRef::Inline(format!("base64:{}", STANDARD.encode(bytes)))
        } else {
            ChunkRef::Range(uri.to_string(), 0, len)
        };
        index.refs.insert(format!("{DATA_ARRAY}/0"), chunk);

        Ok(index)
    }
}
