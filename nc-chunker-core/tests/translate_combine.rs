mod common;

use std::io::ErrorKind;

use common::MemoryHandle;
use nc_chunker_core::combine::GroupStackCombiner;
use nc_chunker_core::config::InputFormat;
use nc_chunker_core::contract::{ChunkIndex, ChunkRef, IndexCombiner, SourceTranslator};
use nc_chunker_core::error::{CombineError, TranslateError};
use nc_chunker_core::translate::{sniff, SignatureTranslator, SourceKind, HDF5_SIGNATURE};

fn hdf5_bytes(payload: &[u8]) -> Vec<u8> {
    let mut bytes = HDF5_SIGNATURE.to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

#[test]
fn test_sniff_recognises_supported_signatures() {
    assert_eq!(sniff(&hdf5_bytes(b""), InputFormat::Nc).unwrap(), SourceKind::Hdf5);
    assert_eq!(sniff(&hdf5_bytes(b""), InputFormat::Hdf5).unwrap(), SourceKind::Hdf5);
    assert_eq!(sniff(b"CDF\x01\0\0\0\0", InputFormat::Nc).unwrap(), SourceKind::NetcdfClassic);
    assert_eq!(sniff(b"CDF\x02", InputFormat::Nc).unwrap(), SourceKind::NetcdfClassic);
}

#[test]
fn test_sniff_rejects_short_and_foreign_input() {
    let cases: [(&[u8], InputFormat, ErrorKind); 5] = [
        (b"", InputFormat::Nc, ErrorKind::UnexpectedEof),
        (b"\x89HD", InputFormat::Nc, ErrorKind::UnexpectedEof),
        (b"\x89HDF\r\n", InputFormat::Nc, ErrorKind::UnexpectedEof),
        (b"GRIB\x00\x00\x00\x02", InputFormat::Nc, ErrorKind::InvalidData),
        (b"CDF\x01\0\0\0\0", InputFormat::Hdf5, ErrorKind::InvalidData),
    ];
    for (header, format, kind) in cases {
        let err = sniff(header, format).unwrap_err();
        assert_eq!(err.kind(), kind, "header {header:?} as {format:?}");
    }
}

#[tokio::test]
async fn test_small_source_is_inlined_as_base64() {
    let handle = MemoryHandle::new("mem/small.nc", &hdf5_bytes(b"hi"));
    let index = SignatureTranslator::default()
        .translate(&handle, 100)
        .await
        .unwrap();

    match index.refs.get("data/0") {
        Some(ChunkRef::Inline(value)) => assert!(value.starts_with("base64:"), "{value}"),
        other => panic!("expected inline chunk, got {other:?}"),
    }
    let zarray = index.json("data/.zarray").unwrap().unwrap();
    assert_eq!(zarray["shape"], serde_json::json!([10]));
    assert_eq!(zarray["dtype"], "|u1");
    let attrs = index.json(".zattrs").unwrap().unwrap();
    assert_eq!(attrs["source"], "mem/small.nc");
    assert_eq!(attrs["source_format"], "hdf5");
}

#[tokio::test]
async fn test_large_source_is_referenced_by_range() {
    let bytes = hdf5_bytes(&[7u8; 500]);
    let handle = MemoryHandle::new("s3://bucket/big.nc", &bytes);
    let index = SignatureTranslator::new(InputFormat::Nc)
        .translate(&handle, 100)
        .await
        .unwrap();
    assert_eq!(
        index.refs.get("data/0"),
        Some(&ChunkRef::Range("s3://bucket/big.nc".into(), 0, bytes.len() as u64))
    );
}

#[tokio::test]
async fn test_corrupt_source_is_an_io_error() {
    let handle = MemoryHandle::new("mem/bad.nc", b"not a netcdf file");
    let err = SignatureTranslator::default()
        .translate(&handle, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, TranslateError::Io(ref e) if e.kind() == ErrorKind::InvalidData), "{err:?}");
}

async fn index_of(uri: &str, len: usize) -> ChunkIndex {
    let handle = MemoryHandle::new(uri, &hdf5_bytes(&vec![0u8; len]));
    SignatureTranslator::default()
        .translate(&handle, 0)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_group_stack_mounts_members_in_input_order() {
    let first = index_of("a/1.nc", 10).await;
    let second = index_of("a/2.nc", 20).await;
    let dims = vec!["analysis_time".to_string(), "step".to_string()];

    let merged = GroupStackCombiner
        .combine(vec![first, second], &dims)
        .unwrap();

    assert_eq!(
        merged.refs.get("0/data/0"),
        Some(&ChunkRef::Range("a/1.nc".into(), 0, 18))
    );
    assert_eq!(
        merged.refs.get("1/data/0"),
        Some(&ChunkRef::Range("a/2.nc".into(), 0, 28))
    );
    assert!(merged.refs.contains_key("0/.zgroup"));
    assert!(merged.refs.contains_key(".zgroup"));
    let attrs = merged.json(".zattrs").unwrap().unwrap();
    assert_eq!(attrs["concat_dims"], serde_json::json!(dims));
    assert_eq!(attrs["members"], 2);
}

#[tokio::test]
async fn test_group_stack_rejects_members_with_different_arrays() {
    let first = index_of("a/1.nc", 10).await;
    let mut second = index_of("a/2.nc", 10).await;
    second
        .insert_json(
            "extra/.zarray",
            &serde_json::json!({ "dtype": "<f4", "shape": [2, 3] }),
        )
        .unwrap();

    let err = GroupStackCombiner
        .combine(vec![first, second], &[])
        .unwrap_err();
    assert!(matches!(err, CombineError::Incompatible(_)), "{err:?}");
}

#[test]
fn test_group_stack_rejects_empty_input() {
    let err = GroupStackCombiner.combine(Vec::new(), &[]).unwrap_err();
    assert!(matches!(err, CombineError::Incompatible(_)));
}
