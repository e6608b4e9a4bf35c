//! Default multi-source combiner.
//!
//! Stacks members instead of concatenating them: member `i` (in input order) is
//! mounted as Zarr group `{i}`, and the root `.zattrs` records the concatenation
//! dimensions and member count. Members must expose the same arrays with the same
//! dtype and rank, otherwise the combination is rejected as incompatible.

use std::collections::BTreeMap;

use serde_json::json;

use crate::contract::{ChunkIndex, ChunkRef, IndexCombiner};
use crate::error::CombineError;

const ZARRAY: &str = ".zarray";
const ZGROUP: &str = ".zgroup";

#[derive(Debug, Clone, PartialEq, Eq)]
struct ArraySignature {
    dtype: String,
    rank: usize,
}

/// Array path -> dtype and rank, read from every inline `.zarray` of an index.
fn array_layout(
    member: usize,
    index: &ChunkIndex,
) -> Result<BTreeMap<String, ArraySignature>, CombineError> {
    let mut layout = BTreeMap::new();
    for key in index.refs.keys() {
        let Some(array) = key.strip_suffix(ZARRAY) else {
            continue;
        };
        let meta = index
            .json(key)
            .ok_or_else(|| {
                CombineError::Incompatible(format!("member {member}: `{key}` is not inline metadata"))
            })?
            .map_err(|e| CombineError::Incompatible(format!("member {member}: `{key}`: {e}")))?;

        let dtype = meta
            .get("dtype")
            .map(|dtype| dtype.to_string())
            .unwrap_or_default();
        let rank = meta
            .get("shape")
            .and_then(|shape| shape.as_array())
            .map_or(0, |shape| shape.len());
        layout.insert(
            array.trim_end_matches('/').to_string(),
            ArraySignature { dtype, rank },
        );
    }
    Ok(layout)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupStackCombiner;

impl IndexCombiner for GroupStackCombiner {
    fn combine(
        &self,
        indexes: Vec<ChunkIndex>,
        concat_dims: &[String],
    ) -> Result<ChunkIndex, CombineError> {
        let first = indexes
            .first()
            .ok_or_else(|| CombineError::Incompatible("no indexes to combine".into()))?;
        let expected = array_layout(0, first)?;
        for (member, index) in indexes.iter().enumerate().skip(1) {
            let layout = array_layout(member, index)?;
            if layout != expected {
                return Err(CombineError::Incompatible(format!(
                    "member {member} has arrays {:?}, member 0 has {:?}",
                    layout.keys().collect::<Vec<_>>(),
                    expected.keys().collect::<Vec<_>>()
                )));
            }
        }

        let members = indexes.len();
        let mut merged = ChunkIndex::new();
        let encode = |e: serde_json::Error| CombineError::Internal(e.to_string());
        merged
            .insert_json(ZGROUP, &json!({ "zarr_format": 2 }))
            .map_err(encode)?;
        merged
            .insert_json(
                ".zattrs",
                &json!({ "concat_dims": concat_dims, "members": members }),
            )
            .map_err(encode)?;

        let group = ChunkRef::Inline(json!({ "zarr_format": 2 }).to_string());
        for (member, index) in indexes.into_iter().enumerate() {
            for (key, reference) in index.refs {
                merged.refs.insert(format!("{member}/{key}"), reference);
            }
            merged
                .refs
                .entry(format!("{member}/{ZGROUP}"))
                .or_insert_with(|| group.clone());
        }
        Ok(merged)
    }
}
