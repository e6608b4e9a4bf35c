//! Turns input glob patterns into the run's ordered list of sources.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::contract::{StorageAccess, StorageOptions};
use crate::error::StorageError;

/// One input pattern together with the backend options it is expanded and opened with.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InputPattern {
    pub pattern: String,
    pub options: StorageOptions,
}

impl InputPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            options: StorageOptions::new(),
        }
    }
}

/// A resolved source and the options of the pattern that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUri {
    pub uri: String,
    pub options: Arc<StorageOptions>,
}

/// Expands every pattern and returns the deduplicated union sorted by URI.
///
/// Patterns are expanded in sorted order, so when two patterns produce the same
/// URI with different options the choice does not depend on argument order.
/// Any backend or pattern error aborts resolution.
pub async fn resolve<S>(storage: &S, inputs: &[InputPattern]) -> Result<Vec<SourceUri>, StorageError>
where
    S: StorageAccess + ?Sized,
{
    let mut ordered: Vec<&InputPattern> = inputs.iter().collect();
    ordered.sort();
    ordered.dedup();

    let mut resolved: BTreeMap<String, Arc<StorageOptions>> = BTreeMap::new();
    for input in ordered {
        let uris = storage.glob(&input.pattern, &input.options).await?;
        if uris.is_empty() {
            warn!(pattern = %input.pattern, "Input pattern matched no sources");
            continue;
        }
        debug!(pattern = %input.pattern, matched = uris.len(), "Expanded input pattern");

        let options = Arc::new(input.options.clone());
        for uri in uris {
            resolved.entry(uri).or_insert_with(|| options.clone());
        }
    }

    info!(sources = resolved.len(), "Resolved input sources");
    Ok(resolved
        .into_iter()
        .map(|(uri, options)| SourceUri { uri, options })
        .collect())
}
