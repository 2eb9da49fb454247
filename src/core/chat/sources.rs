//! Citation extraction from provider grounding metadata.
//!
//! The metadata is a chain of optional fields; any absence at any level means
//! "no citation there", never an error.

use super::models::{GroundingChunk, SourceCitation};

/// Collects the citations with both a non-empty title and a non-empty URI,
/// preserving chunk order.
pub fn extract_sources(chunks: &[GroundingChunk]) -> Vec<SourceCitation> {
    chunks
        .iter()
        .filter_map(|chunk| {
            let web = chunk.web.as_ref()?;
            let title = web.title.as_deref().filter(|t| !t.is_empty())?;
            let uri = web.uri.as_deref().filter(|u| !u.is_empty())?;
            Some(SourceCitation {
                title: title.to_string(),
                uri: uri.to_string(),
            })
        })
        .collect()
}
