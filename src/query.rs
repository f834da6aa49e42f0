//! Similarity query against the chunk index.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::embedder::Embedder;
use crate::index::{SearchHit, SearchRequest, SearchService};

/// Demo question asked after ingestion.
pub const DEFAULT_QUERY: &str = "Is voclosporin better than Belimumab?";
/// Nearest neighbours retrieved per query.
pub const DEFAULT_K: usize = 3;
/// Hits returned to the caller.
pub const DEFAULT_TOP: usize = 1;

/// Query text plus result limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Free-text query, embedded with the ingestion embedder.
    pub text: String,
    /// Nearest neighbours to retrieve.
    pub k: usize,
    /// Maximum hits returned.
    pub top: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            text: DEFAULT_QUERY.to_string(),
            k: DEFAULT_K,
            top: DEFAULT_TOP,
        }
    }
}

/// Embeds `options.text` and runs a pure vector search on the chunk vectors.
pub fn vector_search(
    embedder: &dyn Embedder,
    search: &dyn SearchService,
    index_name: &str,
    options: &QueryOptions,
) -> Result<Vec<SearchHit>> {
    anyhow::ensure!(!options.text.trim().is_empty(), "query text is empty");
    let vector = embedder
        .embed_query(&options.text)
        .context("failed to embed query")?;
    debug!(dimensions = vector.len(), "embedded query");
    let request = SearchRequest::chunk_vector(vector, options.k.max(1), options.top.max(1));
    let hits = search
        .search(index_name, &request)
        .with_context(|| format!("vector query against {index_name} failed"))?;
    info!(hits = hits.len(), "query returned");
    Ok(hits)
}

/// Formats one hit the way the binaries print it.
pub fn render_hit(hit: &SearchHit) -> String {
    let field = |value: &Option<String>| value.as_deref().unwrap_or("-").to_string();
    format!(
        "FILE_ID: {}\nCHUNK_ID: {}\nFILE_NAME: {}\nScore: {}\nContent: {}\n",
        field(&hit.file_id),
        field(&hit.chunk_id),
        field(&hit.file_name),
        hit.score,
        field(&hit.chunk)
    )
}
