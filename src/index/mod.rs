//! Search index records, queries and the service capability used by the pipeline.

pub mod azure;
pub mod memory;
pub mod schema;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use self::schema::{IndexSchema, CHUNK, CHUNK_ID, CHUNK_VECTOR, FILE_ID, FILE_NAME};

/// Persisted unit: one chunk with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct IndexRecord {
    /// `{file_name}_{file_position}`.
    pub file_id: String,
    /// `{file_position}_{chunk_position}`, the document key.
    pub chunk_id: String,
    /// Chunk text.
    pub chunk: String,
    /// Blob path of the source file.
    pub file_name: String,
    /// Embedding of `chunk`.
    pub chunk_vector: Vec<f32>,
}

/// Nearest-neighbour clause of a search request.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    /// Query embedding.
    pub vector: Vec<f32>,
    /// Number of nearest neighbours to retrieve.
    pub k_nearest_neighbors: usize,
    /// Vector field searched.
    pub field: String,
}

/// Pure vector search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Vector clauses.
    pub vector_queries: Vec<VectorQuery>,
    /// Fields returned with each hit.
    pub select: Vec<String>,
    /// Maximum number of hits returned.
    pub top: usize,
}

impl SearchRequest {
    /// Vector-only request against [`CHUNK_VECTOR`] returning the text fields.
    pub fn chunk_vector(vector: Vec<f32>, k: usize, top: usize) -> Self {
        Self {
            vector_queries: vec![VectorQuery {
                vector,
                k_nearest_neighbors: k,
                field: CHUNK_VECTOR.to_string(),
            }],
            select: [FILE_ID, CHUNK_ID, CHUNK, FILE_NAME]
                .into_iter()
                .map(String::from)
                .collect(),
            top,
        }
    }
}

/// One search result with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SearchHit {
    /// Similarity score reported by the service (higher is closer).
    #[serde(rename = "@search.score")]
    pub score: f64,
    /// File reference, when selected.
    #[serde(default)]
    pub file_id: Option<String>,
    /// Chunk key, when selected.
    #[serde(default)]
    pub chunk_id: Option<String>,
    /// Chunk text, when selected.
    #[serde(default)]
    pub chunk: Option<String>,
    /// Source file name, when selected.
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Per-key outcome of an upload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Keys accepted by the service.
    pub succeeded: usize,
    /// Keys rejected by the service, with the reported reason.
    pub failed: Vec<(String, String)>,
}

impl UploadSummary {
    /// Total records reported on.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }
}

/// Search service capability: schema management, uploads and queries.
pub trait SearchService {
    /// Creates the index, or updates it in place when it already exists.
    fn create_or_update_index(&self, schema: &IndexSchema) -> Result<()>;

    /// Inserts or replaces records by key.
    fn upload_documents(&self, index_name: &str, records: &[IndexRecord]) -> Result<UploadSummary>;

    /// Runs a vector search and returns hits ordered by descending score.
    fn search(&self, index_name: &str, request: &SearchRequest) -> Result<Vec<SearchHit>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_uses_index_field_names() {
        let record = IndexRecord {
            file_id: "a.pdf_0".into(),
            chunk_id: "0_0".into(),
            chunk: "text".into(),
            file_name: "a.pdf".into(),
            chunk_vector: vec![0.5],
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "FILE_ID": "a.pdf_0",
                "CHUNK_ID": "0_0",
                "CHUNK": "text",
                "FILE_NAME": "a.pdf",
                "CHUNK_VECTOR": [0.5]
            })
        );
    }

    #[test]
    fn hit_parses_score_and_selected_fields() {
        let hit: SearchHit = serde_json::from_value(json!({
            "@search.score": 0.91,
            "FILE_ID": "a.pdf_0",
            "CHUNK_ID": "0_3",
            "CHUNK": "text",
            "FILE_NAME": "a.pdf"
        }))
        .unwrap();
        assert_eq!(hit.score, 0.91);
        assert_eq!(hit.chunk_id.as_deref(), Some("0_3"));
    }
}
