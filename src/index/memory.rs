//! In-process search service with exact nearest-neighbour search.
//!
//! Mirrors the remote service closely enough for tests and dry runs: uploads
//! require an existing index, records are replaced by key, vector length is
//! checked against the schema and scores use the service's cosine mapping
//! `1 / (2 - cos)`.

use std::cell::RefCell;
use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use super::schema::{IndexSchema, CHUNK, CHUNK_ID, FILE_ID, FILE_NAME};
use super::{IndexRecord, SearchHit, SearchRequest, SearchService, UploadSummary};

struct StoredIndex {
    schema: IndexSchema,
    records: BTreeMap<String, IndexRecord>,
}

/// Search service backed by process memory.
#[derive(Default)]
pub struct MemoryIndex {
    indexes: RefCell<BTreeMap<String, StoredIndex>>,
}

impl MemoryIndex {
    /// Creates an empty service with no indexes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current schema of `index_name`, if created.
    pub fn schema(&self, index_name: &str) -> Option<IndexSchema> {
        self.indexes
            .borrow()
            .get(index_name)
            .map(|index| index.schema.clone())
    }

    /// All records of `index_name`, ordered by key.
    pub fn records(&self, index_name: &str) -> Vec<IndexRecord> {
        self.indexes
            .borrow()
            .get(index_name)
            .map(|index| index.records.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl SearchService for MemoryIndex {
    fn create_or_update_index(&self, schema: &IndexSchema) -> Result<()> {
        anyhow::ensure!(
            schema.key_field().is_some(),
            "index {} has no key field",
            schema.name
        );
        let mut indexes = self.indexes.borrow_mut();
        indexes
            .entry(schema.name.clone())
            .and_modify(|index| index.schema = schema.clone())
            .or_insert_with(|| StoredIndex {
                schema: schema.clone(),
                records: BTreeMap::new(),
            });
        Ok(())
    }

    fn upload_documents(&self, index_name: &str, records: &[IndexRecord]) -> Result<UploadSummary> {
        let mut indexes = self.indexes.borrow_mut();
        let index = indexes
            .get_mut(index_name)
            .ok_or_else(|| anyhow!("index {index_name} was not found"))?;
        let dimensions = vector_dimensions(&index.schema);

        let mut summary = UploadSummary::default();
        for record in records {
            if record.chunk_id.is_empty() {
                summary
                    .failed
                    .push((String::new(), "document key is empty".to_string()));
                continue;
            }
            if let Some(expected) = dimensions {
                if record.chunk_vector.len() != expected {
                    summary.failed.push((
                        record.chunk_id.clone(),
                        format!(
                            "vector has {} dimensions, field expects {}",
                            record.chunk_vector.len(),
                            expected
                        ),
                    ));
                    continue;
                }
            }
            index.records.insert(record.chunk_id.clone(), record.clone());
            summary.succeeded += 1;
        }
        Ok(summary)
    }

    fn search(&self, index_name: &str, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let indexes = self.indexes.borrow();
        let index = indexes
            .get(index_name)
            .ok_or_else(|| anyhow!("index {index_name} was not found"))?;
        let [query] = request.vector_queries.as_slice() else {
            anyhow::bail!("in-memory index supports exactly one vector query");
        };

        let mut scored: Vec<(f64, &IndexRecord)> = index
            .records
            .values()
            .map(|record| (cosine_score(&query.vector, &record.chunk_vector), record))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(query.k_nearest_neighbors);
        scored.truncate(request.top);

        let selected = |field: &str| request.select.iter().any(|name| name == field);
        Ok(scored
            .into_iter()
            .map(|(score, record)| SearchHit {
                score,
                file_id: selected(FILE_ID).then(|| record.file_id.clone()),
                chunk_id: selected(CHUNK_ID).then(|| record.chunk_id.clone()),
                chunk: selected(CHUNK).then(|| record.chunk.clone()),
                file_name: selected(FILE_NAME).then(|| record.file_name.clone()),
            })
            .collect())
    }
}

fn vector_dimensions(schema: &IndexSchema) -> Option<usize> {
    schema.fields.iter().find_map(|field| field.dimensions)
}

/// Cosine similarity mapped to `(0, 1]`, 1.0 for identical directions.
fn cosine_score(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0f64;
    let mut norm_a = 0f64;
    let mut norm_b = 0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let cosine = if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    };
    1.0 / (2.0 - cosine)
}
