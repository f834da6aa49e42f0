//! End-to-end ingestion: load, split, embed, ensure the index and upload.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::blob::DocumentSource;
use crate::documents::{Chunk, Document};
use crate::embedder::Embedder;
use crate::index::schema::{IndexSchema, EMBEDDING_DIMENSIONS};
use crate::index::{IndexRecord, SearchService, UploadSummary};
use crate::splitter::RecursiveCharacterSplitter;

/// Counters and outcomes from one ingestion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Documents loaded from the source.
    pub files: usize,
    /// Chunks produced by the splitter.
    pub chunks: usize,
    /// Records built and handed to the search service.
    pub records: usize,
    /// Upload outcome, `None` when there was nothing to upload.
    pub upload: Option<UploadSummary>,
    /// Schema create/update failure, when the run continued past one.
    pub schema_error: Option<String>,
}

/// Wires the pipeline stages together for a single sequential run.
pub struct IngestPipeline<'a> {
    source: &'a dyn DocumentSource,
    splitter: &'a RecursiveCharacterSplitter,
    embedder: &'a dyn Embedder,
    search: &'a dyn SearchService,
    index_name: &'a str,
}

impl<'a> IngestPipeline<'a> {
    /// Creates a pipeline writing into `index_name`.
    pub fn new(
        source: &'a dyn DocumentSource,
        splitter: &'a RecursiveCharacterSplitter,
        embedder: &'a dyn Embedder,
        search: &'a dyn SearchService,
        index_name: &'a str,
    ) -> Self {
        Self {
            source,
            splitter,
            embedder,
            search,
            index_name,
        }
    }

    /// Runs every stage once. Only a schema failure is tolerated.
    pub fn run(&self) -> Result<IngestReport> {
        let documents = self.source.load().context("failed to load documents")?;
        info!(files = documents.len(), "loaded documents");

        let per_document = self.splitter.split_documents(&documents);
        let chunks: usize = per_document.iter().map(Vec::len).sum();
        info!(chunks, "split documents");

        let schema_error = self.ensure_schema();

        let mut records = Vec::with_capacity(chunks);
        for (position, (document, doc_chunks)) in documents.iter().zip(&per_document).enumerate() {
            if doc_chunks.is_empty() {
                continue;
            }
            let texts: Vec<&str> = doc_chunks.iter().map(|chunk| chunk.text.as_str()).collect();
            let vectors = self
                .embedder
                .embed_documents(&texts)
                .with_context(|| format!("failed to embed chunks of {}", document.name))?;
            records.extend(build_records(position, document, doc_chunks, vectors)?);
        }
        info!(records = records.len(), "embedded chunks");

        let upload = if records.is_empty() {
            info!("no records to upload");
            None
        } else {
            let summary = self
                .search
                .upload_documents(self.index_name, &records)
                .with_context(|| format!("failed to upload records to {}", self.index_name))?;
            info!(
                succeeded = summary.succeeded,
                failed = summary.failed.len(),
                "uploaded records"
            );
            Some(summary)
        };

        Ok(IngestReport {
            files: documents.len(),
            chunks,
            records: records.len(),
            upload,
            schema_error,
        })
    }

    fn ensure_schema(&self) -> Option<String> {
        let schema = IndexSchema::chunk_index(self.index_name);
        match self.search.create_or_update_index(&schema) {
            Ok(()) => {
                info!(index = %schema.name, "index schema is up to date");
                None
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(index = %schema.name, error = %message, "index create/update failed, continuing");
                Some(message)
            }
        }
    }
}

/// Pairs one document's chunks with their vectors.
///
/// `FILE_ID` is `{name}_{position}` and `CHUNK_ID` is `{position}_{chunk}`,
/// where `position` is the document's place in the load order.
pub fn build_records(
    position: usize,
    document: &Document,
    chunks: &[Chunk],
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<IndexRecord>> {
    anyhow::ensure!(
        chunks.len() == vectors.len(),
        "got {} vectors for {} chunks of {}",
        vectors.len(),
        chunks.len(),
        document.name
    );
    chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, vector)| {
            anyhow::ensure!(
                vector.len() == EMBEDDING_DIMENSIONS,
                "embedding for chunk {} of {} has {} dimensions, expected {}",
                chunk.index,
                document.name,
                vector.len(),
                EMBEDDING_DIMENSIONS
            );
            Ok(IndexRecord {
                file_id: format!("{}_{}", document.name, position),
                chunk_id: format!("{}_{}", position, chunk.index),
                chunk: chunk.text.clone(),
                file_name: document.name.clone(),
                chunk_vector: vector,
            })
        })
        .collect()
}
