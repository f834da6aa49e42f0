use std::cell::Cell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use anyhow::{bail, Result};
use blobindex::index::schema::EMBEDDING_DIMENSIONS;
use blobindex::{
    vector_search, Document, Embedder, IndexRecord, IndexSchema, IngestPipeline, MemoryIndex,
    QueryOptions, RecursiveCharacterSplitter, SearchHit, SearchRequest, SearchService,
    SplitterConfig, UploadSummary,
};
use pretty_assertions::assert_eq;

const INDEX: &str = "chunks";

/// Deterministic embedder: each text hashes to a unit axis plus a small tail.
struct HashEmbedder;

impl HashEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        let mut vector = vec![0.0f32; EMBEDDING_DIMENSIONS];
        vector[(seed % EMBEDDING_DIMENSIONS as u64) as usize] = 1.0;
        vector[((seed >> 16) % EMBEDDING_DIMENSIONS as u64) as usize] += 0.25;
        vector
    }
}

impl Embedder for HashEmbedder {
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| Self::vector(text)).collect())
    }
}

/// Counts calls and optionally refuses schema updates.
struct RecordingService {
    inner: MemoryIndex,
    fail_schema: bool,
    uploads: Cell<usize>,
}

impl RecordingService {
    fn new(fail_schema: bool) -> Self {
        Self {
            inner: MemoryIndex::new(),
            fail_schema,
            uploads: Cell::new(0),
        }
    }
}

impl SearchService for RecordingService {
    fn create_or_update_index(&self, schema: &IndexSchema) -> Result<()> {
        if self.fail_schema {
            bail!("search index create/update failed (409 Conflict): index in use");
        }
        self.inner.create_or_update_index(schema)
    }

    fn upload_documents(&self, index_name: &str, records: &[IndexRecord]) -> Result<UploadSummary> {
        self.uploads.set(self.uploads.get() + 1);
        self.inner.upload_documents(index_name, records)
    }

    fn search(&self, index_name: &str, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        self.inner.search(index_name, request)
    }
}

fn splitter() -> RecursiveCharacterSplitter {
    RecursiveCharacterSplitter::new(SplitterConfig::default()).unwrap()
}

fn doc(name: &str, text: &str) -> Document {
    Document::new(format!("https://acct.blob.core.windows.net/docs/{name}"), name, text)
}

#[test]
fn empty_source_uploads_nothing() {
    let source: Vec<Document> = Vec::new();
    let service = RecordingService::new(false);
    let splitter = splitter();

    let report = IngestPipeline::new(&source, &splitter, &HashEmbedder, &service, INDEX)
        .run()
        .unwrap();

    assert_eq!(report.files, 0);
    assert_eq!(report.records, 0);
    assert_eq!(report.upload, None);
    assert_eq!(service.uploads.get(), 0);
    assert!(service.inner.schema(INDEX).is_some());
}

#[test]
fn records_from_every_file_reach_the_index() {
    let source = vec![
        doc("a.pdf", "Voclosporin is a calcineurin inhibitor."),
        doc("b.pdf", "Belimumab targets B-lymphocyte stimulator."),
    ];
    let service = RecordingService::new(false);
    let splitter = splitter();

    let report = IngestPipeline::new(&source, &splitter, &HashEmbedder, &service, INDEX)
        .run()
        .unwrap();

    assert_eq!(report.records, 2);
    assert_eq!(service.uploads.get(), 1);
    let stored: Vec<(String, String, String)> = service
        .inner
        .records(INDEX)
        .into_iter()
        .map(|r| (r.chunk_id, r.file_id, r.file_name))
        .collect();
    assert_eq!(
        stored,
        vec![
            ("0_0".to_string(), "a.pdf_0".to_string(), "a.pdf".to_string()),
            ("1_0".to_string(), "b.pdf_1".to_string(), "b.pdf".to_string()),
        ]
    );
}

#[test]
fn chunks_stay_with_their_own_document() {
    let source = vec![
        doc("data.pdf", "contents of the data file"),
        doc("a.pdf", "contents of file a"),
    ];
    let service = RecordingService::new(false);
    let splitter = splitter();

    IngestPipeline::new(&source, &splitter, &HashEmbedder, &service, INDEX)
        .run()
        .unwrap();

    let records = service.inner.records(INDEX);
    let a = records.iter().find(|r| r.file_name == "a.pdf").unwrap();
    assert_eq!(a.chunk, "contents of file a");
    let data = records.iter().find(|r| r.file_name == "data.pdf").unwrap();
    assert_eq!(data.chunk, "contents of the data file");
}

#[test]
fn long_document_is_chunked_with_overlap() {
    let text = (0..400).map(|i| format!("word{i:03}")).collect::<Vec<_>>().join(" ");
    let source = vec![doc("long.txt", &text)];
    let service = RecordingService::new(false);
    let splitter = splitter();

    let report = IngestPipeline::new(&source, &splitter, &HashEmbedder, &service, INDEX)
        .run()
        .unwrap();

    assert!(report.chunks > 1);
    assert_eq!(report.records, report.chunks);
    for record in service.inner.records(INDEX) {
        assert!(record.chunk.chars().count() <= 1000);
        assert_eq!(record.chunk_vector.len(), EMBEDDING_DIMENSIONS);
    }
}

#[test]
fn schema_failure_without_index_fails_at_upload() {
    let source = vec![doc("a.pdf", "some text")];
    let service = RecordingService::new(true);
    let splitter = splitter();

    // The run gets past the schema failure; the missing index then rejects the upload.
    let err = IngestPipeline::new(&source, &splitter, &HashEmbedder, &service, INDEX)
        .run()
        .unwrap_err();
    assert!(format!("{err:#}").contains("not found"));
    assert_eq!(service.uploads.get(), 1);
}

#[test]
fn schema_failure_is_reported_when_index_exists() {
    let source = vec![doc("a.pdf", "some text")];
    let service = RecordingService::new(true);
    service
        .inner
        .create_or_update_index(&IndexSchema::chunk_index(INDEX))
        .unwrap();
    let splitter = splitter();

    let report = IngestPipeline::new(&source, &splitter, &HashEmbedder, &service, INDEX)
        .run()
        .unwrap();

    assert!(report.schema_error.unwrap().contains("409 Conflict"));
    assert_eq!(report.upload.map(|u| u.succeeded), Some(1));
}

#[test]
fn ensuring_schema_twice_is_idempotent() {
    let service = MemoryIndex::new();
    let schema = IndexSchema::chunk_index(INDEX);
    service.create_or_update_index(&schema).unwrap();
    let first = service.schema(INDEX);
    service.create_or_update_index(&schema).unwrap();
    assert_eq!(service.schema(INDEX), first);
}

#[test]
fn query_with_chunk_text_returns_that_chunk_first() {
    let source = vec![
        doc("a.pdf", "Voclosporin is a calcineurin inhibitor."),
        doc("b.pdf", "Belimumab targets B-lymphocyte stimulator."),
        doc("c.pdf", "Lupus nephritis affects the kidneys."),
    ];
    let service = MemoryIndex::new();
    let splitter = splitter();
    IngestPipeline::new(&source, &splitter, &HashEmbedder, &service, INDEX)
        .run()
        .unwrap();

    let options = QueryOptions {
        text: "Belimumab targets B-lymphocyte stimulator.".to_string(),
        k: 3,
        top: 1,
    };
    let hits = vector_search(&HashEmbedder, &service, INDEX, &options).unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].file_name.as_deref(), Some("b.pdf"));
    assert_eq!(hits[0].chunk_id.as_deref(), Some("1_0"));
    assert!((hits[0].score - 1.0).abs() < 1e-9);
}

#[test]
fn rerun_overwrites_by_key() {
    let splitter = splitter();
    let service = MemoryIndex::new();
    let first = vec![doc("a.pdf", "first version")];
    IngestPipeline::new(&first, &splitter, &HashEmbedder, &service, INDEX)
        .run()
        .unwrap();
    let second = vec![doc("a.pdf", "second version")];
    IngestPipeline::new(&second, &splitter, &HashEmbedder, &service, INDEX)
        .run()
        .unwrap();

    let records = service.records(INDEX);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].chunk, "second version");
}
