#![warn(missing_docs)]
//! Core library entry points for the blobindex ingestion pipeline.

pub mod blob;
pub mod documents;
pub mod embedder;
pub mod extract;
pub mod index;
pub mod logging;
pub mod pipeline;
pub mod query;
pub mod settings;
pub mod splitter;

pub use blob::{BlobContainerLoader, DocumentSource, StorageConnection};
pub use documents::{Chunk, Document};
pub use embedder::azure_openai::AzureOpenAiEmbedder;
pub use embedder::Embedder;
pub use index::azure::AzureSearchClient;
pub use index::memory::MemoryIndex;
pub use index::schema::IndexSchema;
pub use index::{IndexRecord, SearchHit, SearchRequest, SearchService, UploadSummary, VectorQuery};
pub use pipeline::{IngestPipeline, IngestReport};
pub use query::{render_hit, vector_search, QueryOptions};
pub use settings::{BlobSettings, EmbeddingSettings, HttpSettings, SearchSettings};
pub use splitter::{RecursiveCharacterSplitter, SplitterConfig};
