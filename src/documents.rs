//! Transient document and chunk types shared across pipeline stages.

/// Source file loaded from the blob container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Full source identifier (container URL plus blob path).
    pub source: String,
    /// Blob path relative to the container, used as the file name in the index.
    pub name: String,
    /// Extracted text content.
    pub text: String,
}

impl Document {
    /// Builds a document from its components.
    pub fn new(source: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Bounded substring of a [`Document`] emitted by the splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk within its parent document.
    pub index: usize,
    /// Chunk body submitted to the embedding model.
    pub text: String,
    /// Source identifier of the parent document.
    pub source: String,
}
