//! Embedding clients.

pub mod azure_openai;

use anyhow::Result;

/// Maps texts to fixed-length vectors, one per input, in input order.
pub trait Embedder {
    /// Embeds a batch of document texts.
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single query string.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedding service returned no vector for the query"))
    }
}
