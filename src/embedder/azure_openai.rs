//! Azure OpenAI embedding client implementation.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::Embedder;
use crate::settings::{EmbeddingSettings, HttpSettings};

/// Blocking embeddings client for an Azure OpenAI deployment.
#[derive(Clone)]
pub struct AzureOpenAiEmbedder {
    client: Client,
    endpoint: Url,
    batch_size: usize,
}

impl AzureOpenAiEmbedder {
    /// Builds a new client for the configured deployment.
    pub fn new(settings: &EmbeddingSettings, http: &HttpSettings) -> Result<Self> {
        anyhow::ensure!(!settings.api_key.trim().is_empty(), "missing Azure OpenAI API key");
        anyhow::ensure!(
            !settings.deployment.trim().is_empty(),
            "missing embedding deployment name"
        );
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(settings.api_key.trim()).context("invalid Azure OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(http.timeout())
            .default_headers(headers)
            .build()
            .context("failed to build Azure OpenAI HTTP client")?;
        let endpoint = embeddings_url(&settings.endpoint, &settings.deployment, &settings.api_version)?;
        Ok(Self {
            client,
            endpoint,
            batch_size: settings.batch_size.max(1),
        })
    }

    /// Sends one batch of strings and returns their embedding vectors.
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest { input: inputs };
        debug!(inputs = inputs.len(), "requesting embeddings");
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .context("Azure OpenAI embeddings request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("Azure OpenAI embeddings request failed ({}): {}", status, body);
        }
        let parsed: EmbeddingResponse = resp
            .json()
            .context("failed to parse Azure OpenAI embedding response")?;
        parsed.into_vectors(inputs.len())
    }
}

impl Embedder for AzureOpenAiEmbedder {
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        embed_in_batches(texts, self.batch_size, |batch| self.embed_batch(batch))
    }
}

/// Sends `texts` through `send` at most `batch_size` at a time, concatenating results in order.
fn embed_in_batches<F>(texts: &[&str], batch_size: usize, mut send: F) -> Result<Vec<Vec<f32>>>
where
    F: FnMut(&[&str]) -> Result<Vec<Vec<f32>>>,
{
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        vectors.extend(send(batch)?);
    }
    Ok(vectors)
}

/// `{endpoint}/openai/deployments/{deployment}/embeddings?api-version={version}`
pub fn embeddings_url(endpoint: &str, deployment: &str, api_version: &str) -> Result<Url> {
    anyhow::ensure!(!api_version.trim().is_empty(), "missing Azure OpenAI API version");
    let mut url = Url::parse(endpoint.trim())
        .with_context(|| format!("invalid Azure OpenAI endpoint {endpoint:?}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Azure OpenAI endpoint cannot be a base URL"))?
        .pop_if_empty()
        .extend(["openai", "deployments", deployment.trim(), "embeddings"]);
    url.query_pairs_mut()
        .clear()
        .append_pair("api-version", api_version.trim());
    Ok(url)
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

impl EmbeddingResponse {
    fn into_vectors(mut self, expected_len: usize) -> Result<Vec<Vec<f32>>> {
        self.data.sort_by_key(|entry| entry.index);
        anyhow::ensure!(
            self.data.len() == expected_len,
            "Azure OpenAI returned {} embeddings for {} inputs",
            self.data.len(),
            expected_len
        );
        Ok(self.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
