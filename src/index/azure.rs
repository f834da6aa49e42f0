//! REST client for Azure AI Search.

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::schema::IndexSchema;
use super::{IndexRecord, SearchHit, SearchRequest, SearchService, UploadSummary};
use crate::settings::{HttpSettings, SearchSettings};

/// Blocking client for index management, document uploads and vector queries.
#[derive(Clone)]
pub struct AzureSearchClient {
    client: Client,
    endpoint: Url,
    api_version: String,
}

impl AzureSearchClient {
    /// Builds a client authenticated with the admin key.
    pub fn new(settings: &SearchSettings, http: &HttpSettings) -> Result<Self> {
        anyhow::ensure!(!settings.admin_key.trim().is_empty(), "missing search admin key");
        let endpoint = Url::parse(settings.endpoint.trim())
            .with_context(|| format!("invalid search endpoint {:?}", settings.endpoint))?;
        anyhow::ensure!(
            matches!(endpoint.scheme(), "http" | "https"),
            "search endpoint must be an http(s) URL"
        );
        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(settings.admin_key.trim()).context("invalid search admin key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(http.timeout())
            .default_headers(headers)
            .build()
            .context("failed to build search HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            api_version: settings.api_version.trim().to_string(),
        })
    }

    /// URL for `segments` under the service endpoint, with the API version attached.
    pub fn url(&self, segments: &[&str]) -> Result<Url> {
        service_url(&self.endpoint, segments, &self.api_version)
    }

    fn send(&self, request: RequestBuilder, what: &str) -> Result<reqwest::blocking::Response> {
        let resp = request
            .send()
            .with_context(|| format!("search {what} request failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("search {} failed ({}): {}", what, status, body);
        }
        Ok(resp)
    }
}

impl SearchService for AzureSearchClient {
    fn create_or_update_index(&self, schema: &IndexSchema) -> Result<()> {
        let url = self.url(&["indexes", schema.name.as_str()])?;
        debug!(url = %url, "PUT index definition");
        let request = self
            .client
            .put(url)
            .header("Prefer", "return=representation")
            .json(schema);
        self.send(request, "index create/update")?;
        Ok(())
    }

    fn upload_documents(&self, index_name: &str, records: &[IndexRecord]) -> Result<UploadSummary> {
        let url = self.url(&["indexes", index_name, "docs", "index"])?;
        debug!(url = %url, records = records.len(), "POST index batch");
        let batch = IndexBatch {
            value: records
                .iter()
                .map(|record| IndexAction {
                    action: "upload",
                    record,
                })
                .collect(),
        };
        // 207 Multi-Status still carries per-key results.
        let resp = self.send(self.client.post(url).json(&batch), "upload")?;
        let parsed: IndexBatchResponse = resp.json().context("failed to parse upload response")?;
        Ok(parsed.into_summary())
    }

    fn search(&self, index_name: &str, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let url = self.url(&["indexes", index_name, "docs", "search"])?;
        debug!(url = %url, "POST vector search");
        let body = SearchBody::from(request);
        let resp = self.send(self.client.post(url).json(&body), "query")?;
        let parsed: SearchResponse = resp.json().context("failed to parse search response")?;
        Ok(parsed.value)
    }
}

/// Joins `segments` onto the endpoint path and sets `api-version`.
pub fn service_url(endpoint: &Url, segments: &[&str], api_version: &str) -> Result<Url> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("search endpoint cannot be a base URL"))?
        .pop_if_empty()
        .extend(segments);
    url.query_pairs_mut()
        .clear()
        .append_pair("api-version", api_version);
    Ok(url)
}

#[derive(Serialize)]
struct IndexBatch<'a> {
    value: Vec<IndexAction<'a>>,
}

#[derive(Serialize)]
struct IndexAction<'a> {
    #[serde(rename = "@search.action")]
    action: &'static str,
    #[serde(flatten)]
    record: &'a IndexRecord,
}

#[derive(Debug, Deserialize)]
struct IndexBatchResponse {
    value: Vec<IndexingResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexingResult {
    key: String,
    status: bool,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    status_code: Option<u16>,
}

impl IndexBatchResponse {
    fn into_summary(self) -> UploadSummary {
        let mut summary = UploadSummary::default();
        for result in self.value {
            if result.status {
                summary.succeeded += 1;
                continue;
            }
            let reason = match (result.status_code, result.error_message) {
                (Some(code), Some(message)) => format!("{code}: {message}"),
                (None, Some(message)) => message,
                (Some(code), None) => code.to_string(),
                (None, None) => "rejected".to_string(),
            };
            warn!(key = %result.key, reason = %reason, "record rejected by search service");
            summary.failed.push((result.key, reason));
        }
        summary
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    vector_queries: Vec<VectorQueryBody<'a>>,
    select: String,
    top: usize,
}

#[derive(Serialize)]
struct VectorQueryBody<'a> {
    kind: &'static str,
    vector: &'a [f32],
    k: usize,
    fields: &'a str,
}

impl<'a> From<&'a SearchRequest> for SearchBody<'a> {
    fn from(request: &'a SearchRequest) -> Self {
        Self {
            vector_queries: request
                .vector_queries
                .iter()
                .map(|query| VectorQueryBody {
                    kind: "vector",
                    vector: &query.vector,
                    k: query.k_nearest_neighbors,
                    fields: &query.field,
                })
                .collect(),
            select: request.select.join(","),
            top: request.top,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    value: Vec<SearchHit>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn builds_versioned_urls() {
        let endpoint = Url::parse("https://svc.search.windows.net/").unwrap();
        let url = service_url(&endpoint, &["indexes", "docs", "docs", "search"], "2023-11-01")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://svc.search.windows.net/indexes/docs/docs/search?api-version=2023-11-01"
        );
    }

    #[test]
    fn upload_batch_tags_each_record() {
        let record = IndexRecord {
            file_id: "a.pdf_0".into(),
            chunk_id: "0_0".into(),
            chunk: "hello".into(),
            file_name: "a.pdf".into(),
            chunk_vector: vec![1.0, 0.0],
        };
        let batch = IndexBatch {
            value: vec![IndexAction {
                action: "upload",
                record: &record,
            }],
        };
        assert_eq!(
            serde_json::to_value(&batch).unwrap(),
            json!({"value": [{
                "@search.action": "upload",
                "FILE_ID": "a.pdf_0",
                "CHUNK_ID": "0_0",
                "CHUNK": "hello",
                "FILE_NAME": "a.pdf",
                "CHUNK_VECTOR": [1.0, 0.0]
            }]})
        );
    }

    #[test]
    fn upload_response_counts_failures() {
        let parsed: IndexBatchResponse = serde_json::from_value(json!({"value": [
            {"key": "0_0", "status": true, "errorMessage": null, "statusCode": 201},
            {"key": "0_1", "status": false, "errorMessage": "Document is too large", "statusCode": 400}
        ]}))
        .unwrap();
        let summary = parsed.into_summary();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(
            summary.failed,
            vec![("0_1".to_string(), "400: Document is too large".to_string())]
        );
        assert_eq!(summary.total(), 2);
    }

    #[test]
    fn search_body_is_vector_only() {
        let request = SearchRequest::chunk_vector(vec![0.25, 0.75], 3, 1);
        assert_eq!(
            serde_json::to_value(SearchBody::from(&request)).unwrap(),
            json!({
                "vectorQueries": [{"kind": "vector", "vector": [0.25, 0.75], "k": 3, "fields": "CHUNK_VECTOR"}],
                "select": "FILE_ID,CHUNK_ID,CHUNK,FILE_NAME",
                "top": 1
            })
        );
    }
}
