//! Document loading from a blob container.

pub mod connection;
pub mod listing;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::{debug, info};
use url::Url;

pub use connection::{ConnectionStringError, StorageConnection, StorageCredential};
pub use listing::{BlobItem, BlobPage};

use crate::documents::Document;
use crate::extract::extract_text;
use crate::settings::{BlobSettings, HttpSettings};

const STORAGE_API_VERSION: &str = "2021-08-06";

/// Anything that can hand the pipeline its source documents.
pub trait DocumentSource {
    /// Loads every document, in a stable order.
    fn load(&self) -> Result<Vec<Document>>;
}

impl DocumentSource for Vec<Document> {
    fn load(&self) -> Result<Vec<Document>> {
        Ok(self.clone())
    }
}

/// Blocking loader that lists a container and extracts text from each blob.
pub struct BlobContainerLoader {
    client: Client,
    connection: StorageConnection,
    container: String,
}

impl BlobContainerLoader {
    /// Builds a loader from the blob settings.
    pub fn new(settings: &BlobSettings, http: &HttpSettings) -> Result<Self> {
        anyhow::ensure!(
            !settings.container.trim().is_empty(),
            "missing blob container name"
        );
        let connection: StorageConnection = settings
            .connection_string
            .parse()
            .context("invalid blob connection string")?;
        let client = Client::builder()
            .timeout(http.timeout())
            .build()
            .context("failed to build blob storage HTTP client")?;
        Ok(Self {
            client,
            connection,
            container: settings.container.trim().to_string(),
        })
    }

    /// Lists every blob in the container, following continuation markers.
    pub fn list_blobs(&self) -> Result<Vec<BlobItem>> {
        collect_pages(|marker| {
            let mut url = self.connection.resource_url(&self.container, None);
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("restype", "container")
                    .append_pair("comp", "list")
                    .append_pair("include", "metadata");
                if let Some(marker) = marker {
                    query.append_pair("marker", marker);
                }
            }
            let body = self
                .get(url)?
                .text()
                .context("failed to read blob listing body")?;
            listing::parse_blob_page(&body)
        })
    }

    /// Downloads a single blob's bytes.
    pub fn download(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.connection.resource_url(&self.container, Some(name));
        let bytes = self
            .get(url)?
            .bytes()
            .with_context(|| format!("failed to read blob {name}"))?;
        Ok(bytes.to_vec())
    }

    fn get(&self, mut url: Url) -> Result<Response> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let ms_headers = [("x-ms-date", date.as_str()), ("x-ms-version", STORAGE_API_VERSION)];
        let authorization = self.connection.authorization(&url, &ms_headers);
        self.connection.apply_sas(&mut url);

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-ms-date",
            HeaderValue::from_str(&date).context("invalid x-ms-date header")?,
        );
        headers.insert("x-ms-version", HeaderValue::from_static(STORAGE_API_VERSION));
        if let Some(auth) = authorization {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth).context("invalid storage authorization header")?,
            );
        }

        debug!(path = url.path(), "GET blob resource");
        let resp = self
            .client
            .get(url.clone())
            .headers(headers)
            .send()
            .with_context(|| format!("blob storage request to {} failed", url.path()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("blob storage returned {} for {}: {}", status, url.path(), body);
        }
        Ok(resp)
    }
}

impl DocumentSource for BlobContainerLoader {
    fn load(&self) -> Result<Vec<Document>> {
        let container_url = self.connection.resource_url(&self.container, None);
        let mut documents = Vec::new();
        for blob in self.list_blobs()? {
            if is_directory_marker(&blob) {
                debug!(blob = %blob.name, "skipping directory placeholder");
                continue;
            }
            let bytes = self.download(&blob.name)?;
            documents.push(document_for(&container_url, &blob, &bytes)?);
        }
        info!(
            files = documents.len(),
            container = %self.container,
            "loaded documents from blob container"
        );
        Ok(documents)
    }
}

/// Drains a paged listing, calling `fetch` with the previous page's marker
/// until a page comes back without one.
fn collect_pages<F>(mut fetch: F) -> Result<Vec<BlobItem>>
where
    F: FnMut(Option<&str>) -> Result<BlobPage>,
{
    let mut blobs = Vec::new();
    let mut marker: Option<String> = None;
    loop {
        let page = fetch(marker.as_deref())?;
        debug!(count = page.blobs.len(), "listed blob page");
        blobs.extend(page.blobs);
        match page.next_marker {
            Some(next) => marker = Some(next),
            None => return Ok(blobs),
        }
    }
}

/// Hierarchical-namespace folders and zero-length `dir/` placeholders carry no text.
fn is_directory_marker(blob: &BlobItem) -> bool {
    blob.is_directory || blob.name.ends_with('/')
}

/// Extracts one downloaded blob into a document sourced at `{container_url}/{name}`.
fn document_for(container_url: &Url, blob: &BlobItem, bytes: &[u8]) -> Result<Document> {
    let text = extract_text(&blob.name, blob.content_type.as_deref(), bytes)
        .with_context(|| format!("failed to extract text from {}", blob.name))?;
    debug!(
        blob = %blob.name,
        bytes = blob.content_length,
        chars = text.chars().count(),
        "extracted blob text"
    );
    Ok(Document::new(
        format!("{}/{}", container_url.as_str().trim_end_matches('/'), blob.name),
        blob.name.clone(),
        text,
    ))
}
