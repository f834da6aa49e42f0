//! Connection settings shared by the binaries.
//!
//! Every field maps to one environment variable (or the matching flag). The
//! credentials have no defaults, so a missing variable fails argument parsing.
//! Structs are built once in `main` and handed to each component by reference.

use std::fmt;
use std::time::Duration;

use clap::Args;

/// Default search REST API version.
pub const DEFAULT_SEARCH_API_VERSION: &str = "2023-11-01";

/// Search service endpoint, credentials and target index.
#[derive(Args, Clone)]
pub struct SearchSettings {
    /// Search service endpoint (https://<service>.search.windows.net)
    #[arg(id = "search_endpoint", long = "search-endpoint", env = "AZURE_SEARCH_SERVICE_ENDPOINT")]
    pub endpoint: String,

    /// Admin key used for index management and uploads
    #[arg(long = "search-admin-key", env = "AZURE_SEARCH_ADMIN_KEY")]
    pub admin_key: String,

    /// Name of the index that receives chunk records
    #[arg(long = "search-index", env = "AZURE_SEARCH_INDEX")]
    pub index_name: String,

    /// Search REST API version
    #[arg(
        long = "search-api-version",
        env = "AZURE_SEARCH_API_VERSION",
        default_value = DEFAULT_SEARCH_API_VERSION
    )]
    pub api_version: String,
}

impl fmt::Debug for SearchSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchSettings")
            .field("endpoint", &self.endpoint)
            .field("admin_key", &"<redacted>")
            .field("index_name", &self.index_name)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Blob container holding the source documents.
#[derive(Args, Clone)]
pub struct BlobSettings {
    /// Storage connection string (account key or SAS form)
    #[arg(long = "blob-connection-string", env = "BLOB_CONNECTION_STRING")]
    pub connection_string: String,

    /// Container to load documents from
    #[arg(long = "blob-container", env = "BLOB_CONTAINER_NAME")]
    pub container: String,
}

impl fmt::Debug for BlobSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobSettings")
            .field("connection_string", &"<redacted>")
            .field("container", &self.container)
            .finish()
    }
}

/// Azure OpenAI embedding deployment.
#[derive(Args, Clone)]
pub struct EmbeddingSettings {
    /// Embedding model deployment name
    #[arg(long = "embedding-deployment", env = "AZURE_OPENAI_EMBEDDING_DEPLOYMENT")]
    pub deployment: String,

    /// Azure OpenAI resource endpoint (https://<resource>.openai.azure.com)
    #[arg(id = "openai_endpoint", long = "openai-endpoint", env = "AZURE_OPENAI_ENDPOINT")]
    pub endpoint: String,

    /// Azure OpenAI API version (e.g. 2024-02-01)
    #[arg(id = "openai_api_version", long = "openai-api-version", env = "AZURE_OPENAI_API_VERSION")]
    pub api_version: String,

    /// Azure OpenAI API key
    #[arg(long = "openai-key", env = "AZURE_OPENAI_KEY")]
    pub api_key: String,

    /// Max number of texts sent per embedding request
    #[arg(long = "embedding-batch", env = "BLOBINDEX_EMBEDDING_BATCH", default_value_t = 2048)]
    pub batch_size: usize,
}

impl fmt::Debug for EmbeddingSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingSettings")
            .field("deployment", &self.deployment)
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("api_key", &"<redacted>")
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

/// Transport knobs applied to every HTTP client.
#[derive(Args, Debug, Clone)]
pub struct HttpSettings {
    /// Max seconds to wait for each HTTP request
    #[arg(long = "timeout-secs", env = "BLOBINDEX_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl HttpSettings {
    /// Request timeout, never shorter than one second.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
