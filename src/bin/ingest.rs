use anyhow::{Context, Result};
use blobindex::query::{DEFAULT_K, DEFAULT_QUERY, DEFAULT_TOP};
use blobindex::{
    logging, render_hit, vector_search, AzureOpenAiEmbedder, AzureSearchClient, BlobContainerLoader,
    BlobSettings, EmbeddingSettings, HttpSettings, IngestPipeline, MemoryIndex, QueryOptions,
    RecursiveCharacterSplitter, SearchService, SearchSettings, SplitterConfig,
};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "blobindex-ingest",
    about = "Load a blob container into a vector search index, then run a demo query"
)]
struct IngestCli {
    #[command(flatten)]
    search: SearchSettings,

    #[command(flatten)]
    blob: BlobSettings,

    #[command(flatten)]
    embedding: EmbeddingSettings,

    #[command(flatten)]
    http: HttpSettings,

    /// Question asked against the index after upload
    #[arg(long, env = "BLOBINDEX_QUERY", default_value = DEFAULT_QUERY)]
    query: String,

    /// Nearest neighbours retrieved for the query
    #[arg(long, default_value_t = DEFAULT_K)]
    k: usize,

    /// Number of hits printed
    #[arg(long, default_value_t = DEFAULT_TOP)]
    top: usize,

    /// Skip the demo query after ingestion
    #[arg(long, default_value_t = false)]
    skip_query: bool,

    /// Index into process memory instead of the search service. Blob, embedding
    /// and search settings are still required; only the index name is used from the latter.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv_override().ok();
    logging::init();
    let cli = IngestCli::parse();

    let loader = BlobContainerLoader::new(&cli.blob, &cli.http)?;
    let embedder = AzureOpenAiEmbedder::new(&cli.embedding, &cli.http)?;
    let splitter = RecursiveCharacterSplitter::new(SplitterConfig::default())?;

    let memory;
    let remote;
    let search: &dyn SearchService = if cli.dry_run {
        info!("dry run: records stay in process memory");
        memory = MemoryIndex::new();
        &memory
    } else {
        remote = AzureSearchClient::new(&cli.search, &cli.http)?;
        &remote
    };

    let index_name = cli.search.index_name.trim();
    let report = IngestPipeline::new(&loader, &splitter, &embedder, search, index_name)
        .run()
        .context("ingestion failed")?;
    info!(
        files = report.files,
        chunks = report.chunks,
        records = report.records,
        "ingestion finished"
    );
    println!("Uploaded chunks and embeddings for recursive text splitter");

    if cli.skip_query {
        return Ok(());
    }
    let options = QueryOptions {
        text: cli.query,
        k: cli.k,
        top: cli.top,
    };
    for hit in vector_search(&embedder, search, index_name, &options)? {
        println!("{}", render_hit(&hit));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 18] = [
        "--search-endpoint",
        "https://svc.search.windows.net",
        "--search-admin-key",
        "admin",
        "--search-index",
        "chunks",
        "--blob-connection-string",
        "UseDevelopmentStorage=true",
        "--blob-container",
        "docs",
        "--embedding-deployment",
        "ada",
        "--openai-endpoint",
        "https://res.openai.azure.com",
        "--openai-api-version",
        "2024-02-01",
        "--openai-key",
        "key",
    ];

    #[test]
    fn dry_run_parses_with_full_settings() {
        let args = std::iter::once("blobindex-ingest")
            .chain(REQUIRED)
            .chain(["--dry-run", "--skip-query"]);
        let cli = IngestCli::try_parse_from(args).expect("parse");
        assert!(cli.dry_run);
        assert!(cli.skip_query);
        assert_eq!(cli.search.index_name, "chunks");
        assert_eq!(cli.k, DEFAULT_K);
    }

    #[test]
    fn dry_run_still_requires_search_settings() {
        if std::env::var_os("AZURE_SEARCH_SERVICE_ENDPOINT").is_some() {
            return;
        }
        let args = std::iter::once("blobindex-ingest")
            .chain(REQUIRED[2..].iter().copied())
            .chain(["--dry-run"]);
        let err = IngestCli::try_parse_from(args).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
