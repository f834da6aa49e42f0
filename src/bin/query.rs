use anyhow::Result;
use blobindex::query::{DEFAULT_K, DEFAULT_QUERY, DEFAULT_TOP};
use blobindex::{
    logging, render_hit, vector_search, AzureOpenAiEmbedder, AzureSearchClient, EmbeddingSettings,
    HttpSettings, QueryOptions, SearchSettings,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "blobindex-query",
    about = "Run a vector similarity query against an existing chunk index"
)]
struct QueryCli {
    #[command(flatten)]
    search: SearchSettings,

    #[command(flatten)]
    embedding: EmbeddingSettings,

    #[command(flatten)]
    http: HttpSettings,

    /// Question to embed and search for
    #[arg(env = "BLOBINDEX_QUERY", default_value = DEFAULT_QUERY)]
    query: String,

    /// Nearest neighbours retrieved
    #[arg(long, default_value_t = DEFAULT_K)]
    k: usize,

    /// Number of hits printed
    #[arg(long, default_value_t = DEFAULT_TOP)]
    top: usize,
}

fn main() -> Result<()> {
    dotenvy::dotenv_override().ok();
    logging::init();
    let cli = QueryCli::parse();

    let embedder = AzureOpenAiEmbedder::new(&cli.embedding, &cli.http)?;
    let search = AzureSearchClient::new(&cli.search, &cli.http)?;
    let options = QueryOptions {
        text: cli.query,
        k: cli.k,
        top: cli.top,
    };
    let hits = vector_search(&embedder, &search, cli.search.index_name.trim(), &options)?;
    if hits.is_empty() {
        println!("no matches");
    }
    for hit in hits {
        println!("{}", render_hit(&hit));
    }
    Ok(())
}
