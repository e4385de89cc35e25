//! `docrank`: a command-line demo of the hybrid API-documentation search
//! pipeline. Seeds a small hardcoded corpus standing in for what a real
//! OpenAPI/GraphQL/Postman parser would emit, then exposes `search` and
//! `stats` over it.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use docrank::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Hybrid BM25 + vector search over API documentation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the seeded demo corpus.
    Search {
        query: String,
        #[arg(short = 'n', long, default_value_t = 5)]
        n: usize,
        #[arg(long, value_enum, default_value_t = ModeArg::Hybrid)]
        mode: ModeArg,
        #[arg(long)]
        expand: bool,
        #[arg(long)]
        diversify: bool,
        /// Emit the response as JSON instead of the human-readable listing.
        #[arg(long)]
        json: bool,
    },
    /// Print corpus size, enabled features, and cache hit rates.
    Stats {
        /// Emit the stats as JSON instead of the human-readable listing.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Vector,
    Hybrid,
    Reranked,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Vector => SearchMode::Vector,
            ModeArg::Hybrid => SearchMode::Hybrid,
            ModeArg::Reranked => SearchMode::Reranked,
        }
    }
}

fn seed_corpus(orchestrator: &impl SeedableOrchestrator) -> Result<()> {
    let endpoints: &[(&str, &str)] = &[
        ("GET", "List widgets. Returns a paginated collection with a cursor for the next page."),
        ("GET", "Get a widget by id. Returns 404 if the widget does not exist."),
        ("POST", "Create a widget. Requires a JWT bearer token for authentication."),
        ("POST", "Login endpoint. Authenticate with username and password, returns a JWT bearer token."),
        ("POST", "Refresh token endpoint. Exchanges a refresh token for a new JWT bearer token."),
        ("PATCH", "Update a widget's fields. Accepts a partial JSON payload."),
        ("DELETE", "Delete a widget by id. This operation is deprecated in favor of soft-delete."),
        ("GET", "Rate limiting documentation. Describes the X-RateLimit-* response headers."),
        ("GET", "Pagination cursor documentation. Explains cursor-based pagination across list endpoints."),
        ("GET", "Schema reference for the Widget model, including all field types."),
    ];

    for (method, content) in endpoints {
        let mut metadata = Metadata::new();
        metadata.insert("method".to_string(), MetadataValue::String((*method).to_string()));
        if content.contains("deprecated") {
            metadata.insert("status".to_string(), MetadataValue::String("deprecated".to_string()));
        }
        orchestrator.seed_one(NewDocument::new(*content).with_metadata(metadata))?;
    }
    Ok(())
}

/// Lets `seed_corpus` stay generic over whichever concrete orchestrator
/// `main` constructs, without committing to one backend/model combination
/// at the function signature level.
trait SeedableOrchestrator {
    fn seed_one(&self, doc: NewDocument) -> Result<()>;
}

impl<B, E, C> SeedableOrchestrator for SearchOrchestrator<B, E, C>
where
    B: docrank_retrieve::VectorBackend,
    E: EmbeddingModel,
    C: docrank_rerank::CrossEncoderModel,
{
    fn seed_one(&self, doc: NewDocument) -> Result<()> {
        self.add_document(doc).map(|_| ()).map_err(anyhow::Error::from)
    }
}

fn print_results(response: &SearchResponse) {
    if response.degraded {
        println!("(degraded: reranker unavailable, showing fused ranking)\n");
    }
    for (rank, result) in response.results.iter().enumerate() {
        println!("{}. [{:.4}] ({:?}) {}", rank + 1, result.score, result.source_method, result.content);
    }
    if response.results.is_empty() {
        println!("(no results)");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let cli = Cli::parse();

    let backend = InMemoryVectorBackend::new(MockEmbeddingModel::new("mock-embed-v1"));
    let reranker = CrossEncoderReranker::new(MockCrossEncoderModel::new("mock-ce-v1"));
    let orchestrator = SearchOrchestrator::with_reranker(backend, MockEmbeddingModel::new("mock-embed-v1"), reranker);
    seed_corpus(&orchestrator)?;

    match cli.command {
        Commands::Search { query, n, mode, expand, diversify, json } => {
            let options = SearchOptions {
                mode: mode.into(),
                use_query_expansion: expand,
                use_diversification: diversify,
                ..SearchOptions::default()
            };
            let response = orchestrator.search(&query, n, &options)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_results(&response);
            }
        }
        Commands::Stats { json } => {
            let stats = orchestrator.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("documents: {}", stats.count);
                println!("features: {}", stats.features.join(", "));
                for (name, metrics) in &stats.cache_stats {
                    println!("{name}: hits={} misses={} hit_rate={:.2}", metrics.hits, metrics.misses, metrics.hit_rate());
                }
            }
        }
    }

    Ok(())
}
