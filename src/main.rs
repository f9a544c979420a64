use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use marktrag::catalog::ReconcileEngine;
use marktrag::catalog::RegionRegistry;
use marktrag::config::AppConfig;
use marktrag::embeddings::EmbeddingClient;
use marktrag::index::QdrantStore;
use marktrag::llm::GenerationClient;
use marktrag::rag::RagService;
use marktrag::rag::Retriever;
use marktrag::service::OfferAssistant;
use marktrag::sources::JsonFileSource;
use marktrag::sources::OfferSource;
use marktrag::sources::UnconfiguredSource;
use marktrag::Result;
use tracing::info;

#[derive(Parser)]
#[command(name = "marktrag")]
#[command(about = "Supermarket offer catalog with RAG product search")]
#[command(version)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a scraped offer dump into the catalog
    Ingest {
        /// Region code the rows were scraped for
        #[arg(short, long)]
        region: String,
        /// Path to a JSON array of raw offer rows
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Ask a product query against the catalog
    Ask {
        /// Free-text product query
        query: String,
        /// Region code to search in
        #[arg(short, long, default_value = "ALL")]
        region: String,
        /// Scraper dump to ingest if the region has no snapshot yet
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Check whether a region has a completed catalog snapshot
    Status {
        /// Region code to check
        #[arg(short, long)]
        region: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        marktrag::logging::init_logging_with_level("debug")?;
    } else {
        marktrag::logging::init_logging()?;
    }

    let config = AppConfig::load()?;

    match cli.command {
        Commands::Ingest { region, file } => {
            let (store, embedder) = build_backends(&config)?;
            let engine = ReconcileEngine::from_config(&config, store.clone(), embedder);
            let registry = RegionRegistry::new(store);

            let rows = JsonFileSource::new(file).fetch(&region).await?;
            info!("Loaded {} raw rows for region {}", rows.len(), region);

            let report = engine.reconcile(&rows, &region).await?;
            registry.mark_completed(&region, report.accepted).await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Ask {
            query,
            region,
            file,
        } => {
            let (store, embedder) = build_backends(&config)?;
            let llm = Arc::new(GenerationClient::from_config(&config)?);

            let retriever = Retriever::new(store.clone(), embedder.clone(), config.collection());
            let rag = RagService::new(retriever, llm, config.search_limit());
            let engine = ReconcileEngine::from_config(&config, store.clone(), embedder);
            let registry = RegionRegistry::new(store);

            let source: Arc<dyn OfferSource> = match file {
                Some(path) => Arc::new(JsonFileSource::new(path)),
                None => Arc::new(UnconfiguredSource),
            };

            let assistant = OfferAssistant::from_services(registry, engine, rag, source);
            let outcome = assistant.answer(&query, &region).await;

            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Status { region } => {
            let (store, _) = build_backends(&config)?;
            let registry = RegionRegistry::new(store);

            let available = registry.is_available(&region).await?;
            println!(
                "{}",
                serde_json::json!({ "region_code": region, "available": available })
            );
        }
    }

    Ok(())
}

fn build_backends(config: &AppConfig) -> Result<(Arc<QdrantStore>, Arc<EmbeddingClient>)> {
    let store = Arc::new(QdrantStore::from_config(config)?);
    let embedder = Arc::new(EmbeddingClient::from_config(config)?);
    Ok((store, embedder))
}
