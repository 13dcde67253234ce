//! # pdfqa
//!
//! Question answering over uploaded documents.
//!
//! ## Commands
//!
//! - `pdfqa serve` - Start the HTTP API (default)
//! - `pdfqa migrate` - Apply database migrations and exit
//! - `pdfqa ingest <PATH>` - Ingest a local PDF, text or Markdown file
//! - `pdfqa ask <DOCUMENT_ID> <QUESTION>` - Ask a question about a stored document

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use pdfqa::{
    agents::{answer_question, IngestAgent, UploadedFile},
    config::Config,
    embeddings::Embedder,
    llm::LLM,
    routes::create_router,
    utils::init_logger,
    AppState,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "pdfqa")]
#[command(about = "Ask questions about PDF documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,

    /// Run database migrations and exit
    Migrate,

    /// Ingest a local document
    Ingest {
        /// File to ingest
        path: PathBuf,

        /// Source URL recorded with the document
        #[arg(long)]
        url: Option<String>,
    },

    /// Ask a question about a stored document
    Ask {
        /// Document id returned by `ingest`
        document_id: Uuid,

        /// Question text
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    let _log_guard = init_logger(&config.logging);
    info!("Configuration loaded: {:?}", config.server);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => migrate(&config).await,
        Commands::Ingest { path, url } => ingest(config, path, url).await,
        Commands::Ask {
            document_id,
            question,
        } => ask(config, document_id, &question).await,
    }
}

async fn build_state(config: Config) -> Result<AppState> {
    config.database.require_url()?;

    let embedder = Embedder::from_config(&config.embedding)?;
    info!(
        provider = embedder.provider_name(),
        model = embedder.model(),
        dimensions = embedder.dimensions(),
        "Embedder ready"
    );

    let llm = LLM::from_config(&config.llm)?;
    if llm.is_configured() {
        info!(provider = llm.provider_name(), model = llm.model(), "LLM ready");
    } else {
        warn!("No LLM API key configured, answers will be the best matching chunk");
    }

    let store = pdfqa::db::connect_store(&config.database).await?;

    Ok(AppState {
        config,
        store,
        embedder: Arc::new(embedder),
        llm: Arc::new(llm),
    })
}

async fn serve(config: Config) -> Result<()> {
    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid HOST: {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);

    let state = build_state(config).await?;
    let app = create_router(state);

    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn migrate(config: &Config) -> Result<()> {
    if config.database.is_memory() {
        warn!("DATABASE_URL is memory://, nothing to migrate");
        return Ok(());
    }
    let pool = pdfqa::db::create_pool(&config.database).await?;
    pdfqa::db::run_migrations(&pool).await
}

async fn ingest(config: Config, path: PathBuf, url: Option<String>) -> Result<()> {
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let state = build_state(config).await?;
    let document = IngestAgent::ingest(
        &state,
        UploadedFile {
            filename,
            content_type: None,
            bytes: Bytes::from(bytes),
            url,
        },
    )
    .await?;

    println!("{}", document.id);
    Ok(())
}

async fn ask(config: Config, document_id: Uuid, question: &str) -> Result<()> {
    let state = build_state(config).await?;
    let response = answer_question(&state, document_id, question).await?;

    println!("{}", response.answer);
    println!("score: {:.4} ({:?})", response.score, response.source);
    Ok(())
}
