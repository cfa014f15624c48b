mod ats;
mod config;
mod errors;
mod extract;
mod highlights;
mod index;
mod llm_client;
mod progress;
mod retry;
mod routes;
mod screening;
mod settings;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ats::AtsClient;
use crate::config::Config;
use crate::extract::DocumentExtractor;
use crate::highlights::HighlightsPipeline;
use crate::index::embedder::LocalEmbedder;
use crate::index::store::IndexStore;
use crate::index::EmbeddingIndex;
use crate::llm_client::LlmClient;
use crate::retry::TokioSleeper;
use crate::routes::build_router;
use crate::screening::ScreeningService;
use crate::settings::{Settings, SettingsStore};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Crate name, not package name: the tracing target uses underscores.
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Scout API v{}", env!("CARGO_PKG_VERSION"));

    // Settings store: file-persisted credentials layered over env defaults,
    // updatable at runtime without a restart.
    let settings = Arc::new(SettingsStore::load(
        config.settings_path.clone(),
        Settings {
            ats_api_key: config.ats_api_key.clone(),
            ats_on_behalf_of: config.ats_on_behalf_of.clone(),
            anthropic_api_key: config.anthropic_api_key.clone(),
        },
    ));

    let sleeper = Arc::new(TokioSleeper);

    // ATS client
    let ats = AtsClient::new(config.ats_base_url.clone(), settings.clone(), sleeper.clone());
    info!("ATS client initialized ({})", config.ats_base_url);

    // LLM client
    let llm = LlmClient::new(settings.clone(), sleeper.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Document extractor
    let extractor = DocumentExtractor::new();

    // Embedding index — the local model loads lazily on first use
    let embedder = Arc::new(LocalEmbedder::new());
    let index = Arc::new(EmbeddingIndex::new(
        IndexStore::new(config.data_dir.clone()),
        embedder,
    ));
    info!("Embedding index at {}", config.data_dir.display());

    // LLM-backed services
    let screening = ScreeningService::new(llm.clone(), extractor.clone());
    let highlights = Arc::new(HighlightsPipeline::new(
        llm.clone(),
        config.ats_ui_base_url.clone(),
    ));

    // Build app state
    let state = AppState {
        settings,
        ats,
        extractor,
        index,
        screening,
        highlights,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
