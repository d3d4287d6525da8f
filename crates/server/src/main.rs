//! ScynV Server
//!
//! Axum server exposing chat routing and streamed research, plus the `scynv`
//! command line (serve, local research, terminal chat client).

mod api;
mod client;
#[cfg(test)]
mod testing;

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::RwLock};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

use scynv_core::agent::{build_agent, spawn_research, DisconnectPolicy, ResearchEvent};
use scynv_core::config::{get_runtime_path, AgentSettings, Credentials};

/// Application state
pub struct AppState {
    pub settings: RwLock<AgentSettings>,
    pub credentials: Credentials,
    /// Shared connection pool for model and search calls
    pub http: reqwest::Client,
    /// Write settings back to disk on PATCH
    pub persist_settings: bool,
}

pub type SharedState = Arc<AppState>;

#[derive(Parser, Clone)]
#[command(author, version, about = "ScynV - Autonomous Research Assistant")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the ScynV server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Run research on a query (CLI mode, no server)
    Research {
        /// The question to research
        query: String,
        /// Print raw SSE frames instead of a summary
        #[arg(long)]
        raw: bool,
    },
    /// Chat with a running server, following research progress
    Ask {
        /// The message to send
        message: String,
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        url: String,
        /// Chat id (random when omitted)
        #[arg(long)]
        chat_id: Option<String>,
    },
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ScynV API",
        version = "1.0.0",
        description = "API for the ScynV research assistant"
    ),
    paths(
        api::chat::chat,
        api::research::research_stream,
        api::config::get_config,
        api::config::update_config,
        api::config::health
    ),
    components(
        schemas(
            api::ErrorBody,
            api::chat::ChatRequest,
            api::chat::ChatResponse,
            api::config::SettingsBody,
            api::config::SettingsPatchBody,
            api::config::HealthResponse
        )
    ),
    tags(
        (name = "chat", description = "Chat routing"),
        (name = "research", description = "Streamed autonomous research"),
        (name = "config", description = "Configuration and health")
    )
)]
struct ApiDoc;

async fn serve_openapi() -> impl IntoResponse {
    let spec = ApiDoc::openapi().to_json().unwrap_or_default();
    ([(header::CONTENT_TYPE, "application/json")], spec)
}

/// Build the router over the given state
pub fn app(state: SharedState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            api::chat::chat_routes()
                .merge(api::research::research_routes())
                .merge(api::config::config_routes())
                .route("/openapi.json", get(serve_openapi)),
        )
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Load `.env` from the working directory and the runtime directory
fn load_env() {
    let _ = dotenvy::dotenv();
    let _ = dotenvy::from_path(get_runtime_path().join(".env"));
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SCYNV_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub async fn run_server(port: u16) -> anyhow::Result<()> {
    let credentials = Credentials::from_env();
    if !credentials.has_model_key() {
        tracing::warn!("No GEMINI_KEY_1/GEMINI_KEY_2 set; chat and research will be rejected");
    }
    if !credentials.has_search_key() {
        tracing::warn!("No GOOGLE_SEARCH_API_KEY set; research is disabled");
    }

    let state: SharedState = Arc::new(AppState {
        settings: RwLock::new(AgentSettings::load().await),
        credentials,
        http: reqwest::Client::new(),
        persist_settings: true,
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("🚀 ScynV Server running at http://{}", addr);
    println!("   API v1 Routes:");
    println!("   Chat:      /api/v1/chat (POST)");
    println!("   Research:  /api/v1/research?message=...&chatId=... (SSE)");
    println!("   Config:    /api/v1/config (GET, PATCH)");
    println!("   Health:    /api/v1/health");
    println!("   OpenAPI:   /api/v1/openapi.json");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Run research in-process and print its events
async fn run_research(query: &str, raw: bool) -> anyhow::Result<()> {
    let settings = AgentSettings::load().await;
    let agent = build_agent(&settings, &Credentials::from_env())?;

    let mut handle = spawn_research(agent, query, DisconnectPolicy::RunToCompletion);
    while let Some(event) = handle.events.recv().await {
        if raw {
            print!("{}", event.to_sse_frame());
            continue;
        }
        match &event {
            ResearchEvent::PhaseStart { description, .. } => println!("▶ {}", description),
            ResearchEvent::PhaseComplete { phase_id, .. } => println!("✓ {} done", phase_id),
            ResearchEvent::Complete { result } => println!("\n{}", result),
            ResearchEvent::Error { error } => eprintln!("❌ Research failed: {}", error),
            ResearchEvent::PhaseUpdate { .. } => {}
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let args = Args::parse();
    match args.command {
        Some(CliCommand::Research { query, raw }) => run_research(&query, raw).await,
        Some(CliCommand::Ask {
            message,
            url,
            chat_id,
        }) => client::ask(&url, &message, chat_id).await,
        Some(CliCommand::Serve { port }) => run_server(port).await,
        None => run_server(8080).await,
    }
}
