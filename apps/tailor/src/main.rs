use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use tailor::config::Config;
use tailor::db::create_pool;
use tailor::llm_client::{self, LlmClient, TextCompletion, TimedCompletion};
use tailor::routes::build_router;
use tailor::state::{AppState, Ports};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    tailor::init_tracing(&config.rust_log);

    info!("Starting tailor v{}", env!("CARGO_PKG_VERSION"));
    if !config.robo_tailor {
        warn!("ROBO_TAILOR=false only affects tailor-batch; the HTTP service runs autonomously");
    }

    // Initialize PostgreSQL
    let db = create_pool(&config).await?;

    // Initialize Redis (per-job locks)
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    let completion: Arc<dyn TextCompletion> = Arc::new(TimedCompletion::new(
        Arc::new(llm),
        config.completion_timeout,
    ));
    info!(
        "LLM client initialized (model: {}, timeout: {:?})",
        llm_client::MODEL,
        config.completion_timeout
    );

    let ports = Ports::postgres(db, redis, completion, &config);
    let state = AppState::new(config.clone(), ports);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
