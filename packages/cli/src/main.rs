// ABOUTME: Server entrypoint wiring configuration, API clients, and the webhook router
// ABOUTME: Loads .env, builds the sync engine, and serves until shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dealbridge_api::{create_router, AppState};
use dealbridge_config::Config;
use dealbridge_linear::LinearClient;
use dealbridge_sync::SyncEngine;
use dealbridge_twenty::TwentyClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    println!("🚀 Starting Dealbridge sync server...");
    println!("📡 Server will run on http://localhost:{}", config.port);
    println!("🔗 Twenty API: {}", config.twenty.base_url);

    let twenty = Arc::new(TwentyClient::new(
        &config.twenty.base_url,
        &config.twenty.api_key,
    )?);
    let linear = Arc::new(LinearClient::new(
        &config.linear.api_key,
        &config.linear.team_id,
    )?);
    let engine = Arc::new(SyncEngine::new(twenty, linear));

    let state = AppState {
        engine,
        twenty_webhook_secret: config.twenty.webhook_secret,
        linear_webhook_secret: config.linear.webhook_secret,
    };

    // Webhook sources send no browser traffic, but a permissive CORS layer
    // keeps manual testing from dashboards painless
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    println!("✅ Server listening on {}", addr);
    info!("Webhook endpoints ready: /webhooks/twenty, /webhooks/linear");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        println!("👋 Shutting down");
    }
}
