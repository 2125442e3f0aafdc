// src/main.rs

use dotenvy::dotenv;
use gemini_proxy::config::Config;
use gemini_proxy::gemini::GeminiClient;
use gemini_proxy::routes;
use gemini_proxy::state::AppState;
use std::net::SocketAddr;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // The key is checked again per request; warn early so a bad deploy is
    // visible in the logs before the first 500.
    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; generate requests will fail");
    }

    // Shared upstream client (one connection pool for all requests)
    let gemini = GeminiClient::new(reqwest::Client::new(), config.gemini_api_base.clone());

    // Create AppState
    let state = AppState { config, gemini };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}
