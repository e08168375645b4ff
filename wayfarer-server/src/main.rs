use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wayfarer::Assistant;

mod api;
mod models;
mod state;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "wayfarer-server")]
#[command(about = "HTTP backend for the Wayfarer travel assistant")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000, env = "WAYFARER_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,wayfarer=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let llm = wayfarer::provider_from_env()?;
    tracing::info!(
        provider = llm.provider(),
        model = llm.model(),
        "initializing travel assistant"
    );

    let state = Arc::new(AppState {
        assistant: Arc::new(Assistant::new(llm)),
    });

    let app = Router::new()
        .route("/api/v1/health", get(api::health_check))
        .route("/api/v1/chat", post(api::chat))
        .route("/api/v1/chat/stream", post(api::chat_stream))
        .route("/api/v1/chat/stream/thinking", post(api::chat_stream_thinking))
        .route("/api/v1/chat/stream/structured", post(api::chat_stream_structured))
        .route("/api/v1/chat/stream/full", post(api::chat_stream_full))
        .route("/api/v1/memory", get(api::get_memory))
        .route("/api/v1/memory/clear", post(api::clear_memory))
        .route("/api/v1/memory/summary", post(api::update_summary))
        .route("/api/v1/memory/limit", post(api::set_memory_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!("Wayfarer server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
