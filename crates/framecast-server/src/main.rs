mod http;
mod protocol;
mod state;
mod ws;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use framecast_core::PipelineConfig;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mode = std::env::var("MODE").unwrap_or_else(|_| "wasm".to_string());
    let config = PipelineConfig::from_env()?;
    let detector = framecast_infer::select_backend(&mode, std::env::var("DETECT_ENDPOINT").ok());
    let summary_path = std::env::var("BENCH_OUTPUT").unwrap_or_else(|_| "bench/metrics.json".to_string());

    let state = Arc::new(AppState::new(
        mode.clone(),
        config,
        detector,
        summary_path.into(),
    )?);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(http::health))
        .route("/api/metrics", get(http::metrics))
        .route("/api/metrics/reset", post(http::reset_metrics))
        .route("/api/config", post(http::update_config))
        .route("/api/benchmark/start", post(http::benchmark_start))
        .route("/api/benchmark/results", get(http::benchmark_results))
        .route("/api/benchmark/frame", post(http::benchmark_frame))
        .route("/api/benchmark/bandwidth", post(http::benchmark_bandwidth))
        .route("/api/benchmark/save", post(http::benchmark_save))
        .layer(cors)
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");
    info!("Starting framecast server on {} (mode: {})", addr, mode);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
