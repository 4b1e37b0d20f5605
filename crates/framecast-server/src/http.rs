use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Response, Json};
use framecast_core::now_ms;
use framecast_pipeline::{BandwidthSample, FrameOutcome, SessionReport};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "mode": state.mode,
        "timestamp": now_ms(),
    }))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "metrics": state.processor.metrics_snapshot(),
        "queue": state.processor.queue_status(),
    }))
}

pub async fn reset_metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.processor.reset_metrics();
    Json(json!({ "status": "reset" }))
}

#[derive(Debug, Deserialize)]
pub struct ConfigRequest {
    pub queue_capacity: usize,
    pub timeout_ms: u64,
}

pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfigRequest>,
) -> Response {
    match state
        .processor
        .update_config(req.queue_capacity, req.timeout_ms)
    {
        Ok(()) => Json(json!({ "status": "updated" })).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub duration: Option<u64>,
    pub mode: Option<String>,
}

pub async fn benchmark_start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Response {
    let duration = req.duration.unwrap_or(state.config.benchmark_duration_secs);
    if duration == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": "duration must be a positive integer" })),
        )
            .into_response();
    }

    let mode = req.mode.unwrap_or_else(|| state.mode.clone());
    // A fresh run measures from a clean slate.
    state.processor.reset_metrics();
    let ack = state.benchmark.start(duration, mode);
    Json(ack).into_response()
}

pub async fn benchmark_results(State(state): State<Arc<AppState>>) -> Response {
    match state.benchmark.results() {
        SessionReport::Running { elapsed_ms } => Json(json!({
            "status": "running",
            "elapsed": elapsed_ms,
            "metrics": state.processor.metrics_snapshot(),
        }))
        .into_response(),
        SessionReport::Completed(summary) => Json(summary).into_response(),
        SessionReport::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": "no_results",
                "message": "No benchmark results available",
            })),
        )
            .into_response(),
    }
}

// Outcome ingestion for in-browser inference, which never passes
// through the server pipeline.
pub async fn benchmark_frame(
    State(state): State<Arc<AppState>>,
    Json(outcome): Json<FrameOutcome>,
) -> Json<Value> {
    if state.benchmark.record_frame(outcome) {
        Json(json!({ "status": "recorded" }))
    } else {
        Json(json!({ "status": "not_running" }))
    }
}

pub async fn benchmark_bandwidth(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<BandwidthSample>,
) -> Json<Value> {
    if state.benchmark.record_bandwidth(sample) {
        Json(json!({ "status": "recorded" }))
    } else {
        Json(json!({ "status": "not_running" }))
    }
}

pub async fn benchmark_save(
    State(state): State<Arc<AppState>>,
    Json(results): Json<Value>,
) -> Response {
    let path = &state.summary_path;
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            error!("Failed to create benchmark output dir: {}", e);
            return save_error(e).into_response();
        }
    }

    let body = match serde_json::to_vec_pretty(&results) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to encode benchmark results: {}", e);
            return save_error(e).into_response();
        }
    };

    match tokio::fs::write(path, body).await {
        Ok(()) => {
            info!("Benchmark results saved to {}", path.display());
            Json(json!({ "status": "saved", "path": path.display().to_string() })).into_response()
        }
        Err(e) => {
            error!("Failed to save benchmark results: {}", e);
            save_error(e).into_response()
        }
    }
}

fn save_error(e: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "status": "error", "message": e.to_string() })),
    )
}
