//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::dispatch::QueueStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub transport: String,
    pub queue: QueueStats,
    pub templates_cached: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.email.is_accepting() {
        "healthy"
    } else {
        "draining"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        transport: state.email.transport_name().to_string(),
        queue: state.email.queue_stats(),
        templates_cached: state.email.cache_size(),
    })
}
