// src/routes/health.rs
//! Health check endpoint for the grillwatch API.
//!
//! Reports that the service is answering requests, plus the time of the
//! last delivered snapshot so a stalled poll loop is visible from outside.
//! It is a sibling module in the `routes` directory and follows the Explicit
//! Module Boundary Pattern (EMBP): the gateway (`mod.rs`) merges the
//! subrouter exported here.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    last_snapshot_at: Option<DateTime<Utc>>,
}

/// Handle `GET /health`.
///
/// Never touches the remote store; the snapshot time comes from memory.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        last_snapshot_at: state.latest.get().map(|s| s.taken_at),
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
