use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AppState;
use crate::models::{DeviceStatus, FleetCounts, FleetSnapshot, OnlineState, RunState};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/fleet", get(fleet))
        .route("/fleet/{device_id}", get(device))
}

/// Query parameters for filtering the device list
#[derive(Debug, Deserialize)]
pub struct FleetQuery {
    run_state: Option<RunState>,
    online_state: Option<OnlineState>,
    limit: Option<u32>,
}

/// One device as presented to operators.
#[derive(Serialize)]
struct DeviceView<'a> {
    #[serde(flatten)]
    status: &'a DeviceStatus,
    last_seen_ago: Option<String>,
    network_current: bool,
}

impl<'a> From<&'a DeviceStatus> for DeviceView<'a> {
    fn from(status: &'a DeviceStatus) -> Self {
        Self {
            status,
            last_seen_ago: status.last_seen_ago(),
            network_current: status.network_is_current(),
        }
    }
}

#[derive(Serialize)]
struct FleetResponse<'a> {
    taken_at: DateTime<Utc>,
    no_data: bool,
    counts: &'a FleetCounts,
    devices: Vec<DeviceView<'a>>,
}

fn not_ready() -> axum::response::Response {
    (StatusCode::SERVICE_UNAVAILABLE, Json("No snapshot yet")).into_response()
}

async fn fleet(Query(params): Query<FleetQuery>, State(state): State<AppState>) -> impl IntoResponse {
    // ---
    let Some(snapshot) = state.latest.get() else {
        return not_ready();
    };

    let devices = apply_filters(&snapshot, &params);
    debug!("GET /fleet - returning {} of {} devices", devices.len(), snapshot.len());

    let body = FleetResponse {
        taken_at: snapshot.taken_at,
        no_data: snapshot.no_data,
        counts: &snapshot.counts,
        devices: devices.into_iter().map(DeviceView::from).collect(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

async fn device(Path(device_id): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    // ---
    let Some(snapshot) = state.latest.get() else {
        return not_ready();
    };

    match snapshot.device(&device_id) {
        Some(status) => (StatusCode::OK, Json(DeviceView::from(status))).into_response(),
        None => (StatusCode::NOT_FOUND, Json(format!("Unknown device {device_id}"))).into_response(),
    }
}

/// Apply query filters to the snapshot's devices
fn apply_filters<'a>(snapshot: &'a FleetSnapshot, params: &FleetQuery) -> Vec<&'a DeviceStatus> {
    // ---
    snapshot
        .devices
        .iter()
        .filter(|d| params.run_state.map_or(true, |s| d.run_state == s))
        .filter(|d| params.online_state.map_or(true, |s| d.online_state == s))
        .take(params.limit.unwrap_or(1000) as usize)
        .collect()
}
