use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::AppState;
use crate::history::Point;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/metrics", get(list))
        .route("/metrics/{name}", get(series))
}

#[derive(Serialize)]
struct MetricList {
    capacity: usize,
    metrics: Vec<String>,
}

#[derive(Serialize)]
struct MetricSeries {
    metric: String,
    points: Vec<Point>,
}

async fn list(State(state): State<AppState>) -> Json<MetricList> {
    Json(MetricList {
        capacity: state.store.capacity(),
        metrics: state.store.metric_names(),
    })
}

async fn series(Path(name): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    // ---
    if !state.store.contains(&name) {
        return (StatusCode::NOT_FOUND, Json(format!("Unknown metric {name}"))).into_response();
    }

    let points = state.store.query(&name);
    (StatusCode::OK, Json(MetricSeries { metric: name, points })).into_response()
}
