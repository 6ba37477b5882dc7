use axum::Router;

mod fleet;
mod health;
mod metrics;
mod state;

pub use state::{AppState, LatestSnapshot};

// ---

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(fleet::router())
        .merge(metrics::router())
        .merge(health::router())
        .with_state(state)
}
