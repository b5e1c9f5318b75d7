use crate::http::handlers::{health, list_site_readings, live, pending, QueryState};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn router(state: QueryState) -> Router {
    Router::new()
        .route("/sites/{site_id}/readings", get(list_site_readings))
        .route("/pending", get(pending))
        .route("/health", get(health))
        .route("/live", get(live))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
