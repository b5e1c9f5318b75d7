use crate::domain::ReadingService;
use crate::http::handlers::{health, submit_reading};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(service: Arc<ReadingService>) -> Router {
    Router::new()
        .route("/readings", post(submit_reading))
        .route("/health", get(health))
        .route("/live", get(common::http::live))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
