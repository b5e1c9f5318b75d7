use crate::domain::ReadingService;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use common::http::{readiness, ApiError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub stream_id: String,
}

/// `POST /readings`
pub async fn submit_reading(
    State(service): State<Arc<ReadingService>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let Json(body) = body?;
    let id = service.submit(&body).await?;

    Ok((
        StatusCode::CREATED,
        Json(AcceptedResponse {
            status: "accepted",
            stream_id: id.to_string(),
        }),
    ))
}

/// `GET /health`
pub async fn health(State(service): State<Arc<ReadingService>>) -> Response {
    readiness(service.check_ready().await, None)
}
