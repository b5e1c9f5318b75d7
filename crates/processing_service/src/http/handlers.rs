use crate::domain::{QueryService, SiteReadings};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use common::domain::{ConsumerPending, EntryId, EventLog};
use common::http::{readiness, ApiError, HealthResponse};
use serde::Serialize;
use std::sync::Arc;

/// Shared state of the query gateway
#[derive(Clone)]
pub struct QueryState {
    pub query: Arc<QueryService>,
    /// Non-blocking handle used for probes and pending-set inspection
    pub event_log: Arc<dyn EventLog>,
    pub stream: String,
    pub group: String,
    pub consumer: String,
}

#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub stream: String,
    pub group: String,
    pub count: u64,
    pub lowest_id: Option<EntryId>,
    pub highest_id: Option<EntryId>,
    pub consumers: Vec<ConsumerPending>,
}

/// `GET /sites/{site_id}/readings`
pub async fn list_site_readings(
    State(state): State<QueryState>,
    Path(site_id): Path<String>,
) -> Result<Json<SiteReadings>, ApiError> {
    Ok(Json(state.query.list_readings(&site_id).await?))
}

/// `GET /live`
pub async fn live(State(state): State<QueryState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "alive",
        consumer: Some(state.consumer),
    })
}

/// `GET /health`
pub async fn health(State(state): State<QueryState>) -> Response {
    let check = match state.event_log.ping().await {
        Ok(()) => state.query.check_ready().await,
        Err(e) => Err(e),
    };
    readiness(check, Some(&state.consumer))
}

/// `GET /pending`
pub async fn pending(State(state): State<QueryState>) -> Result<Json<PendingResponse>, ApiError> {
    let summary = state
        .event_log
        .pending_summary(&state.stream, &state.group)
        .await?;

    Ok(Json(PendingResponse {
        stream: state.stream,
        group: state.group,
        count: summary.count,
        lowest_id: summary.lowest_id,
        highest_id: summary.highest_id,
        consumers: summary.consumers,
    }))
}
