use crate::domain::{DomainError, DomainResult, ValidationIssue};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Serve `router` on `addr` until the token is cancelled, then let in-flight requests finish
pub async fn run_http_server(addr: &str, router: Router, ctx: CancellationToken) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP listener on {}: {}", addr, e))?;
    info!(address = %addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { ctx.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Errors surfaced to HTTP clients by both gateways
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed validation with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    #[error("no readings found for site {0}")]
    NotFound(String),

    #[error("dependency unavailable: {0:#}")]
    Dependency(anyhow::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(issues) => Self::Validation(issues),
            DomainError::NotFound(site_id) => Self::NotFound(site_id),
            DomainError::Dependency(e) => Self::Dependency(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// A body that is not a JSON document fails validation as a whole
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(vec![ValidationIssue::new(
            "",
            "",
            "body",
            rejection.body_text(),
        )])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(details) => {
                warn!(issues = details.len(), "rejecting invalid request");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "error": "Unprocessable Entity", "details": details })),
                )
                    .into_response()
            }
            Self::NotFound(site_id) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "No readings found for site", "site_id": site_id })),
            )
                .into_response(),
            Self::Dependency(e) => {
                error!(error = %format!("{e:#}"), "dependency failure while serving request");
                internal_error()
            }
            Self::Internal(msg) => {
                error!(error = %msg, "internal error while serving request");
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,
}

/// Liveness: the process is up and serving, regardless of dependencies
pub async fn live() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "alive",
        consumer: None,
    })
}

/// Readiness response built from the outcome of a dependency round-trip
pub fn readiness(check: DomainResult<()>, consumer: Option<&str>) -> Response {
    let consumer = consumer.map(str::to_string);
    match check {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                consumer,
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "redis_unavailable",
                    consumer,
                }),
            )
                .into_response()
        }
    }
}
