pub mod dashboard;
pub mod observations;

use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// API error response
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub err_code: i32,
    /// Error message
    pub err_msg: String,
    /// Trace ID of the request
    pub trace_id: String,
}

/// Uniform response envelope
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 0 on success
    pub err_code: i32,
    pub err_msg: String,
    pub trace_id: String,
    pub data: Option<T>,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "not_found" => 1004,
        "storage_error" => 1501,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// Health check payload
#[derive(Serialize, ToSchema)]
struct HealthResponse {
    /// Server version
    version: String,
    /// Seconds since start
    uptime_secs: i64,
    /// Number of configured targets
    target_count: usize,
    /// Number of stored observations
    observation_count: u64,
}

/// Reports liveness and whether the observation store is readable.
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Observation store unavailable", body = ApiError)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.count() {
        Ok(observation_count) => success_response(
            StatusCode::OK,
            &trace_id,
            HealthResponse {
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_secs: (Utc::now() - state.start_time).num_seconds(),
                target_count: state.hosts.len(),
                observation_count,
            },
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check could not read the store");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                &trace_id,
                "storage_error",
                &format!("Storage error: {e}"),
            )
        }
    }
}

pub fn api_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .merge(observations::observation_routes())
}
