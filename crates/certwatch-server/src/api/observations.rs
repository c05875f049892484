use crate::api::{error_response, success_response, ApiError};
use crate::cert::reconciler::{HostFailure, ReconcileReport};
use crate::logging::TraceId;
use crate::state::AppState;
use crate::view::{status_rows, StatusRow, UrgencySummary};
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use certwatch_common::Observation;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Stored certificate observation for one host
#[derive(Debug, Serialize, ToSchema)]
pub struct ObservationView {
    /// Monitored hostname
    pub domain: String,
    /// Certificate not-after date (YYYY-MM-DD)
    pub expiry_date: String,
    /// Whole days until expiry; negative once expired
    pub days_left: i64,
    /// Time of the last successful probe (YYYY-MM-DD HH:MM:SS, UTC)
    pub last_checked: String,
    /// critical | warning | healthy
    pub urgency: String,
}

impl From<&StatusRow> for ObservationView {
    fn from(row: &StatusRow) -> Self {
        let obs = &row.observation;
        Self {
            domain: obs.domain.clone(),
            expiry_date: obs.expiry_date.format("%Y-%m-%d").to_string(),
            days_left: obs.days_left,
            last_checked: obs.last_checked.format("%Y-%m-%d %H:%M:%S").to_string(),
            urgency: row.urgency.to_string(),
        }
    }
}

impl From<&Observation> for ObservationView {
    fn from(obs: &Observation) -> Self {
        let row = StatusRow {
            urgency: obs.urgency(),
            observation: obs.clone(),
        };
        Self::from(&row)
    }
}

/// Urgency-ordered observations with per-tier counts
#[derive(Serialize, ToSchema)]
struct ObservationList {
    items: Vec<ObservationView>,
    critical: usize,
    warning: usize,
    healthy: usize,
}

/// One host that produced no update during a reconciliation run
#[derive(Debug, Serialize, ToSchema)]
pub struct FailureView {
    pub host: String,
    /// ConnectionError | TimeoutError | HandshakeError | CertificateParseError | StorageError | TaskAborted
    pub kind: String,
    pub cause: String,
}

impl From<&HostFailure> for FailureView {
    fn from(f: &HostFailure) -> Self {
        Self {
            host: f.host.clone(),
            kind: f.error.kind().to_string(),
            cause: f.error.to_string(),
        }
    }
}

/// Result of a reconciliation run
#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileSummary {
    pub checked: usize,
    pub updated: Vec<ObservationView>,
    pub failures: Vec<FailureView>,
}

impl From<&ReconcileReport> for ReconcileSummary {
    fn from(report: &ReconcileReport) -> Self {
        Self {
            checked: report.checked,
            updated: report.updated.iter().map(ObservationView::from).collect(),
            failures: report.failures.iter().map(FailureView::from).collect(),
        }
    }
}

/// Lists every stored observation, most urgent first.
#[utoipa::path(
    get,
    path = "/v1/observations",
    tag = "Observations",
    responses(
        (status = 200, description = "Observations ordered by days left", body = ObservationList),
        (status = 500, description = "Observation store unavailable", body = ApiError)
    )
)]
async fn list_observations(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.list_by_urgency() {
        Ok(observations) => {
            let rows = status_rows(observations);
            let summary = UrgencySummary::from_rows(&rows);
            success_response(
                StatusCode::OK,
                &trace_id,
                ObservationList {
                    items: rows.iter().map(ObservationView::from).collect(),
                    critical: summary.critical,
                    warning: summary.warning,
                    healthy: summary.healthy,
                },
            )
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &trace_id,
            "storage_error",
            &format!("Storage error: {e}"),
        ),
    }
}

/// Returns the observation for one host.
#[utoipa::path(
    get,
    path = "/v1/observations/{domain}",
    tag = "Observations",
    params(("domain" = String, Path, description = "Monitored hostname")),
    responses(
        (status = 200, description = "Current observation", body = ObservationView),
        (status = 404, description = "Host never probed successfully", body = ApiError),
        (status = 500, description = "Observation store unavailable", body = ApiError)
    )
)]
async fn get_observation(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&domain) {
        Ok(Some(obs)) => success_response(StatusCode::OK, &trace_id, ObservationView::from(&obs)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("No observation for '{domain}'"),
        ),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &trace_id,
            "storage_error",
            &format!("Storage error: {e}"),
        ),
    }
}

/// Probes every configured target now and stores the successes.
#[utoipa::path(
    post,
    path = "/v1/reconcile",
    tag = "Observations",
    responses(
        (status = 200, description = "Run finished; per-host failures are listed, not fatal", body = ReconcileSummary)
    )
)]
async fn trigger_reconcile(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let report = state.reconciler.reconcile(&state.hosts, Utc::now()).await;
    success_response(StatusCode::OK, &trace_id, ReconcileSummary::from(&report))
}

pub fn observation_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_observations))
        .routes(routes!(get_observation))
        .routes(routes!(trigger_reconcile))
}
