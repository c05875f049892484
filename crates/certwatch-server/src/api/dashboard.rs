use crate::state::AppState;
use crate::view::html::{html_escape, render_dashboard};
use crate::view::status_rows;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use chrono::Utc;

// GET /
pub async fn dashboard(State(state): State<AppState>) -> Response {
    match state.store.list_by_urgency() {
        Ok(observations) => {
            let rows = status_rows(observations);
            Html(render_dashboard(&rows, Utc::now())).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Dashboard could not read the store");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(store_error_page(&e.to_string())),
            )
                .into_response()
        }
    }
}

fn store_error_page(detail: &str) -> String {
    format!(
        "<!DOCTYPE html><html><body><h1>Certificate store unavailable</h1><p>{}</p></body></html>",
        html_escape(detail)
    )
}
