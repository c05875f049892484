use crate::state::AppState;
use crate::{api, logging};
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "certwatch API",
        description = "TLS certificate expiry status",
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Observations", description = "Certificate observations")
    )
)]
struct ApiDoc;

pub fn build_http_app(state: AppState) -> Router {
    let (api_router, api_spec) = api::api_routes().split_for_parts();

    let mut spec = ApiDoc::openapi();
    spec.merge(api_spec);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(api::dashboard::dashboard))
        .merge(api_router)
        .merge(SwaggerUi::new("/docs").url("/docs/openapi.json", spec))
        .layer(middleware::from_fn(logging::request_logging))
        .layer(cors)
        .with_state(state)
}
