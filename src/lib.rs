pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::handlers::{health, upload, videos};
use crate::api::middleware::request_id::{REQUEST_ID_HEADER, request_id_middleware};
use crate::config::RelayConfig;
use crate::services::orchestrator::UploadOrchestrator;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Room for multipart boundaries and the text fields on top of the file itself
const MULTIPART_OVERHEAD: u64 = 10 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_video,
        api::handlers::videos::lookup_video,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            models::UploadVideoForm,
            models::UploadResponse,
            models::LookupRequest,
            models::ErrorResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "videos", description = "Relay uploads to Streamable and look up videos"),
        (name = "system", description = "Health endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<UploadOrchestrator>,
    pub config: Arc<RelayConfig>,
}

fn cors_layer(config: &RelayConfig) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([REQUEST_ID_HEADER.clone()])
}

pub fn create_app(state: AppState) -> Router {
    let body_limit =
        usize::try_from(state.config.max_file_size + MULTIPART_OVERHEAD).unwrap_or(usize::MAX);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .route(
            "/api/upload",
            post(upload::upload_video).fallback(upload::upload_method_not_allowed),
        )
        .route(
            "/api/videos",
            post(videos::lookup_video).fallback(videos::videos_method_not_allowed),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(&REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    tracing::info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        .layer(from_fn(request_id_middleware))
        .layer(cors_layer(&state.config))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
