//! REST API using Axum
//!
//! Thin HTTP surface over `DiagnosticService`, mounted under `/api/v1`:
//! - `GET  /health`
//! - `GET  /equipment/:id/data-quality`
//! - `POST /equipment/:id/diagnose`
//! - `GET  /equipment/:id/sessions?limit=`

pub mod envelope;
pub mod handlers;

pub use handlers::AppState;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::diagnostics::DiagnosticService;

/// Request bodies are a few small fields.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Same-origin by default; `HVAC_PDM_CORS_ORIGINS` holds a comma-separated
/// allow list for development front ends.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    match std::env::var("HVAC_PDM_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins.split(',').filter_map(|o| o.trim().parse().ok()).collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/equipment/:id/data-quality", get(handlers::data_quality))
        .route("/equipment/:id/diagnose", post(handlers::diagnose))
        .route("/equipment/:id/sessions", get(handlers::sessions))
        .with_state(state)
}

pub fn create_app(service: DiagnosticService) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(AppState { service }))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer())
}
