//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::{extract::State, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::error::AppResult;

pub use routes::{create_router, AppState};

/// Build the full application router
///
/// Layers run outermost first: logging, then identity extraction, then the
/// handler.
pub fn build_app(state: AppState) -> Router {
    let api_routes = create_router()
        .layer(axum::middleware::from_fn(middleware::identity_middleware))
        .layer(axum::middleware::from_fn(middleware::logging_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> AppResult<&'static str> {
    state.store.health_check().await?;
    Ok("OK")
}
