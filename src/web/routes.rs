use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// REST API for the question-answering pipeline
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Default (single-call) pipeline
            .route("/nl-to-sql", post(handlers::api::ask))
            // Chain-based variant and the diagnostic comparison
            .route("/nl-to-sql/langchain", post(handlers::api::ask_langchain))
            .route("/nl-to-sql/compare", post(handlers::api::compare))
            // Connectivity health
            .route("/nl-to-sql/health", get(handlers::api::health)),
    )
}
