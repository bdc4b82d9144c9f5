use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::server::handlers;
use crate::state::AppState;

/// The chat-surface boundary.
///
/// Per-request errors surface here as HTTP error responses; nothing past
/// this point can take down the serving loop.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/chat", post(handlers::chat))
        .route("/api/sessions/:session_id", delete(handlers::reset_session))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
