pub mod config;
pub mod datetime;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/status", get(handlers::health::get_status))
        .route("/api/sessions", post(handlers::sessions::start_session))
        .route(
            "/api/sessions/:id",
            get(handlers::sessions::get_session).delete(handlers::sessions::end_session),
        )
        .route(
            "/api/sessions/:id/tools/:tool",
            post(handlers::sessions::invoke_tool),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
