use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::models::AgentVariant;
use crate::state::AppState;

pub async fn health() -> &'static str {
    "ok"
}

// GET /api/status
#[derive(Serialize)]
pub struct StatusResponse {
    variant: AgentVariant,
    env: String,
    profile: String,
    active_sessions: usize,
    max_jobs: usize,
    load: f64,
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        variant: state.config.agent_variant,
        env: state.config.env_tag.clone(),
        profile: state.resolver.profile().to_string(),
        active_sessions: state.active_sessions().await,
        max_jobs: state.config.max_jobs,
        load: state.load().await,
    })
}
