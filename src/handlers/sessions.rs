use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::session::{self, SessionStarted, SessionView, StartSession, ToolReply};
use crate::state::AppState;

// POST /api/sessions
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartSession>>,
) -> Result<(StatusCode, Json<SessionStarted>), AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let started = session::start_session(&state, req).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(session::view_session(&state, &id).await?))
}

// POST /api/sessions/:id/tools/:tool
#[derive(Debug, Default, Deserialize)]
pub struct ToolRequest {
    pub value: Option<String>,
}

pub async fn invoke_tool(
    State(state): State<Arc<AppState>>,
    Path((id, tool)): Path<(String, String)>,
    body: Option<Json<ToolRequest>>,
) -> Result<Json<ToolReply>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    Ok(Json(session::invoke_tool(&state, &id, &tool, req.value).await?))
}

// DELETE /api/sessions/:id
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    session::end_session(&state, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
