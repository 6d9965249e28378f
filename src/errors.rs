use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::config::ConfigError;
use crate::db::StoreError;
use crate::services::booking::SessionError;
use crate::services::providers::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("worker at capacity ({0} active sessions)")]
    AtCapacity(usize),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Provider(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Store(_) => StatusCode::BAD_GATEWAY,
            AppError::Session(SessionError::UnknownTool(_)) => StatusCode::NOT_FOUND,
            AppError::Session(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AtCapacity(_) => StatusCode::TOO_MANY_REQUESTS,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
