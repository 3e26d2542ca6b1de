use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use recon_agent::MissionError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Persistence error: {0}")]
    Persist(#[from] recon_persist::PersistError),

    #[error("Memory error: {0}")]
    Memory(#[from] recon_memory::MemoryError),

    #[error("Mission error: {0}")]
    Mission(#[from] MissionError),

    #[error("LLM error: {0}")]
    Llm(#[from] recon_llm::LlmError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Mission(MissionError::InvalidInput(ref msg)) => {
                (StatusCode::BAD_REQUEST, format!("Invalid input: {}", msg))
            }
            ApiError::Persist(ref e) => {
                tracing::error!("persistence error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
            ApiError::Memory(ref e) => {
                tracing::error!("memory error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            ApiError::Mission(ref e) => {
                tracing::error!("mission error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Llm(ref e) => {
                tracing::error!("llm error: {}", e);
                (StatusCode::BAD_GATEWAY, "Upstream model error".to_string())
            }
            ApiError::Internal(ref e) => {
                tracing::error!("internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
