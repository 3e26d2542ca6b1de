use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::Response;
use axum::Json;
use futures::StreamExt;
use recon_agent::{MissionError, TraceEntry};
use recon_llm::GenerateOptions;
use recon_tools::validate_mission_input;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Deserialize)]
pub struct MissionRequest {
    pub user_input: String,
    pub conversation_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub struct MissionResponse {
    pub status: &'static str,
    pub mission_id: Option<i64>,
    pub report: String,
    pub trace: Vec<TraceEntry>,
}

/// Analyze the objective without triggering any tool execution.
pub async fn analyze_mission(
    State(state): State<AppState>,
    Json(req): Json<MissionRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    validate_mission_input(&req.user_input).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let prompt = recon_agent::prompts::intent_prompt(&req.user_input);
    let intent = state.llm.generate(&prompt, &GenerateOptions::default()).await?;

    Ok(Json(json!({ "intent": intent })))
}

/// Full mission execution, buffered response.
pub async fn execute_mission(
    State(state): State<AppState>,
    Json(req): Json<MissionRequest>,
) -> ApiResult<Json<MissionResponse>> {
    match state
        .runner
        .run_buffered(&req.user_input, req.conversation_id)
        .await
    {
        Ok(outcome) => Ok(Json(MissionResponse {
            status: "complete",
            mission_id: Some(outcome.mission_id),
            report: outcome.report,
            trace: outcome.trace,
        })),
        Err(MissionError::InvalidInput(msg)) => Err(ApiError::BadRequest(msg)),
        Err(err) => Ok(Json(MissionResponse {
            status: "failed",
            mission_id: None,
            report: err.to_string(),
            trace: Vec::new(),
        })),
    }
}

/// Streaming mission execution: one JSON event per line (NDJSON).
///
/// Dropping the connection cancels the mission at its next checkpoint.
pub async fn execute_mission_stream(
    State(state): State<AppState>,
    Json(req): Json<MissionRequest>,
) -> ApiResult<Response> {
    validate_mission_input(&req.user_input).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let handle = state.runner.spawn(req.user_input, req.conversation_id);

    let body_stream = ReceiverStream::new(handle.events).map(|event| {
        let line = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok::<_, Infallible>(Bytes::from(line + "\n"))
    });

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body_stream))
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;

    Ok(response)
}

/// All mission logs, most recent first.
pub async fn get_reports(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    let logs = state.persist.missions().list_recent(query.limit).await?;
    Ok(Json(
        logs.into_iter()
            .map(|log| {
                json!({
                    "id": log.id,
                    "conversation_id": log.conversation_id,
                    "query": log.query,
                    "response": log.response,
                    "status": log.status.to_string(),
                    "created_at": log.created_at.to_rfc3339(),
                })
            })
            .collect(),
    ))
}

/// Mission statistics for the dashboard.
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let stats = state.persist.missions().stats().await?;
    Ok(Json(json!({
        "total_missions": stats.total_missions,
        "completed_missions": stats.completed_missions,
        "failed_missions": stats.failed_missions,
    })))
}
