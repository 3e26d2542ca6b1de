use crate::detect::detect_mission_id;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use recon_persist::MessageRole;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub conversation_id: Option<i64>,
    pub mission_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTitleRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// RAG-powered chat endpoint. Creates or loads the conversation, saves
/// both messages, and scopes retrieval to a mission when one is named
/// explicitly or detected in the query text.
pub async fn ask_question(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query cannot be empty".to_string()));
    }

    // Scope priority: explicit selection, then smart detection.
    let requested_mission = req.mission_id.or_else(|| detect_mission_id(&req.query));

    // Resolve to the mission's conversation; an unknown id falls back to
    // an unscoped search rather than an error.
    let rag_scope = match requested_mission {
        Some(id) => state
            .persist
            .missions()
            .find_by_conversation(id)
            .await?
            .map(|mission| mission.conversation_id),
        None => None,
    };

    let conversation = match req.conversation_id {
        Some(id) => state
            .persist
            .conversations()
            .get(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("conversation {}", id)))?,
        None => state.persist.conversations().create().await?,
    };

    state
        .persist
        .messages()
        .save(conversation.id, MessageRole::User, &req.query)
        .await?;

    let answer = state.rag.ask(&req.query, rag_scope).await?;

    state
        .persist
        .messages()
        .save(conversation.id, MessageRole::Assistant, &answer.answer)
        .await?;

    state
        .persist
        .conversations()
        .ensure_title(conversation.id, &req.query)
        .await?;
    let title = state
        .persist
        .conversations()
        .get(conversation.id)
        .await?
        .and_then(|c| c.title);

    Ok(Json(json!({
        "query": req.query,
        "conversation_id": conversation.id,
        "title": title,
        "mission_id": rag_scope,
        "response": answer.answer,
        "sources": answer.sources,
        "status": "success",
    })))
}

/// List conversations with metadata.
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    let conversations = state.persist.conversations().list(query.limit).await?;

    let mut result = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let message_count = state.persist.messages().count(conversation.id).await?;
        result.push(json!({
            "id": conversation.id,
            "title": conversation.title,
            "created_at": conversation.created_at.to_rfc3339(),
            "updated_at": conversation.updated_at.to_rfc3339(),
            "message_count": message_count,
        }));
    }
    Ok(Json(result))
}

/// A conversation with its full message history.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let conversation = state
        .persist
        .conversations()
        .get(conversation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("conversation {}", conversation_id)))?;

    let messages = state.persist.messages().list(conversation_id).await?;

    Ok(Json(json!({
        "id": conversation.id,
        "title": conversation.title,
        "created_at": conversation.created_at.to_rfc3339(),
        "updated_at": conversation.updated_at.to_rfc3339(),
        "messages": messages
            .into_iter()
            .map(|msg| json!({
                "id": msg.id,
                "role": msg.role.to_string(),
                "content": msg.content,
                "timestamp": msg.created_at.to_rfc3339(),
            }))
            .collect::<Vec<_>>(),
    })))
}

/// Delete a conversation and its history.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted = state.persist.conversations().delete(conversation_id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("conversation {}", conversation_id)));
    }
    Ok(Json(json!({
        "status": "success",
        "message": format!("Conversation {} deleted", conversation_id),
    })))
}

/// Rename a conversation.
pub async fn update_title(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Json(req): Json<UpdateTitleRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let conversation = state
        .persist
        .conversations()
        .update_title(conversation_id, &req.title)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("conversation {}", conversation_id)))?;

    Ok(Json(json!({
        "id": conversation.id,
        "title": conversation.title,
        "updated_at": conversation.updated_at.to_rfc3339(),
    })))
}

/// All missions, newest first, with display titles for the picker.
pub async fn list_missions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    let missions = state.persist.missions().list_recent(query.limit).await?;

    Ok(Json(
        missions
            .into_iter()
            .map(|mission| {
                let title = display_title(&mission.query, mission.conversation_id);
                json!({
                    "id": mission.id,
                    "conversation_id": mission.conversation_id,
                    "query": mission.query,
                    "title": title,
                    "status": mission.status.to_string(),
                    "created_at": mission.created_at.to_rfc3339(),
                })
            })
            .collect(),
    ))
}

fn display_title(query: &str, conversation_id: i64) -> String {
    if query.is_empty() {
        return format!("Mission {}", conversation_id);
    }
    if query.chars().count() <= 60 {
        return query.to_string();
    }
    let head: String = query.chars().take(57).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_title_truncates_at_60() {
        assert_eq!(display_title("short query", 1), "short query");
        let long = "q".repeat(100);
        let title = display_title(&long, 1);
        assert_eq!(title.chars().count(), 60);
        assert!(title.ends_with("..."));
        assert_eq!(display_title("", 9), "Mission 9");
    }
}
