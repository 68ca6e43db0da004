// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use axum::extract::{Path, Query, State};
use axum::Json;
use maestra_store::SessionHistoryRow;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub stream_id: Option<String>,
}

fn sessions_for_stream(state: &AppState, stream_id: &str) -> Vec<Value> {
    state
        .registry
        .indices()
        .members(&format!("sessions:by_stream:{stream_id}"))
        .into_iter()
        .filter_map(|key| state.registry.store().hget(&key))
        .collect()
}

/// `GET /streams/sessions` — live sessions read straight out of the
/// ephemeral index; `stream_id` narrows to one stream's sessions. With
/// no `stream_id`, unions the per-stream session indices across every
/// currently live stream (there is no separate "all sessions" index).
pub async fn list(State(state): State<AppState>, Query(query): Query<ListSessionsQuery>) -> Json<Vec<Value>> {
    match &query.stream_id {
        Some(stream_id) => Json(sessions_for_stream(&state, stream_id)),
        None => {
            let mut sessions = Vec::new();
            for stream in state.registry.list(None) {
                let Some(stream_id) = stream.get("id").and_then(Value::as_str) else { continue };
                sessions.extend(sessions_for_stream(&state, stream_id));
            }
            Json(sessions)
        }
    }
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct SessionHistoryQuery {
    pub stream_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<SessionHistoryQuery>,
) -> Result<Json<Vec<SessionHistoryRow>>, ApiError> {
    Ok(Json(SessionHistoryRow::list_history(query.stream_id, query.limit, &state.pool).await?))
}

pub async fn stop(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    state.negotiator.stop_session(&id, None, None).await?;
    Ok(Json(json!({ "stopped": id })))
}

pub async fn heartbeat(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    state.negotiator.heartbeat_session(&id).await?;
    Ok(Json(json!({ "session_id": id, "status": "ok" })))
}
