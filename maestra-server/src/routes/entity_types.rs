// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use maestra_store::EntityType;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateEntityTypeRequest {
    pub name: String,
    pub display_name: String,
    pub icon: Option<String>,
    #[serde(default)]
    pub default_state: Value,
    pub state_schema: Option<Value>,
    #[serde(default)]
    pub metadata: Value,
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateEntityTypeRequest>,
) -> Result<(StatusCode, Json<EntityType>), ApiError> {
    let entity_type = EntityType::create(
        &body.name,
        &body.display_name,
        body.icon.as_deref(),
        body.default_state,
        body.state_schema,
        body.metadata,
        &state.pool,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(entity_type)))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<EntityType>>, ApiError> {
    Ok(Json(EntityType::list_all(&state.pool).await?))
}

pub async fn get_by_id(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<EntityType>, ApiError> {
    Ok(Json(EntityType::find_by_id(id, &state.pool).await?))
}

pub async fn get_by_name(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<EntityType>, ApiError> {
    EntityType::find_by_name(&name, &state.pool)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("entity_type not found: {name}")))
}
