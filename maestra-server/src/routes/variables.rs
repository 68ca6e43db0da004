// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! `metadata.variables` CRUD. Every write here goes through
//! `Entity::put_metadata`, never touching `state` or firing a
//! state-change event — a variable definition describes the shape of
//! state, it isn't state itself.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use maestra_engine::{ValidationResult, VariableDefinition, VariableDefinitions};
use maestra_store::Entity;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

fn variables_of(entity: &Entity) -> VariableDefinitions {
    VariableDefinitions::from_metadata(&entity.metadata.0)
}

async fn write_variables(entity: &Entity, vars: VariableDefinitions, state: &AppState) -> Result<Entity, ApiError> {
    let mut metadata = entity.metadata.0.clone();
    let vars_value = serde_json::to_value(vars).unwrap_or_else(|_| json!({"inputs": [], "outputs": []}));
    match metadata.as_object_mut() {
        Some(map) => {
            map.insert("variables".to_string(), vars_value);
        }
        None => metadata = json!({ "variables": vars_value }),
    }
    Ok(entity.put_metadata(metadata, &state.pool).await?)
}

pub async fn list(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<VariableDefinitions>, ApiError> {
    let entity = Entity::find_by_id(id, &state.pool).await?;
    Ok(Json(variables_of(&entity)))
}

pub async fn replace_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<VariableDefinitions>,
) -> Result<Json<VariableDefinitions>, ApiError> {
    let entity = Entity::find_by_id(id, &state.pool).await?;
    write_variables(&entity, body, &state).await?;
    let updated = Entity::find_by_id(id, &state.pool).await?;
    Ok(Json(variables_of(&updated)))
}

pub async fn upsert(
    State(state): State<AppState>,
    Path((id, name)): Path<(Uuid, String)>,
    Json(mut body): Json<VariableDefinition>,
) -> Result<(StatusCode, Json<VariableDefinition>), ApiError> {
    body.name = name;
    let entity = Entity::find_by_id(id, &state.pool).await?;
    let mut vars = variables_of(&entity);
    let target = match body.direction {
        maestra_engine::Direction::Input => &mut vars.inputs,
        maestra_engine::Direction::Output => &mut vars.outputs,
    };
    target.retain(|existing| existing.name != body.name);
    target.push(body.clone());
    write_variables(&entity, vars, &state).await?;
    Ok((StatusCode::OK, Json(body)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((id, name)): Path<(Uuid, String)>,
) -> Result<Json<Value>, ApiError> {
    let entity = Entity::find_by_id(id, &state.pool).await?;
    let mut vars = variables_of(&entity);
    vars.inputs.retain(|v| v.name != name);
    vars.outputs.retain(|v| v.name != name);
    write_variables(&entity, vars, &state).await?;
    Ok(Json(json!({ "deleted": name })))
}

pub async fn validate(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ValidationResult>, ApiError> {
    Ok(Json(state.state_engine.validate_variables(id).await?))
}
