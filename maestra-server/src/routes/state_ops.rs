// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! `/entities/{id}/state` and the cross-entity bulk operations. Bulk
//! update deliberately loops `StateEngine::patch_state` per slug rather
//! than batching into a single multi-entity transaction: each per-slug
//! patch already merges, records history, and fans out atomically, and
//! nothing in the request ever short-circuits on one slug's failure.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use maestra_store::Entity;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PathsQuery {
    #[serde(default)]
    pub paths: Vec<String>,
}

pub async fn get_state(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PathsQuery>,
) -> Result<Json<Value>, ApiError> {
    let paths = (!query.paths.is_empty()).then_some(query.paths.as_slice());
    Ok(Json(state.state_engine.get_state(id, paths).await?))
}

pub async fn patch_state(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<Entity>, ApiError> {
    let source = body.get("source").and_then(Value::as_str).map(str::to_string);
    let patch = body.get("state").cloned().unwrap_or(body);
    let entity = state.state_engine.patch_state(id, patch, source.as_deref()).await?;
    Ok(Json(entity))
}

pub async fn put_state(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<Entity>, ApiError> {
    let source = body.get("source").and_then(Value::as_str).map(str::to_string);
    let new_state = body.get("state").cloned().unwrap_or(body);
    let entity = state.state_engine.put_state(id, new_state, source.as_deref()).await?;
    Ok(Json(entity))
}

#[derive(Debug, Deserialize)]
pub struct BulkGetRequest {
    pub slugs: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
}

pub async fn bulk_get(
    State(state): State<AppState>,
    Json(body): Json<BulkGetRequest>,
) -> Result<Json<Value>, ApiError> {
    let paths = (!body.paths.is_empty()).then_some(body.paths.as_slice());
    let mut out = serde_json::Map::new();
    for slug in body.slugs {
        let result = match Entity::find_by_slug(&slug, &state.pool).await? {
            Some(entity) => state.state_engine.get_state(entity.id, paths).await?,
            None => Value::Null,
        };
        out.insert(slug, result);
    }
    Ok(Json(Value::Object(out)))
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub updates: HashMap<String, Value>,
    pub source: Option<String>,
}

/// `POST /entities/state/bulk-update` — never short-circuits: every slug
/// in `updates` gets a `status` in the response whether or not it
/// resolved, even if an earlier slug in the map failed to resolve.
pub async fn bulk_update(
    State(state): State<AppState>,
    Json(body): Json<BulkUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut results = serde_json::Map::new();
    for (slug, patch) in body.updates {
        match Entity::find_by_slug(&slug, &state.pool).await? {
            Some(entity) => {
                state.state_engine.patch_state(entity.id, patch, body.source.as_deref()).await?;
                results.insert(slug, json!({ "status": "updated" }));
            }
            None => {
                results.insert(slug, json!({ "status": "not_found" }));
            }
        }
    }
    Ok(Json(Value::Object(results)))
}
