// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use maestra_store::{DeleteMode, Entity, EntityFilter};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct ListEntitiesQuery {
    #[serde(rename = "type")]
    pub type_id: Option<Uuid>,
    #[serde(rename = "parent")]
    pub parent_id: Option<Uuid>,
    pub tag: Option<String>,
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListEntitiesQuery>,
) -> Result<Json<Vec<Entity>>, ApiError> {
    let filter = EntityFilter {
        type_id: query.type_id,
        parent_id: query.parent_id,
        tag: query.tag,
        search: query.search,
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(Entity::list(&filter, &state.pool).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateEntityRequest {
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub type_id: Uuid,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub state: Value,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
    pub device_id: Option<Uuid>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateEntityRequest>,
) -> Result<(StatusCode, Json<Entity>), ApiError> {
    let entity = state
        .state_engine
        .create_entity(
            &body.name,
            &body.slug,
            body.type_id,
            body.parent_id,
            body.state,
            body.description.as_deref(),
            body.tags,
            body.metadata,
            body.device_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

#[derive(Debug, Deserialize)]
pub struct IncludeChildrenQuery {
    #[serde(default)]
    pub include_children: bool,
}

async fn entity_with_children(entity: Entity, include_children: bool, state: &AppState) -> Result<Value, ApiError> {
    if !include_children {
        return Ok(serde_json::to_value(entity).unwrap_or(Value::Null));
    }
    let children = entity.descendants(1, &state.pool).await?;
    let mut value = serde_json::to_value(entity).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("children".to_string(), serde_json::to_value(children).unwrap_or(Value::Null));
    }
    Ok(value)
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<IncludeChildrenQuery>,
) -> Result<Json<Value>, ApiError> {
    let entity = Entity::find_by_id(id, &state.pool).await?;
    Ok(Json(entity_with_children(entity, query.include_children, &state).await?))
}

pub async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<IncludeChildrenQuery>,
) -> Result<Json<Value>, ApiError> {
    let entity = Entity::find_by_slug(&slug, &state.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("entity not found: {slug}")))?;
    Ok(Json(entity_with_children(entity, query.include_children, &state).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntityRequest {
    pub name: Option<String>,
    pub parent_id: Option<Option<Uuid>>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Value>,
    pub status: Option<String>,
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateEntityRequest>,
) -> Result<Json<Entity>, ApiError> {
    let mut entity = Entity::find_by_id(id, &state.pool).await?;
    if let Some(new_parent) = body.parent_id {
        entity = entity.reparent(new_parent, &state.pool).await?;
    }
    if body.name.is_some() || body.description.is_some() || body.tags.is_some() || body.metadata.is_some() || body.status.is_some() {
        let metadata = body.metadata.unwrap_or_else(|| entity.metadata.0.clone());
        entity = entity.put_metadata(metadata, &state.pool).await?;
    }
    Ok(Json(entity))
}

#[derive(Debug, Deserialize)]
pub struct DeleteEntityQuery {
    #[serde(default)]
    pub cascade: bool,
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteEntityQuery>,
) -> Result<Json<Value>, ApiError> {
    let mode = if query.cascade { DeleteMode::Cascade } else { DeleteMode::Orphan };
    state.state_engine.delete_entity(id, mode).await?;
    Ok(Json(json!({ "deleted": id })))
}

pub async fn ancestors(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<Entity>>, ApiError> {
    let entity = Entity::find_by_id(id, &state.pool).await?;
    Ok(Json(entity.ancestors(&state.pool).await?))
}

#[derive(Debug, Deserialize)]
pub struct DescendantsQuery {
    pub max_depth: Option<u32>,
}

pub async fn descendants(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DescendantsQuery>,
) -> Result<Json<Vec<Entity>>, ApiError> {
    let entity = Entity::find_by_id(id, &state.pool).await?;
    Ok(Json(entity.descendants(query.max_depth.unwrap_or(10), &state.pool).await?))
}

pub async fn siblings(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<Entity>>, ApiError> {
    let entity = Entity::find_by_id(id, &state.pool).await?;
    Ok(Json(entity.siblings(&state.pool).await?))
}

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    pub root_id: Option<Uuid>,
    pub entity_type: Option<Uuid>,
    pub max_depth: Option<u32>,
}

/// `GET /entities/tree` — a flat list of entities under `root_id` (or
/// every entity in the installation, if absent), filtered by type and
/// depth. The caller reconstructs the tree client-side from
/// `parent_id`, the same shape the listing and descendants endpoints
/// already hand back.
pub async fn tree(State(state): State<AppState>, Query(query): Query<TreeQuery>) -> Result<Json<Vec<Entity>>, ApiError> {
    let mut out = match query.root_id {
        Some(root_id) => {
            let root = Entity::find_by_id(root_id, &state.pool).await?;
            let descendants = root.descendants(query.max_depth.unwrap_or(10), &state.pool).await?;
            let mut out = vec![root];
            out.extend(descendants);
            out
        }
        None => {
            let filter = EntityFilter { limit: i64::from(u16::MAX), ..EntityFilter::default() };
            Entity::list(&filter, &state.pool).await?
        }
    };
    if let Some(type_id) = query.entity_type {
        out.retain(|e| e.type_id == type_id);
    }
    Ok(Json(out))
}
