// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use maestra_store::Device;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    pub name: String,
    pub device_type: String,
    pub hardware_id: String,
    pub firmware_version: Option<String>,
    pub ip_address: Option<String>,
    #[serde(default)]
    pub location: Value,
    #[serde(default)]
    pub metadata: Value,
}

/// `POST /devices/register` — 201, or 409 on a duplicate `hardware_id`.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterDeviceRequest>,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    let device = Device::register(
        &body.name,
        &body.device_type,
        &body.hardware_id,
        body.firmware_version.as_deref(),
        body.ip_address.as_deref(),
        body.location,
        body.metadata,
        &state.pool,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(device)))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatDeviceRequest {
    pub hardware_id: String,
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Json(body): Json<HeartbeatDeviceRequest>,
) -> Result<Json<Device>, ApiError> {
    let device = Device::heartbeat(&body.hardware_id, &state.pool).await?;
    Ok(Json(device))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Device>>, ApiError> {
    Ok(Json(Device::list_all(&state.pool).await?))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Device>, ApiError> {
    Ok(Json(Device::find_by_id(id, &state.pool).await?))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    Device::delete(id, &state.pool).await?;
    Ok(Json(json!({ "deleted": id })))
}
