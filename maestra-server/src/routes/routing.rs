// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use maestra_bus::Envelope;
use maestra_store::{Route, RoutingDevice, RoutePreset};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn state(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let devices = RoutingDevice::list_all(&state.pool).await?;
    let routes = Route::list_active(&state.pool).await?;
    let presets = RoutePreset::list_all(&state.pool).await?;
    Ok(Json(json!({ "devices": devices, "routes": routes, "presets": presets })))
}

#[derive(Debug, Deserialize)]
pub struct CreateRoutingDeviceRequest {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

pub async fn create_device(
    State(state): State<AppState>,
    Json(body): Json<CreateRoutingDeviceRequest>,
) -> Result<(StatusCode, Json<RoutingDevice>), ApiError> {
    let device = RoutingDevice::create(&body.name, body.inputs, body.outputs, &state.pool).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

pub async fn list_devices(State(state): State<AppState>) -> Result<Json<Vec<RoutingDevice>>, ApiError> {
    Ok(Json(RoutingDevice::list_all(&state.pool).await?))
}

pub async fn delete_device(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    RoutingDevice::delete(id, &state.pool).await?;
    Ok(Json(json!({ "deleted": id })))
}

#[derive(Debug, Deserialize)]
pub struct CreateRouteRequest {
    pub from_device: Uuid,
    pub from_port: String,
    pub to_device: Uuid,
    pub to_port: String,
}

pub async fn create_route(
    State(state): State<AppState>,
    Json(body): Json<CreateRouteRequest>,
) -> Result<(StatusCode, Json<Route>), ApiError> {
    let route = Route::create_active(body.from_device, &body.from_port, body.to_device, &body.to_port, &state.pool).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

pub async fn list_routes(State(state): State<AppState>) -> Result<Json<Vec<Route>>, ApiError> {
    Ok(Json(Route::list_active(&state.pool).await?))
}

pub async fn delete_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    Route::delete(id, &state.pool).await?;
    Ok(Json(json!({ "deleted": id })))
}

#[derive(Debug, Deserialize)]
pub struct CreatePresetRequest {
    pub name: String,
}

pub async fn create_preset(
    State(state): State<AppState>,
    Json(body): Json<CreatePresetRequest>,
) -> Result<(StatusCode, Json<RoutePreset>), ApiError> {
    let preset = RoutePreset::create(&body.name, &state.pool).await?;
    Ok((StatusCode::CREATED, Json(preset)))
}

pub async fn list_presets(State(state): State<AppState>) -> Result<Json<Vec<RoutePreset>>, ApiError> {
    Ok(Json(RoutePreset::list_all(&state.pool).await?))
}

pub async fn delete_preset(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    RoutePreset::delete(id, &state.pool).await?;
    Ok(Json(json!({ "deleted": id })))
}

pub async fn save_preset(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<Route>>, ApiError> {
    let preset = RoutePreset::find_by_id(id, &state.pool).await?;
    Ok(Json(preset.save_current_patch(&state.pool).await?))
}

/// `POST /routing/presets/{id}/recall` — swaps in the preset's saved
/// patch as the active one and emits a single `routing_preset_recalled`
/// event carrying the whole new active set, rather than one event per
/// route changed.
pub async fn recall_preset(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<Route>>, ApiError> {
    let preset = RoutePreset::find_by_id(id, &state.pool).await?;
    let routes = preset.recall(&state.pool).await?;

    let payload = json!({
        "type": "routing_preset_recalled",
        "preset_id": preset.id,
        "preset_name": preset.name,
        "routes": routes,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    });
    let bytes = Bytes::from(payload.to_string());
    state.bus.publish_subject(Envelope::new("maestra.routing.preset_recalled", bytes.clone())).await;
    state.bus.publish_topic(Envelope::new("maestra/routing/preset_recalled", bytes)).await;

    Ok(Json(routes))
}
