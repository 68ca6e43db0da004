// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use axum::extract::State;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use maestra_store::{Device, Entity};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "maestra-server",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub async fn status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let devices = Device::count(&state.pool).await?;
    let entities = Entity::count(&state.pool).await?;
    Ok(Json(json!({
        "devices": devices,
        "entities": entities,
        "bus_connected": true,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })))
}
