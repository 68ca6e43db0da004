// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! `POST /metrics`, `POST /metrics/batch`, `POST /events` — accept a raw
//! JSON body (or array of bodies) and store it to the durable sink
//! verbatim, with no shape validation beyond "valid JSON".

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use maestra_store::SinkRow;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn record_metric(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<SinkRow>), ApiError> {
    let row = SinkRow::insert_metric(payload, &state.pool).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn record_metrics_batch(
    State(state): State<AppState>,
    Json(payloads): Json<Vec<Value>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut rows = Vec::with_capacity(payloads.len());
    for payload in payloads {
        rows.push(SinkRow::insert_metric(payload, &state.pool).await?);
    }
    Ok((StatusCode::CREATED, Json(json!({ "inserted": rows.len(), "rows": rows }))))
}

pub async fn record_event(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<SinkRow>), ApiError> {
    let row = SinkRow::insert_event(payload, &state.pool).await?;
    Ok((StatusCode::CREATED, Json(row)))
}
