// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListStreamsQuery {
    pub stream_type: Option<String>,
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListStreamsQuery>) -> Json<Vec<Value>> {
    Json(state.registry.list(query.stream_type.as_deref()))
}

#[derive(Debug, Deserialize)]
pub struct AdvertiseRequest {
    pub name: String,
    pub stream_type: String,
    pub publisher_id: String,
    pub protocol: String,
    pub address: String,
    pub port: u16,
    pub entity_id: Option<Uuid>,
    pub device_id: Option<Uuid>,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub metadata: Value,
}

pub async fn advertise(State(state): State<AppState>, Json(body): Json<AdvertiseRequest>) -> Result<Json<Value>, ApiError> {
    let stream_id = state
        .registry
        .advertise(
            &body.name,
            &body.stream_type,
            &body.publisher_id,
            &body.protocol,
            &body.address,
            body.port,
            body.entity_id,
            body.device_id,
            body.config,
            body.metadata,
        )
        .await?;
    Ok(Json(json!({ "stream_id": stream_id })))
}

pub async fn withdraw(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    state.registry.withdraw(&id).await?;
    Ok(Json(json!({ "withdrawn": id })))
}

pub async fn heartbeat(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    state.registry.heartbeat(&id).await?;
    Ok(Json(json!({ "stream_id": id, "status": "ok" })))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.registry.get(&id)?))
}

#[derive(Debug, Deserialize)]
pub struct RequestStreamRequest {
    pub protocol: String,
    pub consumer_id: String,
}

pub async fn request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RequestStreamRequest>,
) -> Result<Json<Value>, ApiError> {
    let record = state.registry.get(&id)?;
    let stream_name = record.get("name").and_then(Value::as_str).unwrap_or_default();
    let stream_type = record.get("stream_type").and_then(Value::as_str).unwrap_or_default();
    let offer = state
        .negotiator
        .request_session(&id, stream_name, stream_type, &body.protocol, &body.consumer_id)
        .await?;
    Ok(Json(json!({
        "session_id": offer.session_id,
        "stream_id": offer.stream_id,
        "stream_name": offer.stream_name,
        "stream_type": offer.stream_type,
        "protocol": offer.protocol,
        "publisher_address": offer.publisher_address,
        "publisher_port": offer.publisher_port,
        "transport_config": offer.transport_config,
    })))
}

/// `GET /streams/{id}/preview` — the SSE proxy. Headers ask any
/// intermediary (nginx's default buffering, in particular) to pass
/// chunks straight through rather than coalescing them.
pub async fn preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> (
    [(header::HeaderName, &'static str); 2],
    Sse<impl futures::Stream<Item = Result<Event, Infallible>>>,
) {
    let events = maestra_preview::preview_stream(state.registry.clone(), state.negotiator.clone(), id)
        .map(|event| Ok(Event::default().event(event.name).data(event.data.to_string())));
    let headers = [
        (header::CACHE_CONTROL, "no-cache"),
        (header::HeaderName::from_static("x-accel-buffering"), "no"),
    ];
    (headers, Sse::new(events).keep_alive(KeepAlive::default()))
}
