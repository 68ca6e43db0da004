// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Annotations CRUD, the summary counts, and the four export endpoints.
//! CSV export is hand-rolled rather than pulled in from a dedicated
//! crate: every exported row collapses to a handful of scalar columns
//! plus one JSON blob column, which doesn't need a general CSV writer's
//! quoting/escaping machinery beyond what [`csv_escape`] already covers.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use maestra_store::{AnalyticsSummary, Annotation, SessionHistoryRow, SinkRow, StateHistoryRow};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAnnotationRequest {
    pub entity_id: Option<Uuid>,
    pub label: String,
    pub body: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

pub async fn create_annotation(
    State(state): State<AppState>,
    Json(body): Json<CreateAnnotationRequest>,
) -> Result<(StatusCode, Json<Annotation>), ApiError> {
    let annotation = Annotation::create(body.entity_id, &body.label, body.body.as_deref(), body.metadata, &state.pool).await?;
    Ok((StatusCode::CREATED, Json(annotation)))
}

pub async fn list_annotations(State(state): State<AppState>) -> Result<Json<Vec<Annotation>>, ApiError> {
    Ok(Json(Annotation::list_all(&state.pool).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAnnotationRequest {
    pub label: String,
    pub body: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

pub async fn update_annotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAnnotationRequest>,
) -> Result<Json<Annotation>, ApiError> {
    let annotation = Annotation::find_by_id(id, &state.pool).await?;
    let updated = annotation.update(&body.label, body.body.as_deref(), body.metadata, &state.pool).await?;
    Ok(Json(updated))
}

pub async fn delete_annotation(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    Annotation::delete(id, &state.pool).await?;
    Ok(Json(json!({ "deleted": id })))
}

pub async fn summary(State(state): State<AppState>) -> Result<Json<AnalyticsSummary>, ApiError> {
    Ok(Json(AnalyticsSummary::compute(&state.pool).await?))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

/// Quotes a CSV field per RFC 4180 whenever it contains a comma, quote,
/// or newline; doubles any embedded quotes.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_response(header_row: &[&str], rows: Vec<Vec<String>>, filename: &str) -> Response {
    let mut out = header_row.join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&row.iter().map(|f| csv_escape(f)).collect::<Vec<_>>().join(","));
        out.push('\n');
    }
    (
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, &format!("attachment; filename=\"{filename}.csv\"")),
        ],
        out,
    )
        .into_response()
}

pub async fn export_metrics(State(state): State<AppState>, Query(query): Query<ExportQuery>) -> Result<Response, ApiError> {
    let rows = SinkRow::export("metric", &state.pool).await?;
    Ok(match query.format {
        ExportFormat::Json => Json(rows).into_response(),
        ExportFormat::Csv => csv_response(
            &["id", "recorded_at", "payload"],
            rows.into_iter().map(|r| vec![r.id.to_string(), r.recorded_at.to_rfc3339(), r.payload.0.to_string()]).collect(),
            "metrics",
        ),
    })
}

pub async fn export_events(State(state): State<AppState>, Query(query): Query<ExportQuery>) -> Result<Response, ApiError> {
    let rows = SinkRow::export("event", &state.pool).await?;
    Ok(match query.format {
        ExportFormat::Json => Json(rows).into_response(),
        ExportFormat::Csv => csv_response(
            &["id", "recorded_at", "payload"],
            rows.into_iter().map(|r| vec![r.id.to_string(), r.recorded_at.to_rfc3339(), r.payload.0.to_string()]).collect(),
            "events",
        ),
    })
}

const EXPORT_LIMIT: i64 = 10_000;

pub async fn export_states(State(state): State<AppState>, Query(query): Query<ExportQuery>) -> Result<Response, ApiError> {
    let rows = StateHistoryRow::list_all(EXPORT_LIMIT, &state.pool).await?;
    Ok(match query.format {
        ExportFormat::Json => Json(rows).into_response(),
        ExportFormat::Csv => csv_response(
            &["time", "entity_id", "slug", "entity_type", "changed_keys", "state", "previous_state", "source"],
            rows.into_iter()
                .map(|r| {
                    vec![
                        r.time.to_rfc3339(),
                        r.entity_id.to_string(),
                        r.slug,
                        r.entity_type,
                        r.changed_keys.join(";"),
                        r.state.0.to_string(),
                        r.previous_state.0.to_string(),
                        r.source.unwrap_or_default(),
                    ]
                })
                .collect(),
            "state_history",
        ),
    })
}

pub async fn export_annotations(State(state): State<AppState>, Query(query): Query<ExportQuery>) -> Result<Response, ApiError> {
    let rows = Annotation::list_all(&state.pool).await?;
    Ok(match query.format {
        ExportFormat::Json => Json(rows).into_response(),
        ExportFormat::Csv => csv_response(
            &["id", "entity_id", "label", "body", "metadata", "created_at"],
            rows.into_iter()
                .map(|r| {
                    vec![
                        r.id.to_string(),
                        r.entity_id.map(|id| id.to_string()).unwrap_or_default(),
                        r.label,
                        r.body.unwrap_or_default(),
                        r.metadata.0.to_string(),
                        r.created_at.to_rfc3339(),
                    ]
                })
                .collect(),
            "annotations",
        ),
    })
}

pub async fn export_sessions(State(state): State<AppState>, Query(query): Query<ExportQuery>) -> Result<Response, ApiError> {
    let rows = SessionHistoryRow::list_history(None, EXPORT_LIMIT, &state.pool).await?;
    Ok(match query.format {
        ExportFormat::Json => Json(rows).into_response(),
        ExportFormat::Csv => csv_response(
            &["session_id", "stream_id", "publisher_id", "consumer_id", "protocol", "started_at", "ended_at", "status"],
            rows.into_iter()
                .map(|r| {
                    vec![
                        r.session_id.to_string(),
                        r.stream_id.to_string(),
                        r.publisher_id,
                        r.consumer_id,
                        r.protocol,
                        r.started_at.to_rfc3339(),
                        r.ended_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                        r.status,
                    ]
                })
                .collect(),
            "sessions",
        ),
    })
}
