// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{StoreError, StoreErrorKind};

/// An operator-authored note pinned to a point or span in time, optionally
/// scoped to an entity. Thin CRUD over the durable sink's analytics
/// surface; the relational DDL backing this and the time-series export
/// tables is treated as an internal sink detail, not part of this
/// crate's public contract beyond these rows.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Annotation {
    pub id: Uuid,
    pub entity_id: Option<Uuid>,
    pub label: String,
    pub body: Option<String>,
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Annotation {
    pub async fn create(
        entity_id: Option<Uuid>,
        label: &str,
        body: Option<&str>,
        metadata: Value,
        pool: &PgPool,
    ) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO annotations (entity_id, label, body, metadata) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(entity_id)
        .bind(label)
        .bind(body)
        .bind(Json(metadata))
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM annotations WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
            .and_then(|row| row.ok_or_else(|| StoreErrorKind::NotFound("annotation", id.to_string()).into()))
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM annotations ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn update(&self, label: &str, body: Option<&str>, metadata: Value, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>(
            "UPDATE annotations SET label = $2, body = $3, metadata = $4, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(self.id)
        .bind(label)
        .bind(body)
        .bind(Json(metadata))
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM annotations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(StoreErrorKind::Database)?;
        Ok(())
    }
}

/// Aggregate counts backing `GET /analytics/summary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub metrics_count: i64,
    pub events_count: i64,
    pub state_history_count: i64,
    pub annotations_count: i64,
}

impl AnalyticsSummary {
    pub async fn compute(pool: &PgPool) -> Result<Self, StoreError> {
        let metrics_count: i64 = sqlx::query_scalar("SELECT count(*) FROM metrics")
            .fetch_one(pool)
            .await
            .map_err(StoreErrorKind::Database)?;
        let events_count: i64 = sqlx::query_scalar("SELECT count(*) FROM events")
            .fetch_one(pool)
            .await
            .map_err(StoreErrorKind::Database)?;
        let state_history_count: i64 = sqlx::query_scalar("SELECT count(*) FROM state_history")
            .fetch_one(pool)
            .await
            .map_err(StoreErrorKind::Database)?;
        let annotations_count: i64 = sqlx::query_scalar("SELECT count(*) FROM annotations")
            .fetch_one(pool)
            .await
            .map_err(StoreErrorKind::Database)?;
        Ok(Self {
            metrics_count,
            events_count,
            state_history_count,
            annotations_count,
        })
    }
}

/// A raw metric or event row accepted by `POST /metrics`, `POST
/// /metrics/batch`, `POST /events` and stored to the durable sink
/// verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SinkRow {
    pub id: Uuid,
    pub kind: String,
    pub payload: Json<Value>,
    pub recorded_at: DateTime<Utc>,
}

impl SinkRow {
    pub async fn insert_metric(payload: Value, pool: &PgPool) -> Result<Self, StoreError> {
        Self::insert("metric", payload, pool).await
    }

    pub async fn insert_event(payload: Value, pool: &PgPool) -> Result<Self, StoreError> {
        Self::insert("event", payload, pool).await
    }

    async fn insert(kind: &str, payload: Value, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO sink_rows (kind, payload, recorded_at) VALUES ($1, $2, now()) RETURNING *",
        )
        .bind(kind)
        .bind(Json(payload))
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    /// Exports rows of `kind` as either JSON (the rows themselves) or a
    /// flattened CSV with one `payload` column holding the compact JSON
    /// body, matching the export route's `format=json|csv` query param.
    pub async fn export(kind: &str, pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM sink_rows WHERE kind = $1 ORDER BY recorded_at ASC")
            .bind(kind)
            .fetch_all(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }
}
