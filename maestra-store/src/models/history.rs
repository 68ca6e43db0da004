// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{StoreError, StoreErrorKind};

/// One append-only row per non-empty state change, written by the state
/// engine (never by the HTTP front directly). `previous_state` is an
/// empty object under `standard` verbosity and the full prior snapshot
/// under `verbose`; `minimal` verbosity skips the row entirely (callers
/// should not call `insert` in that case).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StateHistoryRow {
    pub time: DateTime<Utc>,
    pub entity_id: Uuid,
    pub slug: String,
    pub entity_type: String,
    pub path: Option<String>,
    pub state: Json<Value>,
    pub previous_state: Json<Value>,
    pub changed_keys: Vec<String>,
    pub source: Option<String>,
}

impl StateHistoryRow {
    /// Appends a row. Failure here is always treated as non-fatal by
    /// callers (the state write itself must already have committed); see
    /// `maestra-engine`'s state-write path for the log-and-continue
    /// wrapper.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        entity_id: Uuid,
        slug: &str,
        entity_type: &str,
        path: Option<&str>,
        state: Value,
        previous_state: Value,
        changed_keys: Vec<String>,
        source: Option<&str>,
        pool: &PgPool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO state_history
                (time, entity_id, slug, entity_type, path, state, previous_state, changed_keys, source)
            VALUES (now(), $1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(entity_id)
        .bind(slug)
        .bind(entity_type)
        .bind(path)
        .bind(Json(state))
        .bind(Json(previous_state))
        .bind(&changed_keys)
        .bind(source)
        .execute(pool)
        .await
        .map_err(StoreErrorKind::Database)?;
        Ok(())
    }

    pub async fn list_for_entity(entity_id: Uuid, limit: i64, pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM state_history WHERE entity_id = $1 ORDER BY time DESC LIMIT $2")
            .bind(entity_id)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    /// All rows, newest first, for `GET /analytics/export/states`.
    pub async fn list_all(limit: i64, pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM state_history ORDER BY time DESC LIMIT $1")
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }
}

/// The durable record of a completed (or completing) session: the same
/// fields the ephemeral session record carries, plus the fields that
/// only exist once it's over.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionHistoryRow {
    pub session_id: Uuid,
    pub stream_id: Uuid,
    pub publisher_id: String,
    pub consumer_id: String,
    pub protocol: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub bytes_transferred: Option<i64>,
    pub status: String,
    pub error_message: Option<String>,
}

impl SessionHistoryRow {
    /// Fire-and-forget insert for a newly negotiated session. Called
    /// from a spawned task so a slow durable write never delays the
    /// negotiator's reply to the consumer.
    pub async fn insert_started(
        session_id: Uuid,
        stream_id: Uuid,
        publisher_id: &str,
        consumer_id: &str,
        protocol: &str,
        pool: &PgPool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO session_history
                (session_id, stream_id, publisher_id, consumer_id, protocol, started_at, status)
            VALUES ($1, $2, $3, $4, $5, now(), 'active')
            ",
        )
        .bind(session_id)
        .bind(stream_id)
        .bind(publisher_id)
        .bind(consumer_id)
        .bind(protocol)
        .execute(pool)
        .await
        .map_err(StoreErrorKind::Database)?;
        Ok(())
    }

    /// Closes out a session row on stop, recording `ended_at` and the
    /// derived `duration_seconds`.
    pub async fn mark_stopped(
        session_id: Uuid,
        bytes_transferred: Option<i64>,
        error_message: Option<&str>,
        pool: &PgPool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            UPDATE session_history
            SET ended_at = now(),
                duration_seconds = EXTRACT(EPOCH FROM (now() - started_at)),
                bytes_transferred = $2,
                status = 'stopped',
                error_message = $3
            WHERE session_id = $1
            ",
        )
        .bind(session_id)
        .bind(bytes_transferred)
        .bind(error_message)
        .execute(pool)
        .await
        .map_err(StoreErrorKind::Database)?;
        Ok(())
    }

    pub async fn list_history(stream_id: Option<Uuid>, limit: i64, pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        match stream_id {
            Some(stream_id) => sqlx::query_as::<_, Self>(
                "SELECT * FROM session_history WHERE stream_id = $1 ORDER BY started_at DESC LIMIT $2",
            )
            .bind(stream_id)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into()),
            None => sqlx::query_as::<_, Self>("SELECT * FROM session_history ORDER BY started_at DESC LIMIT $1")
                .bind(limit)
                .fetch_all(pool)
                .await
                .map_err(|e| StoreErrorKind::Database(e).into()),
        }
    }
}
