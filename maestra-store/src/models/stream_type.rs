// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{StoreError, StoreErrorKind};

/// A catalog entry describing a kind of stream (`sensor`, `osc`, `audio`,
/// `video`, ...) and its default transport config. Distinct from a live
/// [`crate::Stream`]-equivalent ephemeral advertisement, which lives in
/// `maestra-ephemeral` and merely references this type's `name`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StreamType {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub default_config: Json<Value>,
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StreamType {
    pub async fn create(
        name: &str,
        display_name: &str,
        description: Option<&str>,
        icon: Option<&str>,
        default_config: Value,
        metadata: Value,
        pool: &PgPool,
    ) -> Result<Self, StoreError> {
        if Self::find_by_name(name, pool).await?.is_some() {
            return Err(StoreErrorKind::Conflict("stream_type.name", name.to_string()).into());
        }
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO stream_types (name, display_name, description, icon, default_config, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(name)
        .bind(display_name)
        .bind(description)
        .bind(icon)
        .bind(Json(default_config))
        .bind(Json(metadata))
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn find_by_name(name: &str, pool: &PgPool) -> Result<Option<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM stream_types WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM stream_types ORDER BY name ASC")
            .fetch_all(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }
}

/// The set of built-in stream type names the preview proxy treats
/// specially. Kept here (rather than only in `maestra-preview`) since
/// the HTTP front needs the same classification to decide whether
/// `GET /streams/{id}/preview` opens a UDP decode loop or just an
/// info/heartbeat SSE.
pub const PROXYABLE_TYPES: &[&str] = &["sensor", "data", "osc", "midi", "audio"];

/// Point-to-point, high-bandwidth types the preview proxy only
/// advertises connection info for; it never opens a data plane for
/// these.
pub const CONNECTION_INFO_TYPES: &[&str] = &["video", "ndi", "srt", "texture", "spout", "syphon"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxyable_and_connection_info_types_are_disjoint() {
        for t in PROXYABLE_TYPES {
            assert!(!CONNECTION_INFO_TYPES.contains(t));
        }
    }
}
