// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{StoreError, StoreErrorKind};

/// A named kind of entity (`light`, `sensor`, `room`, ...). The name is
/// immutable once created; renaming a type means creating a new one.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EntityType {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub icon: Option<String>,
    pub default_state: Json<Value>,
    pub state_schema: Option<Json<Value>>,
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityType {
    /// Creates an entity type.
    ///
    /// # Errors
    /// [`StoreErrorKind::Conflict`] if `name` is already taken.
    pub async fn create(
        name: &str,
        display_name: &str,
        icon: Option<&str>,
        default_state: Value,
        state_schema: Option<Value>,
        metadata: Value,
        pool: &PgPool,
    ) -> Result<Self, StoreError> {
        if Self::find_by_name(name, pool).await?.is_some() {
            return Err(StoreErrorKind::Conflict("entity_type.name", name.to_string()).into());
        }
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO entity_types (name, display_name, icon, default_state, state_schema, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(name)
        .bind(display_name)
        .bind(icon)
        .bind(Json(default_state))
        .bind(state_schema.map(Json))
        .bind(Json(metadata))
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM entity_types WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
            .and_then(|row| row.ok_or_else(|| StoreErrorKind::NotFound("entity_type", id.to_string()).into()))
    }

    pub async fn find_by_name(name: &str, pool: &PgPool) -> Result<Option<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM entity_types WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM entity_types ORDER BY name ASC")
            .fetch_all(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }
}
