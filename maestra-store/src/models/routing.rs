// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{StoreError, StoreErrorKind};

/// A patchable node in the routing graph, with named input/output ports.
/// Distinct from [`crate::models::device::Device`] — a routing device is
/// a patch-bay endpoint, not necessarily a registered piece of hardware.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoutingDevice {
    pub id: Uuid,
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoutingDevice {
    pub async fn create(name: &str, inputs: Vec<String>, outputs: Vec<String>, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO routing_devices (name, inputs, outputs) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(name)
        .bind(&inputs)
        .bind(&outputs)
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM routing_devices WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
            .and_then(|row| row.ok_or_else(|| StoreErrorKind::NotFound("routing_device", id.to_string()).into()))
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM routing_devices ORDER BY name ASC")
            .fetch_all(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM routing_devices WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(StoreErrorKind::Database)?;
        Ok(())
    }

    fn has_input(&self, port: &str) -> bool {
        self.inputs.iter().any(|p| p == port)
    }

    fn has_output(&self, port: &str) -> bool {
        self.outputs.iter().any(|p| p == port)
    }
}

/// A directed patch edge `(from_device, from_port) -> (to_device,
/// to_port)`. `preset_id = NULL` marks an active, live-patched route; a
/// non-null `preset_id` marks a snapshot owned by that preset.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Route {
    pub id: Uuid,
    pub from_device: Uuid,
    pub from_port: String,
    pub to_device: Uuid,
    pub to_port: String,
    pub preset_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Route {
    /// Creates an active route (`preset_id = NULL`).
    ///
    /// # Errors
    /// [`StoreErrorKind::UnknownPort`] if either port isn't declared by
    /// its device. [`StoreErrorKind::Conflict`] if the same tuple is
    /// already active.
    pub async fn create_active(
        from_device: Uuid,
        from_port: &str,
        to_device: Uuid,
        to_port: &str,
        pool: &PgPool,
    ) -> Result<Self, StoreError> {
        let from = RoutingDevice::find_by_id(from_device, pool).await?;
        if !from.has_output(from_port) {
            return Err(StoreErrorKind::UnknownPort(from.name, from_port.to_string()).into());
        }
        let to = RoutingDevice::find_by_id(to_device, pool).await?;
        if !to.has_input(to_port) {
            return Err(StoreErrorKind::UnknownPort(to.name, to_port.to_string()).into());
        }

        let existing = sqlx::query_as::<_, Self>(
            "SELECT * FROM routes WHERE from_device = $1 AND from_port = $2 AND to_device = $3 AND to_port = $4 AND preset_id IS NULL",
        )
        .bind(from_device)
        .bind(from_port)
        .bind(to_device)
        .bind(to_port)
        .fetch_optional(pool)
        .await
        .map_err(StoreErrorKind::Database)?;
        if existing.is_some() {
            return Err(StoreErrorKind::Conflict(
                "route",
                format!("{from_device}:{from_port} -> {to_device}:{to_port}"),
            )
            .into());
        }

        sqlx::query_as::<_, Self>(
            "INSERT INTO routes (from_device, from_port, to_device, to_port, preset_id) VALUES ($1, $2, $3, $4, NULL) RETURNING *",
        )
        .bind(from_device)
        .bind(from_port)
        .bind(to_device)
        .bind(to_port)
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM routes WHERE preset_id IS NULL")
            .fetch_all(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM routes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(StoreErrorKind::Database)?;
        Ok(())
    }
}

/// A named snapshot of the active patch. At most one preset is active at
/// a time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoutePreset {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoutePreset {
    pub async fn create(name: &str, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>("INSERT INTO route_presets (name, is_active) VALUES ($1, false) RETURNING *")
            .bind(name)
            .fetch_one(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM route_presets WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
            .and_then(|row| row.ok_or_else(|| StoreErrorKind::NotFound("route_preset", id.to_string()).into()))
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM route_presets ORDER BY name ASC")
            .fetch_all(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM route_presets WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(StoreErrorKind::Database)?;
        Ok(())
    }

    /// Replaces this preset's route snapshot with the currently active
    /// routes. Runs as a single transaction: delete the preset's old
    /// rows, copy every active route in as a preset-owned row.
    pub async fn save_current_patch(&self, pool: &PgPool) -> Result<Vec<Route>, StoreError> {
        let mut tx = pool.begin().await.map_err(StoreErrorKind::Database)?;
        sqlx::query("DELETE FROM routes WHERE preset_id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await
            .map_err(StoreErrorKind::Database)?;
        let rows = sqlx::query_as::<_, Route>(
            r"
            INSERT INTO routes (from_device, from_port, to_device, to_port, preset_id)
            SELECT from_device, from_port, to_device, to_port, $1
            FROM routes WHERE preset_id IS NULL
            RETURNING *
            ",
        )
        .bind(self.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(StoreErrorKind::Database)?;
        tx.commit().await.map_err(StoreErrorKind::Database)?;
        Ok(rows)
    }

    /// Recalls this preset: replaces the active route set with the
    /// preset's snapshot and flips the active flag, deactivating
    /// whichever preset was previously active.
    pub async fn recall(&self, pool: &PgPool) -> Result<Vec<Route>, StoreError> {
        let mut tx = pool.begin().await.map_err(StoreErrorKind::Database)?;
        sqlx::query("UPDATE route_presets SET is_active = false WHERE is_active = true")
            .execute(&mut *tx)
            .await
            .map_err(StoreErrorKind::Database)?;
        sqlx::query("DELETE FROM routes WHERE preset_id IS NULL")
            .execute(&mut *tx)
            .await
            .map_err(StoreErrorKind::Database)?;
        let rows = sqlx::query_as::<_, Route>(
            r"
            INSERT INTO routes (from_device, from_port, to_device, to_port, preset_id)
            SELECT from_device, from_port, to_device, to_port, NULL
            FROM routes WHERE preset_id = $1
            RETURNING *
            ",
        )
        .bind(self.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(StoreErrorKind::Database)?;
        sqlx::query("UPDATE route_presets SET is_active = true, updated_at = now() WHERE id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await
            .map_err(StoreErrorKind::Database)?;
        tx.commit().await.map_err(StoreErrorKind::Database)?;
        Ok(rows)
    }
}
