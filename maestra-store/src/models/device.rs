// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{StoreError, StoreErrorKind};

/// A physical or virtual piece of hardware (an ESP32 panel, an SDR
/// dongle, a TouchDesigner instance) identified by a unique
/// `hardware_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: Uuid,
    pub name: String,
    pub device_type: String,
    pub hardware_id: String,
    pub firmware_version: Option<String>,
    pub ip_address: Option<String>,
    pub location: Json<Value>,
    pub metadata: Json<Value>,
    pub status: String,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Registers a device.
    ///
    /// # Errors
    /// [`StoreErrorKind::Conflict`] if `hardware_id` is already
    /// registered (surfaced by the HTTP front as 409).
    #[allow(clippy::too_many_arguments)]
    pub async fn register(
        name: &str,
        device_type: &str,
        hardware_id: &str,
        firmware_version: Option<&str>,
        ip_address: Option<&str>,
        location: Value,
        metadata: Value,
        pool: &PgPool,
    ) -> Result<Self, StoreError> {
        if Self::find_by_hardware_id(hardware_id, pool).await?.is_some() {
            return Err(StoreErrorKind::Conflict("device.hardware_id", hardware_id.to_string()).into());
        }
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO devices
                (name, device_type, hardware_id, firmware_version, ip_address, location, metadata, status, last_seen)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'online', now())
            RETURNING *
            ",
        )
        .bind(name)
        .bind(device_type)
        .bind(hardware_id)
        .bind(firmware_version)
        .bind(ip_address)
        .bind(Json(location))
        .bind(Json(metadata))
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM devices WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
            .and_then(|row| row.ok_or_else(|| StoreErrorKind::NotFound("device", id.to_string()).into()))
    }

    pub async fn find_by_hardware_id(hardware_id: &str, pool: &PgPool) -> Result<Option<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM devices WHERE hardware_id = $1")
            .bind(hardware_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM devices ORDER BY name ASC")
            .fetch_all(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    /// Total device count, for `GET /status`.
    pub async fn count(pool: &PgPool) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT count(*) FROM devices")
            .fetch_one(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    /// Records a heartbeat: marks the device `online` and bumps
    /// `last_seen`. A device that stops heartbeating is not itself
    /// TTL'd like a stream; its `status` simply goes stale until an
    /// operator or monitor flips it (not automated here).
    ///
    /// # Errors
    /// [`StoreErrorKind::NotFound`] if `hardware_id` isn't registered.
    pub async fn heartbeat(hardware_id: &str, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>(
            "UPDATE devices SET status = 'online', last_seen = now(), updated_at = now() WHERE hardware_id = $1 RETURNING *",
        )
        .bind(hardware_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
        .and_then(|row| row.ok_or_else(|| StoreErrorKind::NotFound("device", hardware_id.to_string()).into()))
    }

    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM devices WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(StoreErrorKind::Database)?;
        Ok(())
    }
}
