// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{StoreError, StoreErrorKind};

/// History verbosity. Ordered loosely low-to-high; `minimal` skips the
/// history row entirely, `standard` writes it with an empty
/// `previous_state`, `verbose` writes the full prior snapshot too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Minimal,
    Standard,
    Verbose,
}

impl Verbosity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Verbose => "verbose",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minimal" => Some(Self::Minimal),
            "standard" => Some(Self::Standard),
            "verbose" => Some(Self::Verbose),
            _ => None,
        }
    }
}

/// A single verbosity override, scoped to either a device, an entity
/// type, or nothing (the global default row, `scope = 'global'`).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CollectionConfigRow {
    pub id: Uuid,
    pub scope: String,
    pub scope_id: Option<Uuid>,
    pub verbosity: String,
}

impl CollectionConfigRow {
    pub async fn upsert_device(device_id: Uuid, verbosity: Verbosity, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO collection_configs (scope, scope_id, verbosity)
            VALUES ('device', $1, $2)
            ON CONFLICT (scope, scope_id) DO UPDATE SET verbosity = EXCLUDED.verbosity
            RETURNING *
            ",
        )
        .bind(device_id)
        .bind(verbosity.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn upsert_entity_type(type_id: Uuid, verbosity: Verbosity, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO collection_configs (scope, scope_id, verbosity)
            VALUES ('entity_type', $1, $2)
            ON CONFLICT (scope, scope_id) DO UPDATE SET verbosity = EXCLUDED.verbosity
            RETURNING *
            ",
        )
        .bind(type_id)
        .bind(verbosity.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn upsert_global(verbosity: Verbosity, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO collection_configs (scope, scope_id, verbosity)
            VALUES ('global', NULL, $1)
            ON CONFLICT (scope, scope_id) DO UPDATE SET verbosity = EXCLUDED.verbosity
            RETURNING *
            ",
        )
        .bind(verbosity.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    async fn find_scoped(scope: &str, scope_id: Option<Uuid>, pool: &PgPool) -> Result<Option<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM collection_configs WHERE scope = $1 AND scope_id IS NOT DISTINCT FROM $2")
            .bind(scope)
            .bind(scope_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    /// Resolves the effective verbosity for a state write, in the
    /// precedence order named in the data model: device override, then
    /// entity-type override, then the global row, then the hardcoded
    /// `standard` default if nothing has ever been configured.
    pub async fn resolve(device_id: Option<Uuid>, type_id: Uuid, pool: &PgPool) -> Result<Verbosity, StoreError> {
        if let Some(device_id) = device_id {
            if let Some(row) = Self::find_scoped("device", Some(device_id), pool).await? {
                return Ok(Verbosity::parse(&row.verbosity).unwrap_or(Verbosity::Standard));
            }
        }
        if let Some(row) = Self::find_scoped("entity_type", Some(type_id), pool).await? {
            return Ok(Verbosity::parse(&row.verbosity).unwrap_or(Verbosity::Standard));
        }
        if let Some(row) = Self::find_scoped("global", None, pool).await? {
            return Ok(Verbosity::parse(&row.verbosity).unwrap_or(Verbosity::Standard));
        }
        Ok(Verbosity::Standard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_round_trips_through_str() {
        for v in [Verbosity::Minimal, Verbosity::Standard, Verbosity::Verbose] {
            assert_eq!(Verbosity::parse(v.as_str()), Some(v));
        }
    }

    #[test]
    fn verbosity_parse_rejects_unknown() {
        assert_eq!(Verbosity::parse("chatty"), None);
    }
}
