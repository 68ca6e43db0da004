// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{StoreError, StoreErrorKind};

/// Whether deleting an entity removes its descendants too, or leaves them
/// parentless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Cascade,
    Orphan,
}

/// A logical thing in the installation: a light, a knob, a room. Forms a
/// forest via `parent_id`; `path` is the materialized dotted chain of
/// ancestor ids, recomputed whenever the parent changes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub type_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub path: String,
    pub status: String,
    pub state: Json<Value>,
    pub state_updated_at: DateTime<Utc>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Json<Value>,
    pub device_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query filter for [`Entity::list`]. Every field is conjunctive (AND'd
/// together); a `None`/empty field leaves that predicate out entirely.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub type_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Normalizes a tag list: trims whitespace, drops empties, preserves
/// order and duplicates otherwise (spec explicitly allows duplicates).
#[must_use]
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect()
}

impl Entity {
    /// Creates an entity under an optional parent.
    ///
    /// # Errors
    /// [`StoreErrorKind::Conflict`] if `slug` is taken.
    /// [`StoreErrorKind::NotFound`] if `parent_id` doesn't resolve.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        name: &str,
        slug: &str,
        type_id: Uuid,
        parent_id: Option<Uuid>,
        state: Value,
        description: Option<&str>,
        tags: Vec<String>,
        metadata: Value,
        device_id: Option<Uuid>,
        pool: &PgPool,
    ) -> Result<Self, StoreError> {
        if Self::find_by_slug(slug, pool).await?.is_some() {
            return Err(StoreErrorKind::Conflict("entity.slug", slug.to_string()).into());
        }
        let path = match parent_id {
            Some(parent) => {
                let parent = Self::find_by_id(parent, pool).await?;
                format!("{}.{}", parent.path, parent.id)
            }
            None => String::new(),
        };
        let tags = normalize_tags(tags);

        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO entities
                (name, slug, type_id, parent_id, path, status, state, description, tags, metadata, device_id)
            VALUES ($1, $2, $3, $4, $5, 'active', $6, $7, $8, $9, $10)
            RETURNING *
            ",
        )
        .bind(name)
        .bind(slug)
        .bind(type_id)
        .bind(parent_id)
        .bind(path)
        .bind(Json(state))
        .bind(description)
        .bind(&tags)
        .bind(Json(metadata))
        .bind(device_id)
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM entities WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
            .and_then(|row| row.ok_or_else(|| StoreErrorKind::NotFound("entity", id.to_string()).into()))
    }

    pub async fn find_by_slug(slug: &str, pool: &PgPool) -> Result<Option<Self>, StoreError> {
        sqlx::query_as::<_, Self>("SELECT * FROM entities WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    /// Total entity count, for `GET /status`.
    pub async fn count(pool: &PgPool) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT count(*) FROM entities")
            .fetch_one(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    /// Lists entities matching `filter`, newest first, with the filter's
    /// own `limit`/`offset` pagination. Built with `QueryBuilder` since the
    /// predicate set is assembled conditionally rather than fixed, the
    /// same shape as the pack's own dynamic-filter listing queries.
    pub async fn list(filter: &EntityFilter, pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM entities WHERE 1=1");

        if let Some(type_id) = filter.type_id {
            qb.push(" AND type_id = ").push_bind(type_id);
        }
        if let Some(parent_id) = filter.parent_id {
            qb.push(" AND parent_id = ").push_bind(parent_id);
        }
        if let Some(tag) = &filter.tag {
            qb.push(" AND ").push_bind(tag.clone()).push(" = ANY(tags)");
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{search}%");
            qb.push(" AND (name ILIKE ").push_bind(pattern.clone());
            qb.push(" OR slug ILIKE ").push_bind(pattern.clone());
            qb.push(" OR description ILIKE ").push_bind(pattern);
            qb.push(")");
        }

        qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(filter.limit);
        qb.push(" OFFSET ").push_bind(filter.offset);

        qb.build_query_as::<Self>().fetch_all(pool).await.map_err(|e| StoreErrorKind::Database(e).into())
    }

    /// Re-parents this entity, recomputing `path` and rejecting a move
    /// that would make the entity its own ancestor.
    ///
    /// # Errors
    /// [`StoreErrorKind::CyclicParent`] if `new_parent_id` is this entity
    /// or one of its own descendants.
    pub async fn reparent(&self, new_parent_id: Option<Uuid>, pool: &PgPool) -> Result<Self, StoreError> {
        if let Some(candidate) = new_parent_id {
            if candidate == self.id {
                return Err(StoreErrorKind::CyclicParent(self.id.to_string()).into());
            }
            let candidate_entity = Self::find_by_id(candidate, pool).await?;
            if candidate_entity.path.split('.').any(|segment| segment == self.id.to_string()) {
                return Err(StoreErrorKind::CyclicParent(self.id.to_string()).into());
            }
        }
        let path = match new_parent_id {
            Some(parent) => {
                let parent = Self::find_by_id(parent, pool).await?;
                format!("{}.{}", parent.path, parent.id)
            }
            None => String::new(),
        };
        sqlx::query_as::<_, Self>(
            "UPDATE entities SET parent_id = $2, path = $3, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(self.id)
        .bind(new_parent_id)
        .bind(path)
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    pub async fn ancestors(&self, pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        let ids: Vec<Uuid> = self
            .path
            .split('.')
            .filter(|s| !s.is_empty())
            .filter_map(|s| Uuid::parse_str(s).ok())
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Self>("SELECT * FROM entities WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }

    /// Descendants up to `max_depth` levels deep (default 10, matching
    /// the SDK's own default), matched via the materialized path prefix.
    pub async fn descendants(&self, max_depth: u32, pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        let prefix = if self.path.is_empty() {
            format!("{}", self.id)
        } else {
            format!("{}.{}", self.path, self.id)
        };
        let rows = sqlx::query_as::<_, Self>("SELECT * FROM entities WHERE path = $1 OR path LIKE $2")
            .bind(&prefix)
            .bind(format!("{prefix}.%"))
            .fetch_all(pool)
            .await
            .map_err(StoreErrorKind::Database)?;
        let max_depth = max_depth as usize;
        Ok(rows
            .into_iter()
            .filter(|e| e.path[prefix.len()..].split('.').filter(|s| !s.is_empty()).count() <= max_depth)
            .collect())
    }

    pub async fn siblings(&self, pool: &PgPool) -> Result<Vec<Self>, StoreError> {
        let rows: Vec<Self> = match self.parent_id {
            Some(parent) => sqlx::query_as::<_, Self>("SELECT * FROM entities WHERE parent_id = $1 AND id != $2")
                .bind(parent)
                .bind(self.id)
                .fetch_all(pool)
                .await
                .map_err(StoreErrorKind::Database)?,
            None => sqlx::query_as::<_, Self>("SELECT * FROM entities WHERE parent_id IS NULL AND id != $1")
                .bind(self.id)
                .fetch_all(pool)
                .await
                .map_err(StoreErrorKind::Database)?,
        };
        Ok(rows)
    }

    /// Deletes this entity. Under [`DeleteMode::Cascade`] every descendant
    /// is removed too; under [`DeleteMode::Orphan`] direct children have
    /// their `parent_id` cleared (their `path` is left to be recomputed on
    /// next reparent, matching the fact that an orphaned subtree's own
    /// internal paths remain internally consistent).
    pub async fn delete(&self, mode: DeleteMode, pool: &PgPool) -> Result<(), StoreError> {
        match mode {
            DeleteMode::Cascade => {
                let prefix = if self.path.is_empty() {
                    format!("{}", self.id)
                } else {
                    format!("{}.{}", self.path, self.id)
                };
                sqlx::query("DELETE FROM entities WHERE id = $1 OR path = $2 OR path LIKE $3")
                    .bind(self.id)
                    .bind(&prefix)
                    .bind(format!("{prefix}.%"))
                    .execute(pool)
                    .await
                    .map_err(StoreErrorKind::Database)?;
            }
            DeleteMode::Orphan => {
                sqlx::query("UPDATE entities SET parent_id = NULL WHERE parent_id = $1")
                    .bind(self.id)
                    .execute(pool)
                    .await
                    .map_err(StoreErrorKind::Database)?;
                sqlx::query("DELETE FROM entities WHERE id = $1")
                    .bind(self.id)
                    .execute(pool)
                    .await
                    .map_err(StoreErrorKind::Database)?;
            }
        }
        Ok(())
    }

    /// Replaces `state` in full, bumping `state_updated_at`. Deep-merge
    /// semantics and change-key computation live in `maestra-engine`;
    /// this is the unconditional write it settles on.
    pub async fn put_state(&self, state: Value, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>(
            "UPDATE entities SET state = $2, state_updated_at = now(), updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(self.id)
        .bind(Json(state))
        .fetch_one(pool)
        .await
        .map_err(|e| StoreErrorKind::Database(e).into())
    }

    /// Replaces `metadata` in full, including `metadata.variables`. Never
    /// touches `state` or fires a state-change event; callers that need
    /// fan-out on a variable-definition edit publish it themselves.
    pub async fn put_metadata(&self, metadata: Value, pool: &PgPool) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Self>("UPDATE entities SET metadata = $2, updated_at = now() WHERE id = $1 RETURNING *")
            .bind(self.id)
            .bind(Json(metadata))
            .fetch_one(pool)
            .await
            .map_err(|e| StoreErrorKind::Database(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_tags_trims_and_drops_empty() {
        let tags = normalize_tags(vec![" indoor ".to_string(), "".to_string(), "  ".to_string(), "lit".to_string()]);
        assert_eq!(tags, vec!["indoor".to_string(), "lit".to_string()]);
    }

    #[test]
    fn normalize_tags_preserves_duplicates() {
        let tags = normalize_tags(vec!["lit".to_string(), "lit".to_string()]);
        assert_eq!(tags, vec!["lit".to_string(), "lit".to_string()]);
    }
}
