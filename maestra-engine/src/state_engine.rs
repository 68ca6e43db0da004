// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The State Engine (C4): deep-merge state writes, change-key
//! computation, history recording, lifecycle/state-change fan-out, and
//! variable validation.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use log::warn;
use maestra_bus::{subject_tree, topic_tree, Envelope, InProcessBus};
use maestra_store::{CollectionConfigRow, DeleteMode, Entity, EntityType, StateHistoryRow, Verbosity};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::deep_merge::{changed_keys, deep_merge, project_paths};
use crate::error::EngineError;
use crate::variables::{validate, ValidationResult, VariableDefinitions};

const STATE_SUBJECT_BASE: &str = "maestra.entity.state";
const STATE_TOPIC_BASE: &str = "maestra/entity/state";

/// Ties the durable store, the ephemeral store's TTL awareness (none
/// needed here, entities are durable) and the bus together behind the
/// operations the HTTP front calls.
pub struct StateEngine {
    pool: PgPool,
    bus: Arc<InProcessBus>,
}

impl StateEngine {
    #[must_use]
    pub fn new(pool: PgPool, bus: Arc<InProcessBus>) -> Self {
        Self { pool, bus }
    }

    /// Returns full state, optionally projected onto dotted `paths`.
    pub async fn get_state(&self, entity_id: Uuid, paths: Option<&[String]>) -> Result<Value, EngineError> {
        let entity = Entity::find_by_id(entity_id, &self.pool).await?;
        let state = match paths {
            Some(paths) if !paths.is_empty() => project_paths(&entity.state.0, paths),
            _ => entity.state.0,
        };
        Ok(state)
    }

    /// Applies a recursive deep merge to the entity's stored state.
    pub async fn patch_state(&self, entity_id: Uuid, patch: Value, source: Option<&str>) -> Result<Entity, EngineError> {
        let entity = Entity::find_by_id(entity_id, &self.pool).await?;
        let merged = deep_merge(&entity.state.0, &patch);
        self.commit_state(entity, merged, source).await
    }

    /// Overwrites the entity's stored state wholesale.
    pub async fn put_state(&self, entity_id: Uuid, new_state: Value, source: Option<&str>) -> Result<Entity, EngineError> {
        let entity = Entity::find_by_id(entity_id, &self.pool).await?;
        self.commit_state(entity, new_state, source).await
    }

    async fn commit_state(&self, entity: Entity, new_state: Value, source: Option<&str>) -> Result<Entity, EngineError> {
        let previous_state = entity.state.0.clone();
        let changed = changed_keys(&previous_state, &new_state);

        // Always persisted so `state_updated_at` bumps even when the
        // write is idempotent (scenario S2); only the history row and
        // the bus event are gated on a non-empty change set.
        let updated = entity.put_state(new_state.clone(), &self.pool).await?;

        if changed.is_empty() {
            return Ok(updated);
        }

        let entity_type = EntityType::find_by_id(updated.type_id, &self.pool).await?;
        let verbosity = CollectionConfigRow::resolve(updated.device_id, updated.type_id, &self.pool)
            .await
            .unwrap_or(Verbosity::Standard);

        if verbosity != Verbosity::Minimal {
            let history_previous = if verbosity == Verbosity::Verbose { previous_state.clone() } else { json!({}) };
            if let Err(err) = StateHistoryRow::insert(
                updated.id,
                &updated.slug,
                &entity_type.name,
                None,
                new_state.clone(),
                history_previous,
                changed.clone(),
                source,
                &self.pool,
            )
            .await
            {
                warn!("state_history insert failed for entity {}: {err}", updated.id);
            }
        }

        self.publish_state_changed(&updated, &entity_type.name, &previous_state, &new_state, &changed, source)
            .await;

        Ok(updated)
    }

    async fn publish_state_changed(
        &self,
        entity: &Entity,
        entity_type_name: &str,
        previous_state: &Value,
        current_state: &Value,
        changed_keys: &[String],
        source: Option<&str>,
    ) {
        let payload = json!({
            "type": "state_changed",
            "entity_id": entity.id,
            "entity_slug": entity.slug,
            "entity_type": entity_type_name,
            "previous_state": previous_state,
            "current_state": current_state,
            "changed_keys": changed_keys,
            "source": source,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        let bytes = Bytes::from(payload.to_string());

        for subject in subject_tree::fan_out_subjects(STATE_SUBJECT_BASE, entity_type_name, &entity.slug) {
            self.bus.publish_subject(Envelope::new(subject, bytes.clone())).await;
        }
        for topic in topic_tree::fan_out_topics(STATE_TOPIC_BASE, entity_type_name, &entity.slug) {
            self.bus.publish_topic(Envelope::new(topic, bytes.clone())).await;
        }
    }

    /// Creates an entity and emits `entity_created` on the global and
    /// per-type fan-outs.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_entity(
        &self,
        name: &str,
        slug: &str,
        type_id: Uuid,
        parent_id: Option<Uuid>,
        state: Value,
        description: Option<&str>,
        tags: Vec<String>,
        metadata: Value,
        device_id: Option<Uuid>,
    ) -> Result<Entity, EngineError> {
        let entity = Entity::create(
            name, slug, type_id, parent_id, state, description, tags, metadata, device_id, &self.pool,
        )
        .await?;
        let entity_type = EntityType::find_by_id(entity.type_id, &self.pool).await?;
        self.publish_lifecycle("entity_created", &entity, &entity_type.name, Some(&entity.state.0))
            .await;
        Ok(entity)
    }

    /// Deletes an entity under the given mode and emits `entity_deleted`.
    pub async fn delete_entity(&self, entity_id: Uuid, mode: DeleteMode) -> Result<(), EngineError> {
        let entity = Entity::find_by_id(entity_id, &self.pool).await?;
        let entity_type = EntityType::find_by_id(entity.type_id, &self.pool).await?;
        entity.delete(mode, &self.pool).await?;
        self.publish_lifecycle("entity_deleted", &entity, &entity_type.name, None).await;
        Ok(())
    }

    async fn publish_lifecycle(&self, event_type: &str, entity: &Entity, entity_type_name: &str, data: Option<&Value>) {
        let payload = json!({
            "type": event_type,
            "entity_id": entity.id,
            "entity_slug": entity.slug,
            "entity_type": entity_type_name,
            "data": data,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        let bytes = Bytes::from(payload.to_string());

        let subject_global = "maestra.entity.lifecycle".to_string();
        let subject_type = format!("maestra.entity.lifecycle.{entity_type_name}");
        let topic_global = "maestra/entity/lifecycle".to_string();
        let topic_type = format!("maestra/entity/lifecycle/{entity_type_name}");

        self.bus.publish_subject(Envelope::new(subject_global, bytes.clone())).await;
        self.bus.publish_subject(Envelope::new(subject_type, bytes.clone())).await;
        self.bus.publish_topic(Envelope::new(topic_global, bytes.clone())).await;
        self.bus.publish_topic(Envelope::new(topic_type, bytes)).await;
    }

    /// Validates an entity's current state against its declared
    /// `metadata.variables`, advisory only.
    pub async fn validate_variables(&self, entity_id: Uuid) -> Result<ValidationResult, EngineError> {
        let entity = Entity::find_by_id(entity_id, &self.pool).await?;
        let definitions = VariableDefinitions::from_metadata(&entity.metadata.0);
        Ok(validate(&entity.state.0, &definitions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_subject_and_topic_bases_are_consistent() {
        assert_eq!(STATE_SUBJECT_BASE.replace('.', "/"), STATE_TOPIC_BASE);
    }
}
