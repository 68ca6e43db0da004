// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The Stream Registry (C5): advertise/withdraw/heartbeat/list/get over
//! the ephemeral store, with discovery events fanned out on both the
//! subject tree directly and, via the `maestra.to_mqtt.*` bridge
//! convention, mirrored onto the topic tree for late MQTT joiners.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use maestra_bus::{Envelope, InProcessBus};
use maestra_ephemeral::{EphemeralErrorKind, IndexSets, TtlStore, RECORD_TTL};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{EngineError, EngineErrorKind};

const INDEX_ALL: &str = "streams:all";

fn index_by_type(stream_type: &str) -> String {
    format!("streams:by_type:{stream_type}")
}

fn stream_key(stream_id: &str) -> String {
    format!("stream:{stream_id}")
}

fn session_index_by_stream(stream_id: &str) -> String {
    format!("sessions:by_stream:{stream_id}")
}

/// Registry over the shared [`TtlStore`]/[`IndexSets`]/[`InProcessBus`].
/// Cheap to clone; every field is already reference-counted.
#[derive(Clone)]
pub struct StreamRegistry {
    store: Arc<TtlStore>,
    indices: Arc<IndexSets>,
    bus: Arc<InProcessBus>,
}

impl StreamRegistry {
    #[must_use]
    pub fn new(store: Arc<TtlStore>, indices: Arc<IndexSets>, bus: Arc<InProcessBus>) -> Self {
        Self { store, indices, bus }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<TtlStore> {
        &self.store
    }

    #[must_use]
    pub fn indices(&self) -> &Arc<IndexSets> {
        &self.indices
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<InProcessBus> {
        &self.bus
    }

    /// Advertises a new stream, returning its allocated id.
    #[allow(clippy::too_many_arguments)]
    pub async fn advertise(
        &self,
        name: &str,
        stream_type: &str,
        publisher_id: &str,
        protocol: &str,
        address: &str,
        port: u16,
        entity_id: Option<Uuid>,
        device_id: Option<Uuid>,
        config: Value,
        metadata: Value,
    ) -> Result<String, EngineError> {
        let stream_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let record = json!({
            "id": stream_id,
            "name": name,
            "stream_type": stream_type,
            "publisher_id": publisher_id,
            "protocol": protocol,
            "address": address,
            "port": port,
            "entity_id": entity_id,
            "device_id": device_id,
            "config": config,
            "metadata": metadata,
            "advertised_at": now,
            "last_heartbeat": now,
            "active_sessions": 0,
        });

        self.store.set(stream_key(&stream_id), record.clone(), RECORD_TTL);
        self.indices.add(INDEX_ALL, stream_key(&stream_id));
        self.indices.add(&index_by_type(stream_type), stream_key(&stream_id));

        self.publish_discovery("advertised", stream_type, &record).await;

        Ok(stream_id)
    }

    /// Withdraws a stream, cascade-deleting its sessions.
    pub async fn withdraw(&self, stream_id: &str) -> Result<(), EngineError> {
        let record = self.get(stream_id)?;
        let stream_type = record["stream_type"].as_str().unwrap_or_default().to_string();

        for session_key in self.indices.members(&session_index_by_stream(stream_id)) {
            self.store.delete(&session_key);
        }
        self.indices.clear(&session_index_by_stream(stream_id));

        self.store.delete(&stream_key(stream_id));
        self.indices.remove(INDEX_ALL, &stream_key(stream_id));
        self.indices.remove(&index_by_type(&stream_type), &stream_key(stream_id));

        self.publish_discovery("withdrawn", &stream_type, &record).await;
        Ok(())
    }

    /// Extends a stream's TTL and re-emits the advertise payload to the
    /// MQTT mirror so clients that joined after the original advertise
    /// can still discover it.
    ///
    /// # Errors
    /// [`EngineErrorKind::StreamNotLive`] if the record has already
    /// expired or never existed.
    pub async fn heartbeat(&self, stream_id: &str) -> Result<(), EngineError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.store
            .hset_field(&stream_key(stream_id), "last_heartbeat", json!(now))
            .map_err(|err| match err.into_kind() {
                EphemeralErrorKind::NotFound(_) => EngineErrorKind::StreamNotLive(stream_id.to_string()).into(),
                other => EngineErrorKind::Ephemeral(other.into()).into(),
            })?;
        self.store
            .touch(&stream_key(stream_id), RECORD_TTL)
            .map_err(|e| EngineErrorKind::Ephemeral(e).into())?;

        let record = self.get(stream_id)?;
        let stream_type = record["stream_type"].as_str().unwrap_or_default().to_string();
        self.publish_discovery("advertised", &stream_type, &record).await;
        Ok(())
    }

    /// Lists every live stream, optionally filtered by `stream_type`.
    /// Drops stale index entries whose backing record has expired.
    pub fn list(&self, stream_type: Option<&str>) -> Vec<Value> {
        let index = match stream_type {
            Some(t) => index_by_type(t),
            None => INDEX_ALL.to_string(),
        };
        let mut live = Vec::new();
        for key in self.indices.members(&index) {
            match self.store.hget(&key) {
                Some(record) => live.push(record),
                None => self.indices.remove(&index, &key),
            }
        }
        live
    }

    /// Looks up a single live stream.
    ///
    /// # Errors
    /// [`EngineErrorKind::StreamNotLive`] if missing or expired.
    pub fn get(&self, stream_id: &str) -> Result<Value, EngineError> {
        self.store
            .hget(&stream_key(stream_id))
            .ok_or_else(|| EngineErrorKind::StreamNotLive(stream_id.to_string()).into())
    }

    async fn publish_discovery(&self, event: &str, stream_type: &str, record: &Value) {
        let payload = json!({
            "type": format!("stream_{event}"),
            "stream": record,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        let bytes = Bytes::from(payload.to_string());

        let direct_subjects = vec![
            "maestra.stream.advertise".to_string(),
            format!("maestra.stream.advertise.{stream_type}"),
        ];
        for subject in &direct_subjects {
            self.bus.publish_subject(Envelope::new(subject.clone(), bytes.clone())).await;
        }
        for subject in &direct_subjects {
            let mirror = format!("maestra.to_mqtt.maestra.stream.advertise{}", subject.trim_start_matches("maestra.stream.advertise"));
            self.bus.publish_subject(Envelope::new(mirror, bytes.clone())).await;
        }
    }
}

/// Heartbeat cadence recommended to publishers, one third of the TTL.
/// Not enforced server-side.
#[must_use]
pub fn recommended_heartbeat_interval() -> Duration {
    RECORD_TTL / 3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> StreamRegistry {
        StreamRegistry::new(Arc::new(TtlStore::new()), Arc::new(IndexSets::new()), Arc::new(InProcessBus::new()))
    }

    #[tokio::test]
    async fn advertise_then_get_round_trips() {
        let registry = registry();
        let id = registry
            .advertise("spectrum", "sensor", "pub-1", "udp", "127.0.0.1", 9000, None, None, json!({}), json!({}))
            .await
            .unwrap();
        let record = registry.get(&id).unwrap();
        assert_eq!(record["name"], "spectrum");
    }

    #[tokio::test]
    async fn list_filters_by_type() {
        let registry = registry();
        registry
            .advertise("a", "sensor", "pub-1", "udp", "127.0.0.1", 9000, None, None, json!({}), json!({}))
            .await
            .unwrap();
        registry
            .advertise("b", "video", "pub-2", "srt", "127.0.0.1", 9001, None, None, json!({}), json!({}))
            .await
            .unwrap();

        assert_eq!(registry.list(Some("sensor")).len(), 1);
        assert_eq!(registry.list(None).len(), 2);
    }

    #[tokio::test]
    async fn withdraw_removes_record_and_index() {
        let registry = registry();
        let id = registry
            .advertise("a", "sensor", "pub-1", "udp", "127.0.0.1", 9000, None, None, json!({}), json!({}))
            .await
            .unwrap();
        registry.withdraw(&id).await.unwrap();
        assert!(registry.get(&id).is_err());
        assert!(registry.list(None).is_empty());
    }

    #[tokio::test]
    async fn heartbeat_on_missing_stream_is_not_live() {
        let registry = registry();
        let err = registry.heartbeat("nonexistent").await.unwrap_err();
        assert!(matches!(err.into_kind(), EngineErrorKind::StreamNotLive(_)));
    }
}
