// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The Stream Negotiator (C6): request/reply handshake between a
//! consumer and the publisher currently holding a stream, with a hard
//! 5 second timeout. A successful negotiation allocates an ephemeral
//! session record and fires a durable history insert in the
//! background, never delaying the reply to the consumer.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use log::warn;
use maestra_bus::{request_reply, Envelope, InProcessBus, RequestOptions};
use maestra_ephemeral::{IndexSets, TtlStore, RECORD_TTL};
use maestra_store::SessionHistoryRow;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{EngineError, EngineErrorKind};

fn request_subject(stream_id: &str) -> String {
    format!("maestra.stream.request.{stream_id}")
}

fn session_key(session_id: &str) -> String {
    format!("session:{session_id}")
}

fn session_index_by_stream(stream_id: &str) -> String {
    format!("sessions:by_stream:{stream_id}")
}

/// The publisher's accepted terms for a negotiated session, handed back
/// to the consumer so it can open the actual data connection.
#[derive(Debug, Clone)]
pub struct Offer {
    pub session_id: String,
    pub stream_id: String,
    pub stream_name: String,
    pub stream_type: String,
    pub protocol: String,
    pub publisher_address: String,
    pub publisher_port: u16,
    pub transport_config: Value,
}

/// Negotiates and tracks sessions over the shared bus and ephemeral
/// store. Cheap to clone.
#[derive(Clone)]
pub struct Negotiator {
    store: Arc<TtlStore>,
    indices: Arc<IndexSets>,
    bus: Arc<InProcessBus>,
    pool: PgPool,
}

impl Negotiator {
    #[must_use]
    pub fn new(store: Arc<TtlStore>, indices: Arc<IndexSets>, bus: Arc<InProcessBus>, pool: PgPool) -> Self {
        Self { store, indices, bus, pool }
    }

    /// Requests a session against `stream_id`'s current publisher.
    ///
    /// Sends the request on `maestra.stream.request.<stream_id>` and
    /// waits up to 5 seconds for a reply. If the publisher accepts, a
    /// session record is written with a 30 second TTL, a
    /// `session_started` event is published, and a durable history row
    /// is inserted in the background.
    ///
    /// # Errors
    /// [`EngineErrorKind::Bus`] on timeout (no publisher listening) and
    /// [`EngineErrorKind::NegotiationRejected`] if the publisher declines.
    pub async fn request_session(
        &self,
        stream_id: &str,
        stream_name: &str,
        stream_type: &str,
        protocol: &str,
        consumer_id: &str,
    ) -> Result<Offer, EngineError> {
        let request_payload = json!({
            "stream_id": stream_id,
            "consumer_id": consumer_id,
            "protocol": protocol,
        });

        let reply = request_reply::request(
            &self.bus,
            &request_subject(stream_id),
            Bytes::from(request_payload.to_string()),
            &RequestOptions::default(),
        )
        .await?;

        let decision: Value = serde_json::from_slice(&reply.payload)
            .map_err(|e| EngineErrorKind::MalformedRecord("negotiation reply", e.to_string()))?;

        if !decision.get("accept").and_then(Value::as_bool).unwrap_or(false) {
            let reason = decision
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("publisher declined")
                .to_string();
            return Err(EngineErrorKind::NegotiationRejected(stream_id.to_string(), reason).into());
        }

        let session_id = Uuid::new_v4().to_string();
        let publisher_id = decision.get("publisher_id").and_then(Value::as_str).unwrap_or_default().to_string();
        let publisher_address = decision.get("publisher_address").and_then(Value::as_str).unwrap_or_default().to_string();
        let publisher_port = decision.get("publisher_port").and_then(Value::as_u64).unwrap_or(0) as u16;
        let transport_config = decision.get("transport_config").cloned().unwrap_or_else(|| json!({}));

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let session_record = json!({
            "session_id": session_id,
            "stream_id": stream_id,
            "stream_name": stream_name,
            "stream_type": stream_type,
            "protocol": protocol,
            "publisher_id": publisher_id,
            "consumer_id": consumer_id,
            "publisher_address": publisher_address,
            "publisher_port": publisher_port,
            "transport_config": transport_config,
            "started_at": now,
        });

        self.store.set(session_key(&session_id), session_record.clone(), RECORD_TTL);
        self.indices.add(&session_index_by_stream(stream_id), session_key(&session_id));

        self.publish_session_event("session_started", &session_record).await;

        let pool = self.pool.clone();
        let session_uuid = Uuid::parse_str(&session_id).unwrap_or_else(|_| Uuid::new_v4());
        let stream_uuid = Uuid::parse_str(stream_id).unwrap_or_else(|_| Uuid::new_v4());
        let publisher_id_owned = publisher_id.clone();
        let consumer_id_owned = consumer_id.to_string();
        let protocol_owned = protocol.to_string();
        tokio::spawn(async move {
            if let Err(err) = SessionHistoryRow::insert_started(
                session_uuid,
                stream_uuid,
                &publisher_id_owned,
                &consumer_id_owned,
                &protocol_owned,
                &pool,
            )
            .await
            {
                warn!("session_history insert failed for session {session_id}: {err}");
            }
        });

        Ok(Offer {
            session_id,
            stream_id: stream_id.to_string(),
            stream_name: stream_name.to_string(),
            stream_type: stream_type.to_string(),
            protocol: protocol.to_string(),
            publisher_address,
            publisher_port,
            transport_config,
        })
    }

    /// Extends a live session's TTL.
    ///
    /// # Errors
    /// [`EngineErrorKind::SessionNotLive`] if the record has expired or
    /// never existed.
    pub async fn heartbeat_session(&self, session_id: &str) -> Result<(), EngineError> {
        self.store
            .touch(&session_key(session_id), RECORD_TTL)
            .map_err(|_| EngineErrorKind::SessionNotLive(session_id.to_string()))?;
        Ok(())
    }

    /// Ends a session, marking it stopped durably and emitting
    /// `session_stopped`.
    pub async fn stop_session(
        &self,
        session_id: &str,
        bytes_transferred: Option<i64>,
        error_message: Option<&str>,
    ) -> Result<(), EngineError> {
        let record = self
            .store
            .delete(&session_key(session_id))
            .ok_or_else(|| EngineErrorKind::SessionNotLive(session_id.to_string()))?;

        if let Some(stream_id) = record.get("stream_id").and_then(Value::as_str) {
            self.indices.remove(&session_index_by_stream(stream_id), &session_key(session_id));
        }

        self.publish_session_event("session_stopped", &record).await;

        if let Ok(session_uuid) = Uuid::parse_str(session_id) {
            let pool = self.pool.clone();
            let error_message = error_message.map(ToString::to_string);
            let session_id_owned = session_id.to_string();
            tokio::spawn(async move {
                if let Err(err) =
                    SessionHistoryRow::mark_stopped(session_uuid, bytes_transferred, error_message.as_deref(), &pool)
                        .await
                {
                    warn!("session_history mark_stopped failed for session {session_id_owned}: {err}");
                }
            });
        }

        Ok(())
    }

    /// Looks up a live session record.
    ///
    /// # Errors
    /// [`EngineErrorKind::SessionNotLive`] if missing or expired.
    pub fn get_session(&self, session_id: &str) -> Result<Value, EngineError> {
        self.store
            .hget(&session_key(session_id))
            .ok_or_else(|| EngineErrorKind::SessionNotLive(session_id.to_string()).into())
    }

    /// Publisher-side helper: accepts or rejects a pending negotiation
    /// request by replying on its `reply_to` inbox.
    pub async fn respond(&self, request: &Envelope, decision: Value) {
        request_reply::reply(&self.bus, request, Bytes::from(decision.to_string())).await;
    }

    async fn publish_session_event(&self, event: &str, record: &Value) {
        let payload = json!({
            "type": event,
            "session": record,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        let bytes = Bytes::from(payload.to_string());
        self.bus.publish_subject(Envelope::new("maestra.session.lifecycle", bytes.clone())).await;
        self.bus.publish_topic(Envelope::new("maestra/session/lifecycle", bytes)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The full accept/reject/timeout round trip needs a real pool for
    // the fire-and-forget history insert; see `tests/negotiator.rs`.

    #[test]
    fn request_subject_is_scoped_to_stream() {
        assert_eq!(request_subject("abc"), "maestra.stream.request.abc");
    }

    #[test]
    fn session_index_key_is_scoped_to_stream() {
        assert_eq!(session_index_by_stream("abc"), "sessions:by_stream:abc");
    }
}
