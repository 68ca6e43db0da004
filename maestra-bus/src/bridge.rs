// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bidirectional relay between the subject tree and the topic tree,
//! mirroring `bridge.py`'s `mqtt_topic_to_nats_subject` /
//! `nats_subject_to_mqtt_topic` conventions:
//!
//! - a publish under `maestra/#` on the topic tree is wrapped in an
//!   envelope `{source, topic, payload, qos, timestamp, data}` and
//!   relayed to the subject tree under `maestra.mqtt.>`;
//! - a publish under `maestra.to_mqtt.>` on the subject tree is relayed
//!   to the topic tree with the `to_mqtt.` prefix stripped; if the
//!   subject payload is a JSON object with a `payload` field, that
//!   field (not the whole object) becomes the MQTT body.
//!
//! The bridge never relays its own output back onto the tree it came
//! from, so it cannot loop.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use log::{debug, warn};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::bus::{Envelope, InProcessBus};
use crate::topic_tree;

/// Topic filter the bridge subscribes to on the MQTT side.
pub const MQTT_SUBSCRIBE_FILTER: &str = "maestra/#";
/// Subject pattern the bridge subscribes to on the NATS side.
pub const NATS_TO_MQTT_SUBJECT: &str = "maestra.to_mqtt.>";
/// Subject prefix mirrored MQTT traffic is republished under.
pub const MQTT_MIRROR_PREFIX: &str = "maestra.mqtt";
/// QoS recorded in the mirrored envelope; the bus has no native QoS
/// concept, so this is a fixed stand-in for the at-most-once semantics
/// the rest of the bus already provides.
const MIRRORED_QOS: u8 = 1;

/// Runs the bridge relay loop until `shutdown` is triggered. Intended to
/// be spawned once per process alongside the rest of the bus wiring.
pub async fn run(bus: Arc<InProcessBus>, shutdown: CancellationToken) {
    let mqtt_to_nats = {
        let bus = Arc::clone(&bus);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { relay_mqtt_to_nats(bus, shutdown).await })
    };
    let nats_to_mqtt = {
        let bus = Arc::clone(&bus);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { relay_nats_to_mqtt(bus, shutdown).await })
    };

    let _ = tokio::join!(mqtt_to_nats, nats_to_mqtt);
}

async fn relay_mqtt_to_nats(bus: Arc<InProcessBus>, shutdown: CancellationToken) {
    let mut sub = match bus.subscribe_topic(MQTT_SUBSCRIBE_FILTER).await {
        Ok(sub) => sub,
        Err(err) => {
            warn!("bridge failed to subscribe on the topic tree: {err}");
            return;
        }
    };

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                debug!("mqtt->nats bridge relay shutting down");
                return;
            }
            envelope = sub.recv() => {
                let Some(envelope) = envelope else { return; };
                let mirrored_subject = format!(
                    "{MQTT_MIRROR_PREFIX}.{}",
                    topic_tree::topic_to_subject(&envelope.subject)
                );
                let body = wrap_mqtt_envelope(&envelope.subject, &envelope.payload);
                bus.publish_subject(Envelope::new(mirrored_subject, body)).await;
            }
        }
    }
}

async fn relay_nats_to_mqtt(bus: Arc<InProcessBus>, shutdown: CancellationToken) {
    let mut sub = match bus.subscribe_subject(NATS_TO_MQTT_SUBJECT).await {
        Ok(sub) => sub,
        Err(err) => {
            warn!("bridge failed to subscribe on the subject tree: {err}");
            return;
        }
    };

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                debug!("nats->mqtt bridge relay shutting down");
                return;
            }
            envelope = sub.recv() => {
                let Some(envelope) = envelope else { return; };
                let Some(rest) = envelope.subject.strip_prefix("maestra.to_mqtt.") else { continue; };
                let mirrored_topic = topic_tree::subject_to_topic(rest);
                let body = unwrap_nats_payload(&envelope.payload);
                bus.publish_topic(Envelope::new(mirrored_topic, body)).await;
            }
        }
    }
}

/// Builds the `{source, topic, payload, qos, timestamp, data}` envelope
/// published onto the subject tree mirror. `data` is the parsed JSON body
/// when `payload` parses, else the raw string, matching
/// `on_mqtt_message`'s try/except JSON decode.
fn wrap_mqtt_envelope(topic: &str, payload: &Bytes) -> Bytes {
    let payload_str = String::from_utf8_lossy(payload).into_owned();
    let data = serde_json::from_str::<Value>(&payload_str).unwrap_or_else(|_| Value::String(payload_str.clone()));
    let envelope = json!({
        "source": "mqtt",
        "topic": topic,
        "payload": payload_str,
        "qos": MIRRORED_QOS,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "data": data,
    });
    Bytes::from(envelope.to_string())
}

/// Extracts the MQTT body from a `maestra.to_mqtt.*` publish. If the
/// payload is a JSON object carrying a `payload` field, that field's
/// string form is used; otherwise the raw bytes pass through unchanged.
/// Mirrors `nats_message_handler`'s `data.get("payload", json.dumps(data))`.
fn unwrap_nats_payload(payload: &Bytes) -> Bytes {
    let Ok(parsed) = serde_json::from_slice::<Value>(payload) else {
        return payload.clone();
    };
    match parsed {
        Value::Object(ref map) => match map.get("payload") {
            Some(Value::String(s)) => Bytes::from(s.clone()),
            Some(other) => Bytes::from(other.to_string()),
            None => Bytes::from(parsed.to_string()),
        },
        Value::String(s) => Bytes::from(s),
        other => Bytes::from(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mqtt_publish_is_wrapped_and_mirrored_onto_subject_tree() {
        let bus = Arc::new(InProcessBus::new());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::clone(&bus), shutdown.clone()));

        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let mut mirror = bus.subscribe_subject("maestra.mqtt.>").await.unwrap();
        bus.publish_topic(Envelope::new("maestra/x/y", Bytes::from_static(b"{\"v\":1}")))
            .await;

        let received = mirror.recv().await.unwrap();
        assert_eq!(received.subject, "maestra.mqtt.maestra.x.y");
        let body: Value = serde_json::from_slice(&received.payload).unwrap();
        assert_eq!(body["source"], "mqtt");
        assert_eq!(body["topic"], "maestra/x/y");
        assert_eq!(body["payload"], "{\"v\":1}");
        assert_eq!(body["data"]["v"], 1);

        shutdown.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn to_mqtt_subject_unwraps_payload_field() {
        let bus = Arc::new(InProcessBus::new());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::clone(&bus), shutdown.clone()));

        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let mut mirror = bus.subscribe_topic("a/b").await.unwrap();
        bus.publish_subject(Envelope::new(
            "maestra.to_mqtt.a.b",
            Bytes::from_static(b"{\"payload\":\"hi\"}"),
        ))
        .await;

        let received = mirror.recv().await.unwrap();
        assert_eq!(received.subject, "a/b");
        assert_eq!(&received.payload[..], b"hi");

        shutdown.cancel();
        let _ = handle.await;
    }
}
