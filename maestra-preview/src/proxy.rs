// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The per-connection preview loop: negotiates a session (or, for
//! connection-info-only types, skips straight to advertising connection
//! details), then either idles on a heartbeat cadence or owns a UDP
//! socket and decodes datagrams into `preview` events until the HTTP
//! front drops the stream (client disconnect cancels the generator and
//! its socket with it).

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use futures::Stream;
use log::warn;
use maestra_engine::{Negotiator, StreamRegistry};
use maestra_store::CONNECTION_INFO_TYPES;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::decoders::decode_for_stream_type;

/// How often a connection-info-only preview (video, NDI, SRT, ...) emits
/// a keep-alive heartbeat while the data plane stays out of band.
const CONNECTION_INFO_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long the proxy blocks on `recv_from` before treating the gap as
/// idle and considering a heartbeat.
const RECV_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimum gap since the last heartbeat before an idle `recv_from`
/// timeout triggers a session TTL refresh and heartbeat event.
const HEARTBEAT_REFRESH_THRESHOLD: Duration = Duration::from_secs(10);

/// One SSE frame emitted by a preview loop: an event name paired with
/// its JSON payload. The HTTP front wraps this into an actual
/// `axum::response::sse::Event`.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewEvent {
    pub name: &'static str,
    pub data: Value,
}

impl PreviewEvent {
    #[must_use]
    pub fn info(data: Value) -> Self {
        Self { name: "info", data }
    }

    #[must_use]
    pub fn preview(data: Value) -> Self {
        Self { name: "preview", data }
    }

    #[must_use]
    pub fn heartbeat(data: Value) -> Self {
        Self { name: "heartbeat", data }
    }

    #[must_use]
    pub fn error(data: Value) -> Self {
        Self { name: "error", data }
    }
}

/// Best-effort LAN IP the server advertises to publishers during
/// negotiation. Connecting a UDP socket doesn't send a packet; it just
/// asks the kernel to pick the route it would use, which is the
/// standard no-traffic trick for this.
fn local_lan_ip() -> IpAddr {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Stops the negotiated session when the preview generator is dropped,
/// whether that's a clean end-of-stream or the client disconnecting
/// mid-loop. Fire-and-forget: the session will also just expire on its
/// own TTL if this never completes.
struct SessionGuard {
    negotiator: Negotiator,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let negotiator = self.negotiator.clone();
        let session_id = self.session_id.clone();
        tokio::spawn(async move {
            if let Err(err) = negotiator.stop_session(&session_id, None, None).await {
                warn!("failed to stop preview session {session_id}: {err}");
            }
        });
    }
}

/// Builds the event stream for `GET /streams/{id}/preview`.
///
/// Looks up `stream_id` once at the start; if it isn't live, the stream
/// yields a single `error` event and ends. Otherwise branches on the
/// stream's type per the proxy's two modes: connection-info-only types
/// get an `info` event and a 15 s heartbeat cadence forever; proxyable
/// types negotiate a session, bind a UDP socket, and decode datagrams
/// into `preview` events until the caller drops the stream.
pub fn preview_stream(registry: StreamRegistry, negotiator: Negotiator, stream_id: String) -> impl Stream<Item = PreviewEvent> {
    async_stream::stream! {
        let record = match registry.get(&stream_id) {
            Ok(record) => record,
            Err(err) => {
                yield PreviewEvent::error(json!({ "message": err.to_string() }));
                return;
            }
        };
        let stream_type = record.get("stream_type").and_then(Value::as_str).unwrap_or_default().to_string();
        let stream_name = record.get("name").and_then(Value::as_str).unwrap_or_default().to_string();

        if CONNECTION_INFO_TYPES.contains(&stream_type.as_str()) {
            yield PreviewEvent::info(json!({
                "stream_id": stream_id,
                "stream_name": stream_name,
                "stream_type": stream_type,
                "connection": record,
            }));
            loop {
                tokio::time::sleep(CONNECTION_INFO_HEARTBEAT_INTERVAL).await;
                yield PreviewEvent::heartbeat(json!({ "stream_id": stream_id }));
            }
        }

        let socket = match UdpSocket::bind((local_lan_ip(), 0)).await {
            Ok(socket) => socket,
            Err(err) => {
                yield PreviewEvent::error(json!({ "message": err.to_string() }));
                return;
            }
        };
        let local_address = socket.local_addr().ok().map(|addr| addr.to_string());

        let short_id: String = stream_id.chars().take(8).collect();
        let consumer_id = format!("dashboard-preview-{short_id}");

        let offer = match negotiator.request_session(&stream_id, &stream_name, &stream_type, "udp", &consumer_id).await {
            Ok(offer) => offer,
            Err(err) => {
                yield PreviewEvent::error(json!({ "message": err.to_string() }));
                return;
            }
        };

        yield PreviewEvent::info(json!({
            "session_id": offer.session_id,
            "stream_id": offer.stream_id,
            "stream_name": offer.stream_name,
            "stream_type": offer.stream_type,
            "publisher_address": offer.publisher_address,
            "publisher_port": offer.publisher_port,
            "transport_config": offer.transport_config,
            "local_address": local_address,
        }));

        let _guard = SessionGuard { negotiator: negotiator.clone(), session_id: offer.session_id.clone() };

        let mut seq: u64 = 0;
        let mut last_heartbeat = Instant::now();
        let mut buf = vec![0u8; 65536];
        loop {
            match tokio::time::timeout(RECV_IDLE_TIMEOUT, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, _src))) => {
                    let mut decoded = decode_for_stream_type(&stream_type, &buf[..len]);
                    if let Value::Object(ref mut map) = decoded {
                        map.insert("_seq".to_string(), json!(seq));
                    }
                    seq += 1;
                    yield PreviewEvent::preview(decoded);
                }
                Ok(Err(err)) => {
                    yield PreviewEvent::error(json!({ "message": err.to_string() }));
                    break;
                }
                Err(_elapsed) => {
                    if last_heartbeat.elapsed() < HEARTBEAT_REFRESH_THRESHOLD {
                        continue;
                    }
                    if negotiator.heartbeat_session(&offer.session_id).await.is_ok() {
                        last_heartbeat = Instant::now();
                        yield PreviewEvent::heartbeat(json!({ "session_id": offer.session_id }));
                    } else {
                        yield PreviewEvent::error(json!({ "message": "session expired" }));
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_lan_ip_never_panics() {
        let _ = local_lan_ip();
    }

    #[test]
    fn preview_event_constructors_set_expected_names() {
        assert_eq!(PreviewEvent::info(json!({})).name, "info");
        assert_eq!(PreviewEvent::preview(json!({})).name, "preview");
        assert_eq!(PreviewEvent::heartbeat(json!({})).name, "heartbeat");
        assert_eq!(PreviewEvent::error(json!({})).name, "error");
    }
}
