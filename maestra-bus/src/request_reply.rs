// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Correlation-id request/reply over the subject tree, modeled on
//! `azure_iot_operations_protocol::rpc::command_invoker`'s
//! request/response pairing but simplified to a single in-process bus
//! with no transport-level session management.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use derive_builder::Builder;
use uuid::Uuid;

use crate::bus::{Envelope, InProcessBus};
use crate::error::{BusError, BusErrorKind};

/// Default hard timeout for a negotiation request/reply, per the stream
/// negotiator's 5 second deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for a single [`request`] call.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct RequestOptions {
    /// How long to wait for a reply before giving up.
    #[builder(default = "DEFAULT_REQUEST_TIMEOUT")]
    pub timeout: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Sends `payload` to `subject` and awaits exactly one reply on a
/// freshly minted inbox subject, honoring `options.timeout`.
///
/// # Errors
/// Returns [`BusErrorKind::Timeout`] if no reply arrives in time, or
/// [`BusErrorKind::Cancelled`] if the inbox subscription is torn down
/// before a reply is observed.
pub async fn request(
    bus: &Arc<InProcessBus>,
    subject: &str,
    payload: impl Into<Bytes>,
    options: &RequestOptions,
) -> Result<Envelope, BusError> {
    let inbox = format!("_inbox.{}", Uuid::new_v4());
    let mut subscription = bus.subscribe_subject(&inbox).await?;

    let mut envelope = Envelope::new(subject, payload);
    envelope.reply_to = Some(inbox.clone());
    bus.publish_subject(envelope).await;

    tokio::select! {
        reply = subscription.recv() => {
            reply.ok_or_else(|| BusErrorKind::Cancelled(inbox.clone()).into())
        }
        () = tokio::time::sleep(options.timeout) => {
            Err(BusErrorKind::Timeout(subject.to_string(), options.timeout).into())
        }
    }
}

/// Publishes `payload` on `envelope.reply_to`, if the original request
/// carried one. A no-op (logged at debug) if the requester didn't ask for
/// a reply, matching fire-and-forget publish semantics elsewhere on the
/// bus.
pub async fn reply(bus: &Arc<InProcessBus>, request: &Envelope, payload: impl Into<Bytes>) {
    let Some(reply_to) = request.reply_to.clone() else {
        log::debug!("request on {:?} carried no reply_to, dropping reply", request.subject);
        return;
    };
    bus.publish_subject(Envelope::new(reply_to, payload)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_reply_round_trip() {
        let bus = Arc::new(InProcessBus::new());
        let mut server = bus.subscribe_subject("maestra.stream.request.audio").await.unwrap();

        let bus_for_server = Arc::clone(&bus);
        let handle = tokio::spawn(async move {
            let incoming = server.recv().await.unwrap();
            reply(&bus_for_server, &incoming, Bytes::from_static(b"{\"ok\":true}")).await;
        });

        let response = request(
            &bus,
            "maestra.stream.request.audio",
            Bytes::from_static(b"{}"),
            &RequestOptions::default(),
        )
        .await
        .unwrap();

        handle.await.unwrap();
        assert_eq!(&response.payload[..], b"{\"ok\":true}");
    }

    #[tokio::test]
    async fn request_times_out_with_no_responder() {
        let bus = Arc::new(InProcessBus::new());
        let options = RequestOptionsBuilder::default()
            .timeout(Duration::from_millis(20))
            .build()
            .unwrap();

        let err = request(&bus, "maestra.stream.request.nobody", Bytes::from_static(b"{}"), &options)
            .await
            .unwrap_err();

        assert!(matches!(err.into_kind(), BusErrorKind::Timeout(_, _)));
    }
}
