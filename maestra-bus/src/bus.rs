// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, warn};
use tokio::sync::{mpsc, RwLock};

use crate::error::BusError;
use crate::subject_tree;
use crate::topic_tree;

/// A single message carried on either tree. `reply_to` is set by
/// [`crate::request_reply`] callers and left empty on ordinary publishes.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub subject: String,
    pub reply_to: Option<String>,
    pub payload: Bytes,
}

impl Envelope {
    #[must_use]
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            reply_to: None,
            payload: payload.into(),
        }
    }
}

/// A live subscription: a channel fed every envelope whose subject matches
/// `pattern`. Dropping the [`Subscription`] handle unregisters it lazily
/// (the next publish to notice a closed channel removes the entry).
pub struct Subscription {
    pub(crate) id: u64,
    receiver: mpsc::UnboundedReceiver<Envelope>,
}

impl Subscription {
    /// Awaits the next envelope delivered to this subscription.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }
}

struct Registration {
    id: u64,
    pattern: String,
    sender: mpsc::UnboundedSender<Envelope>,
}

/// In-process, best-effort, at-most-once dual fan-out bus.
///
/// Publishing on the subject tree ("NATS-style") and the topic tree
/// ("MQTT-style") are independent registries; [`crate::bridge`] relays
/// between them for subjects/topics under the bridging convention.
/// Ordering is preserved per subscriber because each subscriber owns a
/// single unbounded channel and publishes are delivered in call order;
/// the bus makes no cross-subscriber ordering guarantee.
pub struct InProcessBus {
    subject_subs: RwLock<Vec<Registration>>,
    topic_subs: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subject_subs: RwLock::new(Vec::new()),
            topic_subs: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribes to a NATS-style subject pattern.
    ///
    /// # Errors
    /// Returns an error if `pattern` fails [`subject_tree::validate_subject_pattern`].
    pub async fn subscribe_subject(self: &Arc<Self>, pattern: &str) -> Result<Subscription, BusError> {
        subject_tree::validate_subject_pattern(pattern)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id();
        self.subject_subs.write().await.push(Registration {
            id,
            pattern: pattern.to_string(),
            sender: tx,
        });
        Ok(Subscription { id, receiver: rx })
    }

    /// Subscribes to an MQTT-style topic filter.
    ///
    /// # Errors
    /// Returns an error if `pattern` fails [`topic_tree::validate_topic_pattern`].
    pub async fn subscribe_topic(self: &Arc<Self>, pattern: &str) -> Result<Subscription, BusError> {
        topic_tree::validate_topic_pattern(pattern)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id();
        self.topic_subs.write().await.push(Registration {
            id,
            pattern: pattern.to_string(),
            sender: tx,
        });
        Ok(Subscription { id, receiver: rx })
    }

    /// Publishes on the subject tree. Never fails on delivery: a full or
    /// closed subscriber channel is logged and skipped, matching the
    /// at-most-once best-effort delivery guarantee.
    pub async fn publish_subject(&self, envelope: Envelope) {
        let subs = self.subject_subs.read().await;
        let mut stale = Vec::new();
        for sub in subs.iter() {
            if subject_tree::subject_matches(&sub.pattern, &envelope.subject)
                && sub.sender.send(envelope.clone()).is_err()
            {
                stale.push(sub.id);
            }
        }
        drop(subs);
        if !stale.is_empty() {
            self.prune_subject(&stale).await;
        }
    }

    /// Publishes on the topic tree. Same best-effort semantics as
    /// [`Self::publish_subject`].
    pub async fn publish_topic(&self, envelope: Envelope) {
        let subs = self.topic_subs.read().await;
        let mut stale = Vec::new();
        for sub in subs.iter() {
            if topic_tree::topic_matches(&sub.pattern, &envelope.subject) && sub.sender.send(envelope.clone()).is_err()
            {
                stale.push(sub.id);
            }
        }
        drop(subs);
        if !stale.is_empty() {
            self.prune_topic(&stale).await;
        }
    }

    async fn prune_subject(&self, ids: &[u64]) {
        debug!("pruning {} stale subject subscription(s)", ids.len());
        self.subject_subs.write().await.retain(|r| !ids.contains(&r.id));
    }

    async fn prune_topic(&self, ids: &[u64]) {
        debug!("pruning {} stale topic subscription(s)", ids.len());
        self.topic_subs.write().await.retain(|r| !ids.contains(&r.id));
    }
}

/// Logs a publish failure without ever propagating it to the caller. Kept
/// as a free function so [`crate::bridge`] and [`crate::request_reply`]
/// can share the same "never block the caller" wording at call sites.
pub fn log_publish_best_effort(subject: &str) {
    warn!("no subscribers reachable for {subject:?}, message dropped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subject_publish_reaches_matching_subscriber_only() {
        let bus = Arc::new(InProcessBus::new());
        let mut matching = bus.subscribe_subject("maestra.entity.state.*.foo").await.unwrap();
        let mut non_matching = bus.subscribe_subject("maestra.device.>").await.unwrap();

        bus.publish_subject(Envelope::new("maestra.entity.state.light.foo", Bytes::from_static(b"1")))
            .await;

        let received = matching.recv().await.unwrap();
        assert_eq!(received.subject, "maestra.entity.state.light.foo");
        assert!(non_matching.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn topic_publish_reaches_matching_subscriber_only() {
        let bus = Arc::new(InProcessBus::new());
        let mut matching = bus.subscribe_topic("maestra/entity/#").await.unwrap();

        bus.publish_topic(Envelope::new("maestra/entity/state/light/foo", Bytes::from_static(b"1")))
            .await;

        let received = matching.recv().await.unwrap();
        assert_eq!(received.subject, "maestra/entity/state/light/foo");
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_panic_future_publishes() {
        let bus = Arc::new(InProcessBus::new());
        {
            let _dropped = bus.subscribe_subject("maestra.>").await.unwrap();
        }
        bus.publish_subject(Envelope::new("maestra.entity.state", Bytes::from_static(b"1")))
            .await;
        assert!(bus.subject_subs.read().await.is_empty());
    }
}
