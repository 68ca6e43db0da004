// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the stream negotiator's accept/reject/timeout
//! paths. Requires a Postgres instance; set DATABASE_TEST_URL or these
//! tests are skipped.

use std::sync::Arc;
use std::time::Duration;

use maestra_bus::InProcessBus;
use maestra_ephemeral::{IndexSets, TtlStore};
use maestra_engine::negotiator::Negotiator;
use maestra_engine::EngineErrorKind;
use serde_json::json;
use sqlx::PgPool;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = maestra_store::connect(&url).await.ok()?;
    sqlx::query("TRUNCATE session_history").execute(&pool).await.ok()?;
    Some(pool)
}

fn negotiator(bus: Arc<InProcessBus>, pool: PgPool) -> Negotiator {
    Negotiator::new(Arc::new(TtlStore::new()), Arc::new(IndexSets::new()), bus, pool)
}

#[tokio::test]
async fn accepted_negotiation_returns_offer_and_records_session() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let bus = Arc::new(InProcessBus::new());
    let negotiator = negotiator(Arc::clone(&bus), pool);

    let mut publisher = bus.subscribe_subject("maestra.stream.request.stream-1").await.unwrap();
    let bus_for_publisher = Arc::clone(&bus);
    let publisher_task = tokio::spawn(async move {
        let incoming = publisher.recv().await.unwrap();
        maestra_bus::reply(
            &bus_for_publisher,
            &incoming,
            json!({
                "accept": true,
                "publisher_id": "pub-1",
                "publisher_address": "127.0.0.1",
                "publisher_port": 9100,
                "transport_config": {"codec": "pcm"},
            })
            .to_string(),
        )
        .await;
    });

    let offer = negotiator
        .request_session("stream-1", "spectrum", "sensor", "udp", "consumer-1")
        .await
        .unwrap();

    publisher_task.await.unwrap();

    assert_eq!(offer.publisher_port, 9100);
    assert_eq!(offer.stream_id, "stream-1");

    let session = negotiator.get_session(&offer.session_id).unwrap();
    assert_eq!(session["consumer_id"], "consumer-1");
}

#[tokio::test]
async fn rejected_negotiation_surfaces_reason() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let bus = Arc::new(InProcessBus::new());
    let negotiator = negotiator(Arc::clone(&bus), pool);

    let mut publisher = bus.subscribe_subject("maestra.stream.request.stream-2").await.unwrap();
    let bus_for_publisher = Arc::clone(&bus);
    let publisher_task = tokio::spawn(async move {
        let incoming = publisher.recv().await.unwrap();
        maestra_bus::reply(
            &bus_for_publisher,
            &incoming,
            json!({"accept": false, "reason": "already in use"}).to_string(),
        )
        .await;
    });

    let err = negotiator
        .request_session("stream-2", "spectrum", "sensor", "udp", "consumer-1")
        .await
        .unwrap_err();

    publisher_task.await.unwrap();

    match err.into_kind() {
        EngineErrorKind::NegotiationRejected(stream_id, reason) => {
            assert_eq!(stream_id, "stream-2");
            assert_eq!(reason, "already in use");
        }
        other => panic!("expected NegotiationRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn negotiation_with_no_publisher_times_out() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let bus = Arc::new(InProcessBus::new());
    let negotiator = negotiator(bus, pool);

    let result = tokio::time::timeout(
        Duration::from_secs(6),
        negotiator.request_session("stream-nobody", "spectrum", "sensor", "udp", "consumer-1"),
    )
    .await
    .expect("negotiation should resolve within the 5 second hard timeout");

    assert!(result.is_err());
}

#[tokio::test]
async fn stop_session_removes_record() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let bus = Arc::new(InProcessBus::new());
    let negotiator = negotiator(Arc::clone(&bus), pool);

    let mut publisher = bus.subscribe_subject("maestra.stream.request.stream-3").await.unwrap();
    let bus_for_publisher = Arc::clone(&bus);
    tokio::spawn(async move {
        let incoming = publisher.recv().await.unwrap();
        maestra_bus::reply(
            &bus_for_publisher,
            &incoming,
            json!({
                "accept": true,
                "publisher_id": "pub-1",
                "publisher_address": "127.0.0.1",
                "publisher_port": 9100,
                "transport_config": {},
            })
            .to_string(),
        )
        .await;
    });

    let offer = negotiator
        .request_session("stream-3", "spectrum", "sensor", "udp", "consumer-1")
        .await
        .unwrap();

    negotiator.stop_session(&offer.session_id, Some(1024), None).await.unwrap();
    assert!(negotiator.get_session(&offer.session_id).is_err());
}
