// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Binary entry point: loads configuration from the environment, wires
//! the durable store, bus, ephemeral registry, and coordination engine
//! together, and serves the HTTP front. `anyhow` is used here and only
//! here; every request-handling path downstream returns `ApiError`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use maestra_bus::InProcessBus;
use maestra_ephemeral::{spawn_sweeper, IndexSets, TtlStore};
use maestra_engine::{Negotiator, StateEngine, StreamRegistry};
use maestra_server::{build_router, AppState, ServerConfig};

const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ServerConfig::from_env().context("loading server configuration")?;

    let pool = maestra_store::connect(&config.database_url)
        .await
        .context("connecting to the durable store")?;

    let bus = Arc::new(InProcessBus::new());
    let ttl_store = Arc::new(TtlStore::new());
    let indices = Arc::new(IndexSets::new());
    spawn_sweeper(Arc::clone(&ttl_store), SWEEP_INTERVAL);

    let state_engine = Arc::new(StateEngine::new(pool.clone(), Arc::clone(&bus)));
    let registry = StreamRegistry::new(Arc::clone(&ttl_store), Arc::clone(&indices), Arc::clone(&bus));
    let negotiator = Negotiator::new(Arc::clone(&ttl_store), Arc::clone(&indices), Arc::clone(&bus), pool.clone());

    let app_state = AppState { pool, bus, state_engine, registry, negotiator };
    let app = build_router(app_state);

    let addr = config.http_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await.context("binding the HTTP listener")?;
    log::info!("maestra-server listening on {addr}");
    axum::serve(listener, app).await.context("serving HTTP requests")?;

    Ok(())
}
