// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The shared state every route handler extracts via `State<AppState>`.
//! Cheap to clone: the durable pool and bus are already
//! reference-counted, and the engine types wrap their own shared state
//! behind `Arc`.

use std::sync::Arc;

use maestra_bus::InProcessBus;
use maestra_engine::{Negotiator, StateEngine, StreamRegistry};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub bus: Arc<InProcessBus>,
    pub state_engine: Arc<StateEngine>,
    pub registry: StreamRegistry,
    pub negotiator: Negotiator,
}
