// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The coordination engine: state writes and change fan-out (C4), the
//! ephemeral stream registry (C5), and the stream negotiator (C6). All
//! three share the durable pool, the ephemeral TTL store, and the
//! in-process bus wired up by the HTTP front at startup.

pub mod deep_merge;
pub mod error;
pub mod negotiator;
pub mod state_engine;
pub mod stream_registry;
pub mod variables;

pub use error::{EngineError, EngineErrorKind};
pub use negotiator::{Negotiator, Offer};
pub use state_engine::StateEngine;
pub use stream_registry::{recommended_heartbeat_interval, StreamRegistry};
pub use variables::{validate, Direction, ValidationResult, VariableDefinition, VariableDefinitions, VariableType, Warning};
