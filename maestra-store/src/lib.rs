// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Durable catalog: entity types, entities, devices, the routing graph,
//! stream types, and the append-only history sink. Backed by Postgres
//! via `sqlx`, with runtime-bound queries (`sqlx::query_as`) rather than
//! the compile-time-checked `query!` macro, since nothing here assumes a
//! live database at build time.

pub mod db;
pub mod error;
pub mod models;

pub use db::connect;
pub use error::{StoreError, StoreErrorKind};
pub use models::annotation::{AnalyticsSummary, Annotation, SinkRow};
pub use models::collection_config::{CollectionConfigRow, Verbosity};
pub use models::device::Device;
pub use models::entity::{normalize_tags, DeleteMode, Entity, EntityFilter};
pub use models::entity_type::EntityType;
pub use models::history::{SessionHistoryRow, StateHistoryRow};
pub use models::routing::{Route, RoutingDevice, RoutePreset};
pub use models::stream_type::{StreamType, CONNECTION_INFO_TYPES, PROXYABLE_TYPES};
