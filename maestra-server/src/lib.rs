// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The HTTP front: wires the durable store, the ephemeral registry, the
//! bus, and the coordination engine behind a single `axum::Router`.
//! Route handlers never touch `anyhow`; everything here returns
//! `Result<_, ApiError>`.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use state::AppState;

/// Assembles every route family into one router. Static path segments
/// (`/entities/types`, `/entities/tree`, `/entities/by-slug/{slug}`, ...)
/// are registered before their sibling `/entities/{id}` routes so
/// `matchit`'s own literal-before-capture precedence does the right
/// thing with zero extra ordering logic here.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/status", get(routes::health::status))
        .route("/devices/register", post(routes::devices::register))
        .route("/devices/heartbeat", post(routes::devices::heartbeat))
        .route("/devices", get(routes::devices::list))
        .route("/devices/{id}", get(routes::devices::get).delete(routes::devices::delete))
        .route("/metrics", post(routes::sink::record_metric))
        .route("/metrics/batch", post(routes::sink::record_metrics_batch))
        .route("/events", post(routes::sink::record_event))
        .route(
            "/entities/types",
            get(routes::entity_types::list).post(routes::entity_types::create),
        )
        .route("/entities/types/by-name/{name}", get(routes::entity_types::get_by_name))
        .route("/entities/types/{id}", get(routes::entity_types::get_by_id))
        .route("/entities/tree", get(routes::entities::tree))
        .route("/entities/by-slug/{slug}", get(routes::entities::get_by_slug))
        .route("/entities/state/bulk-get", post(routes::state_ops::bulk_get))
        .route("/entities/state/bulk-update", post(routes::state_ops::bulk_update))
        .route("/entities", get(routes::entities::list).post(routes::entities::create))
        .route(
            "/entities/{id}",
            get(routes::entities::get_by_id).put(routes::entities::update).delete(routes::entities::delete),
        )
        .route("/entities/{id}/ancestors", get(routes::entities::ancestors))
        .route("/entities/{id}/descendants", get(routes::entities::descendants))
        .route("/entities/{id}/siblings", get(routes::entities::siblings))
        .route("/entities/{id}/state", get(routes::state_ops::get_state).patch(routes::state_ops::patch_state).put(routes::state_ops::put_state))
        .route(
            "/entities/{id}/variables",
            get(routes::variables::list).put(routes::variables::replace_all),
        )
        .route("/entities/{id}/variables/validate", post(routes::variables::validate))
        .route(
            "/entities/{id}/variables/{name}",
            post(routes::variables::upsert).put(routes::variables::upsert).delete(routes::variables::delete),
        )
        .route("/streams/sessions", get(routes::sessions::list))
        .route("/streams/sessions/history", get(routes::sessions::history))
        .route("/streams/sessions/{id}", delete(routes::sessions::stop))
        .route("/streams/sessions/{id}/heartbeat", post(routes::sessions::heartbeat))
        .route("/streams/advertise", post(routes::streams::advertise))
        .route("/streams", get(routes::streams::list))
        .route("/streams/{id}", get(routes::streams::get).delete(routes::streams::withdraw))
        .route("/streams/{id}/heartbeat", post(routes::streams::heartbeat))
        .route("/streams/{id}/request", post(routes::streams::request))
        .route("/streams/{id}/preview", get(routes::streams::preview))
        .route("/routing/state", get(routes::routing::state))
        .route(
            "/routing/devices",
            get(routes::routing::list_devices).post(routes::routing::create_device),
        )
        .route("/routing/devices/{id}", delete(routes::routing::delete_device))
        .route("/routing/routes", get(routes::routing::list_routes).post(routes::routing::create_route))
        .route("/routing/routes/{id}", delete(routes::routing::delete_route))
        .route(
            "/routing/presets",
            get(routes::routing::list_presets).post(routes::routing::create_preset),
        )
        .route("/routing/presets/{id}", delete(routes::routing::delete_preset))
        .route("/routing/presets/{id}/save", post(routes::routing::save_preset))
        .route("/routing/presets/{id}/recall", post(routes::routing::recall_preset))
        .route(
            "/analytics/annotations",
            get(routes::analytics::list_annotations).post(routes::analytics::create_annotation),
        )
        .route(
            "/analytics/annotations/{id}",
            put(routes::analytics::update_annotation).delete(routes::analytics::delete_annotation),
        )
        .route("/analytics/summary", get(routes::analytics::summary))
        .route("/analytics/export/metrics", get(routes::analytics::export_metrics))
        .route("/analytics/export/events", get(routes::analytics::export_events))
        .route("/analytics/export/states", get(routes::analytics::export_states))
        .route("/analytics/export/annotations", get(routes::analytics::export_annotations))
        .route("/analytics/export/sessions", get(routes::analytics::export_sessions))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}
