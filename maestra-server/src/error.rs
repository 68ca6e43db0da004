// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The HTTP front's error taxonomy: every handler returns `Result<_,
//! ApiError>`, and every variant renders as `{"detail": "..."}` with the
//! status code the taxonomy assigns it. `anyhow` is reserved for
//! `main`'s own startup failures; nothing in the request path uses it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use maestra_bus::BusErrorKind;
use maestra_engine::EngineErrorKind;
use maestra_preview::PreviewErrorKind;
use maestra_store::StoreErrorKind;
use serde_json::json;
use thiserror::Error;

/// The HTTP front's uniform error surface (§7 of the coordination-fabric
/// design notes): NotFound, Conflict, Validation, UpstreamTimeout,
/// UpstreamRejection, DependencyDown, Internal.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    UpstreamTimeout(String),
    #[error("{0}")]
    UpstreamRejection(String),
    #[error("{0}")]
    DependencyDown(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamRejection(_) => StatusCode::BAD_GATEWAY,
            Self::DependencyDown(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<maestra_store::StoreError> for ApiError {
    fn from(err: maestra_store::StoreError) -> Self {
        match err.into_kind() {
            StoreErrorKind::NotFound(kind, id) => Self::NotFound(format!("{kind} not found: {id}")),
            StoreErrorKind::Conflict(field, value) => Self::Conflict(format!("{field} already exists: {value}")),
            StoreErrorKind::CyclicParent(id) => {
                Self::Validation(format!("entity {id} cannot become a descendant of itself"))
            }
            StoreErrorKind::UnknownPort(device, port) => {
                Self::Validation(format!("device {device} has no port {port:?} among its declared ports"))
            }
            StoreErrorKind::Database(err) => Self::DependencyDown(err.to_string()),
        }
    }
}

impl From<maestra_engine::EngineError> for ApiError {
    fn from(err: maestra_engine::EngineError) -> Self {
        match err.into_kind() {
            EngineErrorKind::StreamNotLive(id) => Self::NotFound(format!("stream {id} is not live")),
            EngineErrorKind::SessionNotLive(id) => Self::NotFound(format!("session {id} is not live")),
            EngineErrorKind::NegotiationRejected(_, reason) => Self::UpstreamRejection(reason),
            EngineErrorKind::Store(err) => err.into(),
            EngineErrorKind::Ephemeral(err) => Self::Internal(err.to_string()),
            EngineErrorKind::Bus(err) => match err.into_kind() {
                BusErrorKind::Timeout(subject, _) => {
                    Self::UpstreamTimeout(format!("no reply on {subject} within the negotiation deadline"))
                }
                other => Self::DependencyDown(other.to_string()),
            },
            EngineErrorKind::MalformedRecord(kind, detail) => Self::Internal(format!("malformed {kind}: {detail}")),
        }
    }
}

impl From<maestra_preview::PreviewError> for ApiError {
    fn from(err: maestra_preview::PreviewError) -> Self {
        match err.into_kind() {
            PreviewErrorKind::StreamNotLive(id) => Self::NotFound(format!("stream {id} is not live")),
            PreviewErrorKind::Engine(err) => err.into(),
            PreviewErrorKind::Io(err) => Self::DependencyDown(err.to_string()),
        }
    }
}
