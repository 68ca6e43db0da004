// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Error returned by `maestra-engine` operations.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct EngineError(#[from] EngineErrorKind);

impl EngineError {
    /// Unwraps the error into its [`EngineErrorKind`].
    #[must_use]
    pub fn into_kind(self) -> EngineErrorKind {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum EngineErrorKind {
    /// The referenced stream has no live record in the ephemeral
    /// registry (never advertised, withdrawn, or expired).
    #[error("stream {0} is not live")]
    StreamNotLive(String),
    /// The referenced session has no live record.
    #[error("session {0} is not live")]
    SessionNotLive(String),
    /// The publisher rejected the negotiation request.
    #[error("publisher rejected negotiation for stream {0}: {1}")]
    NegotiationRejected(String, String),
    /// The durable store returned an error.
    #[error(transparent)]
    Store(#[from] maestra_store::StoreError),
    /// The ephemeral registry returned an error.
    #[error(transparent)]
    Ephemeral(#[from] maestra_ephemeral::EphemeralError),
    /// The bus returned an error (e.g. the negotiation request timed out).
    #[error(transparent)]
    Bus(#[from] maestra_bus::BusError),
    /// A stored record failed to deserialize back into its expected shape.
    #[error("malformed {0} record: {1}")]
    MalformedRecord(&'static str, String),
}
