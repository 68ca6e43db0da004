// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Error returned by `maestra-preview` operations.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct PreviewError(#[from] PreviewErrorKind);

impl PreviewError {
    /// Unwraps the error into its [`PreviewErrorKind`].
    #[must_use]
    pub fn into_kind(self) -> PreviewErrorKind {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum PreviewErrorKind {
    /// The requested stream has no live record in the ephemeral registry.
    #[error("stream {0} is not live")]
    StreamNotLive(String),
    /// The negotiator or registry returned an error.
    #[error(transparent)]
    Engine(#[from] maestra_engine::EngineError),
    /// The UDP data-plane socket failed to bind or recv.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
