// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Error returned by [`crate::store::TtlStore`] operations.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct EphemeralError(#[from] EphemeralErrorKind);

impl EphemeralError {
    /// Unwraps the error into its [`EphemeralErrorKind`].
    #[must_use]
    pub fn into_kind(self) -> EphemeralErrorKind {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum EphemeralErrorKind {
    /// The key is missing or its TTL has already lapsed.
    #[error("key {0:?} not found or expired")]
    NotFound(String),
    /// `hset_field` was called against a value that isn't a JSON object.
    #[error("key {0:?} does not hold an object, cannot set field {1:?}")]
    NotAnObject(String, String),
}
