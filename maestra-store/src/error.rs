// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Error returned by `maestra-store` operations.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct StoreError(#[from] StoreErrorKind);

impl StoreError {
    /// Unwraps the error into its [`StoreErrorKind`].
    #[must_use]
    pub fn into_kind(self) -> StoreErrorKind {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum StoreErrorKind {
    /// No row matched the given id/slug/name.
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),
    /// A unique constraint would be violated (slug, hardware_id, type name,
    /// active route tuple).
    #[error("{0} already exists: {1}")]
    Conflict(&'static str, String),
    /// The requested mutation would create a cycle in the entity parent
    /// chain.
    #[error("entity {0} cannot become a descendant of itself")]
    CyclicParent(String),
    /// A route referenced a port the device didn't declare.
    #[error("device {0} has no port {1:?} among its declared ports")]
    UnknownPort(String, String),
    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
