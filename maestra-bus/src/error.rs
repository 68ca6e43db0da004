// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Error returned by [`crate::Bus`] operations.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct BusError(#[from] BusErrorKind);

impl BusError {
    /// Unwraps the error into its [`BusErrorKind`].
    #[must_use]
    pub fn into_kind(self) -> BusErrorKind {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum BusErrorKind {
    /// A subject or topic pattern failed validation (empty, contains an
    /// internal wildcard where only a trailing one is allowed, etc).
    #[error("invalid pattern {0:?}: {1}")]
    InvalidPattern(String, &'static str),
    /// No reply arrived on the correlation subject before the deadline.
    #[error("request on {0:?} timed out after {1:?}")]
    Timeout(String, std::time::Duration),
    /// The request channel was dropped before a reply was observed.
    #[error("request on {0:?} was cancelled")]
    Cancelled(String),
}
