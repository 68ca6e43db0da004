// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-process TTL registry backing ephemeral records (streams, sessions):
//! a keyed hash with per-key expiry plus named index sets, swept in the
//! background rather than relying on an external key-value service.

pub mod error;
pub mod index;
pub mod store;

pub use error::{EphemeralError, EphemeralErrorKind};
pub use index::IndexSets;
pub use store::{spawn_sweeper, TtlStore};

/// TTL applied to every stream and session record, per the 30 second
/// eviction window.
pub const RECORD_TTL: std::time::Duration = std::time::Duration::from_secs(30);
