// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Route handler modules, one per resource family. Wired into a single
//! [`axum::Router`] by [`crate::build_router`].

pub mod analytics;
pub mod devices;
pub mod entities;
pub mod entity_types;
pub mod health;
pub mod routing;
pub mod sessions;
pub mod sink;
pub mod state_ops;
pub mod streams;
pub mod variables;
