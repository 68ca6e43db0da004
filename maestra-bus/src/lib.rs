// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dual fan-out event bus: a NATS-style dotted subject tree and an
//! MQTT-style slash topic tree, bridged together, plus a correlation-id
//! request/reply primitive layered on top of the subject tree.

pub mod bridge;
pub mod bus;
pub mod error;
pub mod request_reply;
pub mod subject_tree;
pub mod topic_tree;

pub use bus::{Envelope, InProcessBus, Subscription};
pub use error::{BusError, BusErrorKind};
pub use request_reply::{request, reply, RequestOptions, RequestOptionsBuilder, DEFAULT_REQUEST_TIMEOUT};
