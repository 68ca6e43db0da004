// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The SSE Preview Proxy (C7): lets a browser watch a stream it can't
//! speak UDP to. Decodes the handful of datagram formats publishers use
//! (SDRF spectrum frames, JSON-ish control messages, raw PCM audio) and
//! re-emits them as Server-Sent Events, negotiating its own session
//! through `maestra-engine`'s negotiator like any other consumer would.

pub mod decoders;
pub mod error;
pub mod proxy;

pub use decoders::{decode_for_stream_type, SpectrumFrame, SDRF_HEADER_LEN, SDRF_MAGIC};
pub use error::{PreviewError, PreviewErrorKind};
pub use proxy::{preview_stream, PreviewEvent};
