// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message-bus wire protocol.
//!
//! Wire format: 32-byte lead (13-byte magic + tagged protocol-version,
//! header-size, and payload-size fields) + UTF-8 `key: value\n` header
//! block + raw payload bytes. Payload bodies are JSON; the framing is
//! agnostic to that choice.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod envelope;
mod error;
mod framing;
mod message;
mod messages;

pub use envelope::{
    Envelope, EnvelopeReader, EnvelopeWriter, FrozenEnvelope, HeaderBlock, Lead, LEAD_SIZE, MAGIC,
    PROTOCOL_VERSION,
};
pub use error::WireError;
pub use framing::{read_message, write_message, FrameReader};
pub use message::{HeaderValue, Headers, Message, Stamper};
pub use messages::{destinations, MessageBody, MessageRegistry, NodeStatusKind};
