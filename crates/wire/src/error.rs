// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    /// The lead's magic bytes are wrong. Framing is desynchronized and
    /// the connection cannot be trusted again; callers must drop it.
    #[error("bad lead magic")]
    BadMagic,

    /// A single-shot decode was handed fewer bytes than the frame
    /// declares. This is caller misuse, not a partial network read — the
    /// resumable reader never produces it.
    #[error("insufficient data: need {needed} bytes, have {have}")]
    InsufficientData { needed: usize, have: usize },

    #[error("malformed lead field (tag {tag})")]
    MalformedLead { tag: u8 },

    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error("header value may not contain newlines: {0:?}")]
    HeaderNewline(String),

    #[error("missing required header {0:?}")]
    MissingHeader(&'static str),

    #[error("header {name:?} is not a valid {expected}: {value:?}")]
    HeaderType { name: &'static str, expected: &'static str, value: String },

    #[error("payload decode failed: {0}")]
    PayloadDecode(#[from] serde_json::Error),

    /// The peer closed the connection mid-frame.
    #[error("connection closed")]
    ConnectionClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
