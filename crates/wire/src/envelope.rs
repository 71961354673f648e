// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Envelope codec: lead + header block + payload.
//!
//! The lead is fixed at 32 bytes: a 13-byte magic constant followed by
//! three tagged fields (protocol version, header size, payload size),
//! each encoded as `tag: u8, size: u16, value` with big-endian integers.
//! The header block is UTF-8 `key: value\n` lines; the payload is raw
//! bytes whose length the lead declares.
//!
//! Two decode paths exist on purpose. [`Envelope::decode`] is single-shot
//! and treats a short buffer as caller misuse. [`EnvelopeReader`] is the
//! resumable three-phase state machine used against non-blocking
//! transports, where short reads are normal and each phase keeps its
//! partial buffer across calls.

use crate::error::WireError;
use indexmap::IndexMap;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;

/// Lead magic constant, 13 bytes.
pub const MAGIC: [u8; 13] =
    [0xbe, 0xeb, 0xab, 0xba, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Size of an encoded lead.
pub const LEAD_SIZE: usize = 32;

/// Current protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

const TAG_PROTOCOL: u8 = 0;
const TAG_HEADER_SIZE: u8 = 5;
const TAG_PAYLOAD_SIZE: u8 = 6;

/// Decoded lead: protocol version plus the sizes of the two variable
/// sections that follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lead {
    pub protocol: u16,
    pub header_size: u32,
    pub payload_size: u32,
}

impl Lead {
    pub fn new(header_size: u32, payload_size: u32) -> Self {
        Self { protocol: PROTOCOL_VERSION, header_size, payload_size }
    }

    pub fn encode(&self) -> [u8; LEAD_SIZE] {
        let mut out = [0u8; LEAD_SIZE];
        out[..13].copy_from_slice(&MAGIC);
        let mut at = 13;
        at = put_field(&mut out, at, TAG_PROTOCOL, &self.protocol.to_be_bytes());
        at = put_field(&mut out, at, TAG_HEADER_SIZE, &self.header_size.to_be_bytes());
        put_field(&mut out, at, TAG_PAYLOAD_SIZE, &self.payload_size.to_be_bytes());
        out
    }

    /// Decode a lead from exactly [`LEAD_SIZE`] bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < LEAD_SIZE {
            return Err(WireError::InsufficientData { needed: LEAD_SIZE, have: buf.len() });
        }
        if buf[..13] != MAGIC {
            return Err(WireError::BadMagic);
        }

        let mut protocol = None;
        let mut header_size = None;
        let mut payload_size = None;

        let mut rest = &buf[13..LEAD_SIZE];
        while rest.len() >= 3 {
            let tag = rest[0];
            let size = u16::from_be_bytes([rest[1], rest[2]]) as usize;
            rest = &rest[3..];
            if rest.len() < size {
                return Err(WireError::MalformedLead { tag });
            }
            let value = &rest[..size];
            rest = &rest[size..];
            match (tag, size) {
                (TAG_PROTOCOL, 2) => protocol = Some(u16::from_be_bytes([value[0], value[1]])),
                (TAG_HEADER_SIZE, 4) => {
                    header_size = Some(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
                }
                (TAG_PAYLOAD_SIZE, 4) => {
                    payload_size =
                        Some(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
                }
                _ => return Err(WireError::MalformedLead { tag }),
            }
        }

        match (protocol, header_size, payload_size) {
            (Some(protocol), Some(header_size), Some(payload_size)) => {
                Ok(Self { protocol, header_size, payload_size })
            }
            _ => Err(WireError::MalformedLead { tag: 0xff }),
        }
    }

    /// Total encoded frame size this lead declares.
    pub fn frame_size(&self) -> usize {
        LEAD_SIZE + self.header_size as usize + self.payload_size as usize
    }
}

fn put_field(out: &mut [u8; LEAD_SIZE], at: usize, tag: u8, value: &[u8]) -> usize {
    out[at] = tag;
    out[at + 1..at + 3].copy_from_slice(&(value.len() as u16).to_be_bytes());
    out[at + 3..at + 3 + value.len()].copy_from_slice(value);
    at + 3 + value.len()
}

/// Ordered multimap of header lines.
///
/// Encoding order is canonical: `messageType`, `messageId`, `sessionId`,
/// `timeStamp` first, then remaining keys alphabetically; values within
/// one key are emitted sorted, one `key: value\n` line each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    entries: IndexMap<String, Vec<String>>,
}

const KEY_ORDER: [&str; 4] = ["messageType", "messageId", "sessionId", "timeStamp"];

impl HeaderBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `key`. Values may not contain newlines: a
    /// newline would desynchronize the line-oriented block.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), WireError> {
        let value = value.into();
        if value.contains('\n') {
            return Err(WireError::HeaderNewline(value));
        }
        self.entries.entry(key.into()).or_default().push(value);
        Ok(())
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort_by_key(|k| {
            let rank = KEY_ORDER.iter().position(|p| p == k).unwrap_or(KEY_ORDER.len());
            (rank, k.as_str())
        });

        let mut out = Vec::new();
        for key in keys {
            let mut values: Vec<&String> = self.entries[key.as_str()].iter().collect();
            values.sort();
            for value in values {
                out.extend_from_slice(key.as_bytes());
                out.extend_from_slice(b": ");
                out.extend_from_slice(value.as_bytes());
                out.push(b'\n');
            }
        }
        out
    }

    /// Parse a complete header block. Lines are `key: value`; a bare
    /// `key:` parses as an empty value.
    pub fn parse(buf: &[u8]) -> Result<Self, WireError> {
        let text = std::str::from_utf8(buf)
            .map_err(|_| WireError::MalformedHeader("<invalid utf-8>".to_string()))?;
        let mut block = Self::new();
        for line in text.split('\n') {
            if line.is_empty() {
                continue;
            }
            let (key, value) = match line.split_once(' ') {
                Some((key, value)) => (key, value),
                None => (line, ""),
            };
            let key = key
                .strip_suffix(':')
                .ok_or_else(|| WireError::MalformedHeader(line.to_string()))?;
            if key.is_empty() {
                return Err(WireError::MalformedHeader(line.to_string()));
            }
            block.append(key, value)?;
        }
        Ok(block)
    }
}

/// One wire frame: header block plus payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub headers: HeaderBlock,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(headers: HeaderBlock, payload: Vec<u8>) -> Self {
        Self { headers, payload }
    }

    /// Serialize the full frame.
    pub fn encode(&self) -> Vec<u8> {
        let header = self.headers.encode();
        let lead = Lead::new(header.len() as u32, self.payload.len() as u32);
        let mut out = Vec::with_capacity(LEAD_SIZE + header.len() + self.payload.len());
        out.extend_from_slice(&lead.encode());
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Serialize once for fan-out to several destinations.
    pub fn freeze(&self) -> FrozenEnvelope {
        FrozenEnvelope { bytes: Arc::from(self.encode().into_boxed_slice()) }
    }

    /// Single-shot decode of one frame from the front of `buf`.
    ///
    /// Returns the envelope and the number of bytes consumed. A buffer
    /// shorter than the declared frame is `InsufficientData` — use
    /// [`EnvelopeReader`] when short reads are legitimate.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), WireError> {
        let lead = Lead::decode(buf)?;
        let total = lead.frame_size();
        if buf.len() < total {
            return Err(WireError::InsufficientData { needed: total, have: buf.len() });
        }
        let header_end = LEAD_SIZE + lead.header_size as usize;
        let headers = HeaderBlock::parse(&buf[LEAD_SIZE..header_end])?;
        let payload = buf[header_end..total].to_vec();
        Ok((Self { headers, payload }, total))
    }
}

/// A frozen (serialized) envelope that hands out independent write
/// cursors, so one message can be streamed to many outputs concurrently
/// without re-serializing.
#[derive(Debug, Clone)]
pub struct FrozenEnvelope {
    bytes: Arc<[u8]>,
}

impl FrozenEnvelope {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn writer(&self) -> EnvelopeWriter {
        EnvelopeWriter { bytes: Arc::clone(&self.bytes), pos: 0 }
    }
}

/// Resumable write cursor over a [`FrozenEnvelope`].
#[derive(Debug)]
pub struct EnvelopeWriter {
    bytes: Arc<[u8]>,
    pos: usize,
}

impl EnvelopeWriter {
    /// Push remaining bytes into `writer`. Returns true once the whole
    /// frame has been written; a `WouldBlock` write pauses the cursor
    /// instead of failing.
    pub fn write_to(&mut self, writer: &mut dyn Write) -> Result<bool, WireError> {
        while self.pos < self.bytes.len() {
            match writer.write(&self.bytes[self.pos..]) {
                Ok(0) => return Err(WireError::ConnectionClosed),
                Ok(n) => self.pos += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    pub fn is_finished(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

enum ReadPhase {
    Lead { buf: Vec<u8> },
    Header { lead: Lead, buf: Vec<u8> },
    Payload { lead: Lead, headers: HeaderBlock, buf: Vec<u8> },
}

/// Resumable three-phase envelope reader.
///
/// Feed it any `Read`; each call makes as much progress as the reader
/// allows and parks partial state until the next call. With
/// `blocking = false` a dry reader yields `Ok(None)` instead of waiting.
pub struct EnvelopeReader {
    phase: ReadPhase,
}

impl Default for EnvelopeReader {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeReader {
    pub fn new() -> Self {
        Self { phase: ReadPhase::Lead { buf: Vec::new() } }
    }

    /// True when a partial frame is parked between calls.
    pub fn is_mid_frame(&self) -> bool {
        match &self.phase {
            ReadPhase::Lead { buf } => !buf.is_empty(),
            _ => true,
        }
    }

    /// Pull bytes from `reader` until an envelope completes, the reader
    /// runs dry (`Ok(None)`, only when not blocking), or an error occurs.
    pub fn read_from(
        &mut self,
        reader: &mut dyn Read,
        blocking: bool,
    ) -> Result<Option<Envelope>, WireError> {
        loop {
            match &mut self.phase {
                ReadPhase::Lead { buf } => {
                    if !fill(reader, buf, LEAD_SIZE, blocking)? {
                        return Ok(None);
                    }
                    let lead = Lead::decode(buf)?;
                    self.phase = ReadPhase::Header { lead, buf: Vec::new() };
                }
                ReadPhase::Header { lead, buf } => {
                    let want = lead.header_size as usize;
                    if !fill(reader, buf, want, blocking)? {
                        return Ok(None);
                    }
                    let headers = HeaderBlock::parse(buf)?;
                    let lead = *lead;
                    self.phase = ReadPhase::Payload { lead, headers, buf: Vec::new() };
                }
                ReadPhase::Payload { lead, headers, buf } => {
                    let want = lead.payload_size as usize;
                    if !fill(reader, buf, want, blocking)? {
                        return Ok(None);
                    }
                    let envelope =
                        Envelope { headers: std::mem::take(headers), payload: std::mem::take(buf) };
                    self.phase = ReadPhase::Lead { buf: Vec::new() };
                    return Ok(Some(envelope));
                }
            }
        }
    }
}

/// Grow `buf` toward `want` bytes. Returns true when full. A dry reader
/// (zero-byte read or `WouldBlock`) returns false unless `blocking`, in
/// which case EOF mid-frame is a closed connection.
fn fill(
    reader: &mut dyn Read,
    buf: &mut Vec<u8>,
    want: usize,
    blocking: bool,
) -> Result<bool, WireError> {
    while buf.len() < want {
        let mut chunk = vec![0u8; want - buf.len()];
        match reader.read(&mut chunk) {
            Ok(0) => {
                if blocking {
                    return Err(WireError::ConnectionClosed);
                }
                return Ok(false);
            }
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if blocking {
                    continue;
                }
                return Ok(false);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
