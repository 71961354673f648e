// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame extraction over byte streams.
//!
//! [`FrameReader`] is the sans-io side: feed it whatever chunks the
//! transport produced and pull out complete messages. [`read_message`] /
//! [`write_message`] are the async side for tokio streams.

use crate::envelope::{Envelope, HeaderBlock, Lead, LEAD_SIZE};
use crate::error::WireError;
use crate::message::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Incremental frame extractor over arbitrarily chunked input.
///
/// A bad magic poisons the reader permanently: once framing is lost
/// there is no way to resynchronize, so every later call keeps failing
/// and the caller must drop the connection.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: Vec<u8>,
    poisoned: bool,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes received from the transport.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet consumed by a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Extract the next complete message, if the buffer holds one.
    ///
    /// Call in a loop after each [`feed`](Self::feed): one chunk can
    /// complete several frames.
    pub fn next_message(&mut self) -> Result<Option<Message>, WireError> {
        if self.poisoned {
            return Err(WireError::BadMagic);
        }
        if self.buf.len() < LEAD_SIZE {
            return Ok(None);
        }
        let lead = match Lead::decode(&self.buf[..LEAD_SIZE]) {
            Ok(lead) => lead,
            Err(err) => {
                self.poisoned = true;
                return Err(err);
            }
        };
        if self.buf.len() < lead.frame_size() {
            return Ok(None);
        }
        let (envelope, consumed) = Envelope::decode(&self.buf)?;
        self.buf.drain(..consumed);
        Ok(Some(Message::from_envelope(envelope)))
    }
}

fn closed_on_eof(err: std::io::Error) -> WireError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        WireError::ConnectionClosed
    } else {
        WireError::Io(err)
    }
}

/// Read one complete message from an async stream.
pub async fn read_message<R>(reader: &mut R) -> Result<Message, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut lead_buf = [0u8; LEAD_SIZE];
    reader.read_exact(&mut lead_buf).await.map_err(closed_on_eof)?;
    let lead = Lead::decode(&lead_buf)?;

    let mut header_buf = vec![0u8; lead.header_size as usize];
    reader.read_exact(&mut header_buf).await.map_err(closed_on_eof)?;
    let headers = HeaderBlock::parse(&header_buf)?;

    let mut payload = vec![0u8; lead.payload_size as usize];
    reader.read_exact(&mut payload).await.map_err(closed_on_eof)?;

    Ok(Message::from_envelope(Envelope::new(headers, payload)))
}

/// Serialize and write one message to an async stream.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = message.encode()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "framing_tests.rs"]
mod tests;
