// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message headers and the relayed message unit.
//!
//! A message is `(headers, payload bytes)`. Headers are eagerly
//! available; payload bytes stay undecoded until somebody asks a
//! [`crate::MessageRegistry`] for the typed body. Relay paths never ask.

use crate::envelope::{Envelope, HeaderBlock};
use crate::error::WireError;
use indexmap::IndexMap;
use rmake_core::{Clock, MessageId, SessionId};

/// A header value: strings, ints, and floats only.
#[derive(Debug, Clone)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl HeaderValue {
    /// Canonical wire form; what lands in the header block.
    pub fn wire_form(&self) -> String {
        match self {
            HeaderValue::Str(s) => s.clone(),
            HeaderValue::Int(i) => i.to_string(),
            HeaderValue::Float(f) => f.to_string(),
        }
    }
}

// Two values are the same header if they freeze identically; a decoded
// Str("7") equals the Int(7) it came from.
impl PartialEq for HeaderValue {
    fn eq(&self, other: &Self) -> bool {
        self.wire_form() == other.wire_form()
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        HeaderValue::Str(s.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        HeaderValue::Str(s)
    }
}

impl From<i64> for HeaderValue {
    fn from(i: i64) -> Self {
        HeaderValue::Int(i)
    }
}

impl From<u64> for HeaderValue {
    fn from(i: u64) -> Self {
        HeaderValue::Int(i as i64)
    }
}

impl From<f64> for HeaderValue {
    fn from(f: f64) -> Self {
        HeaderValue::Float(f)
    }
}

/// Flat, single-valued message headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    fields: IndexMap<String, HeaderValue>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<HeaderValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.fields.get(key).map(HeaderValue::wire_form)
    }

    /// Required string header, typed error when absent.
    pub fn require_str(&self, key: &'static str) -> Result<String, WireError> {
        self.get_str(key).ok_or(WireError::MissingHeader(key))
    }

    pub fn require_i64(&self, key: &'static str) -> Result<i64, WireError> {
        let raw = self.require_str(key)?;
        raw.parse().map_err(|_| WireError::HeaderType { name: key, expected: "int", value: raw })
    }

    pub fn require_u64(&self, key: &'static str) -> Result<u64, WireError> {
        let raw = self.require_str(key)?;
        raw.parse().map_err(|_| WireError::HeaderType {
            name: key,
            expected: "unsigned int",
            value: raw,
        })
    }

    pub fn get_f64(&self, key: &'static str) -> Result<Option<f64>, WireError> {
        match self.get_str(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| WireError::HeaderType { name: key, expected: "float", value: raw }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    // Well-known fields.

    pub fn message_type(&self) -> Option<String> {
        self.get_str("messageType")
    }

    pub fn message_id(&self) -> Option<MessageId> {
        self.get_str("messageId").map(MessageId::new)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.get_str("sessionId").map(SessionId::new)
    }

    pub fn time_stamp(&self) -> Result<Option<f64>, WireError> {
        self.get_f64("timeStamp")
    }

    pub fn destination(&self) -> Option<String> {
        self.get_str("destination")
    }

    pub fn target_id(&self) -> Option<SessionId> {
        self.get_str("targetId").filter(|t| !t.is_empty()).map(SessionId::new)
    }

    fn to_block(&self) -> Result<HeaderBlock, WireError> {
        let mut block = HeaderBlock::new();
        for (key, value) in &self.fields {
            block.append(key.clone(), value.wire_form())?;
        }
        Ok(block)
    }

    fn from_block(block: &HeaderBlock) -> Self {
        let mut headers = Self::new();
        // Duplicate keys collapse to the last value; typed messages only
        // ever stamp single-valued headers.
        for (key, value) in block.iter() {
            headers.set(key, value);
        }
        headers
    }
}

/// The unit the bus routes: eagerly parsed headers, undecoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub headers: Headers,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(headers: Headers, payload: Vec<u8>) -> Self {
        Self { headers, payload }
    }

    pub fn to_envelope(&self) -> Result<Envelope, WireError> {
        Ok(Envelope::new(self.headers.to_block()?, self.payload.clone()))
    }

    pub fn from_envelope(envelope: Envelope) -> Self {
        Self { headers: Headers::from_block(&envelope.headers), payload: envelope.payload }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        Ok(self.to_envelope()?.encode())
    }

    /// True once the message carries an id and timestamp.
    pub fn is_stamped(&self) -> bool {
        self.headers.contains("messageId") && self.headers.contains("timeStamp")
    }

    /// Route this message to a destination, optionally to one session only.
    pub fn direct(&mut self, destination: &str, target_id: Option<&SessionId>) {
        self.headers.set("destination", destination);
        if let Some(target) = target_id {
            self.headers.set("targetId", target.as_str());
        }
    }
}

/// Stamps outbound messages with `sessionId:counter` ids and wallclock
/// timestamps before serialization.
#[derive(Debug)]
pub struct Stamper {
    session_id: SessionId,
    counter: u64,
}

impl Stamper {
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id, counter: 0 }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Stamp `message` if it has not been stamped already. A `sessionId`
    /// the body placed itself (the CONNECTED reply carries the minted
    /// session there) is left alone.
    pub fn stamp(&mut self, message: &mut Message, clock: &impl Clock) {
        if message.is_stamped() {
            return;
        }
        let id = format!("{}:{}", self.session_id, self.counter);
        self.counter += 1;
        message.headers.set("messageId", id);
        if !message.headers.contains("sessionId") {
            message.headers.set("sessionId", self.session_id.as_str());
        }
        message.headers.set("timeStamp", clock.epoch_secs());
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
