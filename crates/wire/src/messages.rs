// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed message bodies and the decode table.
//!
//! Scalar, routable fields ride in headers; structured data rides in the
//! JSON payload. [`MessageRegistry`] is built once at startup and passed
//! wherever decoding happens — there is no global registry. Tags nobody
//! registered decode to [`MessageBody::Unknown`] so a relay hop never
//! fails on a message type it does not understand.

use crate::error::WireError;
use crate::message::{Headers, Message};
use rmake_core::{
    Command, CommandId, CommandSpec, CommandState, FailureReason, Flavor, JobEvent, JobId,
    NodeDescriptor, NodeTelemetry, SessionId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bus destinations the core publishes and subscribes on.
pub mod destinations {
    pub const COMMAND: &str = "/command";
    pub const REGISTER: &str = "/register";
    pub const EVENT: &str = "/event";
    pub const NODE_STATUS: &str = "/nodestatus";
    pub const COMMAND_STATUS: &str = "/commandstatus";
    pub const INTERNAL_NODES: &str = "/internal/nodes";
}

const CONNECT: &str = "CONNECT";
const CONNECTED: &str = "CONNECTED";
const SUBSCRIBE: &str = "SUBSCRIBE";
const REGISTER_NODE: &str = "REGISTER_NODE";
const NODE_INFO: &str = "NODE_INFO";
const NODE_STATUS: &str = "NODE_STATUS";
const EVENT: &str = "EVENT";
const COMMAND_STATUS: &str = "COMMAND_STATUS";
const BUILD_COMMAND: &str = "BUILD_COMMAND";
const RESOLVE_COMMAND: &str = "RESOLVE_COMMAND";
const ACTION_COMMAND: &str = "ACTION_COMMAND";
const STOP_COMMAND: &str = "STOP_COMMAND";

/// Session liveness notices the bus publishes on `/internal/nodes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatusKind {
    Connected,
    Reconnected,
    Disconnected,
}

rmake_core::simple_display! {
    NodeStatusKind {
        Connected => "CONNECTED",
        Reconnected => "RECONNECTED",
        Disconnected => "DISCONNECTED",
    }
}

impl std::str::FromStr for NodeStatusKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECTED" => Ok(NodeStatusKind::Connected),
            "RECONNECTED" => Ok(NodeStatusKind::Reconnected),
            "DISCONNECTED" => Ok(NodeStatusKind::Disconnected),
            other => Err(format!("unknown node status {other:?}")),
        }
    }
}

/// A decoded message body.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Client handshake; first message on every connection.
    Connect {
        user: String,
        password: String,
        session_class: String,
        subscriptions: Vec<String>,
    },
    /// Bus acknowledgement carrying the assigned session id.
    Connected { session_id: SessionId },
    Subscribe { destination: String },
    RegisterNode { node: NodeDescriptor },
    /// Periodic worker heartbeat.
    NodeInfo {
        telemetry: NodeTelemetry,
        active_command_ids: Vec<CommandId>,
    },
    /// Bus-emitted session liveness notice.
    NodeStatus { status_id: SessionId, status: NodeStatusKind },
    Command(Command),
    CommandStatus {
        command_id: CommandId,
        state: CommandState,
        failure_reason: Option<FailureReason>,
    },
    EventList { job_id: JobId, events: Vec<JobEvent> },
    /// A tag nobody registered; carried verbatim for relaying.
    Unknown { message_type: String, raw: Vec<u8> },
}

#[derive(Serialize, Deserialize)]
struct ConnectPayload {
    #[serde(default)]
    subscriptions: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct RegisterNodePayload {
    node: NodeDescriptor,
}

#[derive(Serialize, Deserialize)]
struct NodeInfoPayload {
    telemetry: NodeTelemetry,
    #[serde(default)]
    commands: Vec<CommandId>,
}

#[derive(Serialize, Deserialize)]
struct CommandPayload {
    #[serde(default)]
    requires_chroot: bool,
    #[serde(default)]
    required_flavors: Vec<Flavor>,
    #[serde(flatten)]
    spec: CommandSpec,
}

#[derive(Serialize, Deserialize)]
struct CommandStatusPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_reason: Option<FailureReason>,
}

#[derive(Serialize, Deserialize)]
struct EventListPayload {
    events: Vec<JobEvent>,
}

impl MessageBody {
    pub fn message_type(&self) -> &str {
        match self {
            MessageBody::Connect { .. } => CONNECT,
            MessageBody::Connected { .. } => CONNECTED,
            MessageBody::Subscribe { .. } => SUBSCRIBE,
            MessageBody::RegisterNode { .. } => REGISTER_NODE,
            MessageBody::NodeInfo { .. } => NODE_INFO,
            MessageBody::NodeStatus { .. } => NODE_STATUS,
            MessageBody::Command(command) => match command.spec {
                CommandSpec::Build { .. } => BUILD_COMMAND,
                CommandSpec::Resolve { .. } => RESOLVE_COMMAND,
                CommandSpec::Action { .. } => ACTION_COMMAND,
                CommandSpec::Stop { .. } => STOP_COMMAND,
            },
            MessageBody::CommandStatus { .. } => COMMAND_STATUS,
            MessageBody::EventList { .. } => EVENT,
            MessageBody::Unknown { message_type, .. } => message_type,
        }
    }

    /// Freeze this body into a relayable message: type-specific scalars
    /// become headers, structured fields become the JSON payload.
    pub fn into_message(self) -> Result<Message, WireError> {
        let mut headers = Headers::new();
        headers.set("messageType", self.message_type());

        let payload = match self {
            MessageBody::Connect { user, password, session_class, subscriptions } => {
                headers.set("user", user);
                headers.set("password", password);
                headers.set("sessionClass", session_class);
                serde_json::to_vec(&ConnectPayload { subscriptions })?
            }
            MessageBody::Connected { session_id } => {
                headers.set("sessionId", session_id.as_str());
                Vec::new()
            }
            MessageBody::Subscribe { destination } => {
                headers.set("destination", destination);
                Vec::new()
            }
            MessageBody::RegisterNode { node } => {
                headers.set("nodeType", "WORKER");
                serde_json::to_vec(&RegisterNodePayload { node })?
            }
            MessageBody::NodeInfo { telemetry, active_command_ids } => {
                serde_json::to_vec(&NodeInfoPayload { telemetry, commands: active_command_ids })?
            }
            MessageBody::NodeStatus { status_id, status } => {
                headers.set("statusId", status_id.as_str());
                headers.set("status", status.to_string());
                Vec::new()
            }
            MessageBody::Command(command) => {
                headers.set("commandId", command.command_id.as_str());
                headers.set("jobId", command.job_id.0);
                if let Some(target_node) = &command.target_node {
                    headers.set("targetNode", target_node.as_str());
                }
                if let CommandSpec::Stop { target_command_id } = &command.spec {
                    headers.set("targetCommandId", target_command_id.as_str());
                }
                serde_json::to_vec(&CommandPayload {
                    requires_chroot: command.requires_chroot,
                    required_flavors: command.required_flavors,
                    spec: command.spec,
                })?
            }
            MessageBody::CommandStatus { command_id, state, failure_reason } => {
                headers.set("commandId", command_id.as_str());
                headers.set("status", state.to_string());
                serde_json::to_vec(&CommandStatusPayload { failure_reason })?
            }
            MessageBody::EventList { job_id, events } => {
                headers.set("jobId", job_id.0);
                serde_json::to_vec(&EventListPayload { events })?
            }
            MessageBody::Unknown { raw, .. } => raw,
        };

        Ok(Message::new(headers, payload))
    }
}

type DecodeFn = fn(&Headers, &[u8]) -> Result<MessageBody, WireError>;

/// Explicit tag → decoder table.
pub struct MessageRegistry {
    table: HashMap<&'static str, DecodeFn>,
}

impl MessageRegistry {
    /// Empty table; only useful as a base for custom protocols.
    pub fn new() -> Self {
        Self { table: HashMap::new() }
    }

    /// The standard rMake message set.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(CONNECT, decode_connect);
        registry.register(CONNECTED, decode_connected);
        registry.register(SUBSCRIBE, decode_subscribe);
        registry.register(REGISTER_NODE, decode_register_node);
        registry.register(NODE_INFO, decode_node_info);
        registry.register(NODE_STATUS, decode_node_status);
        registry.register(EVENT, decode_event_list);
        registry.register(COMMAND_STATUS, decode_command_status);
        registry.register(BUILD_COMMAND, decode_command);
        registry.register(RESOLVE_COMMAND, decode_command);
        registry.register(ACTION_COMMAND, decode_command);
        registry.register(STOP_COMMAND, decode_command);
        registry
    }

    pub fn register(&mut self, tag: &'static str, decode: DecodeFn) {
        self.table.insert(tag, decode);
    }

    /// Decode the typed body of `message`. Unregistered tags come back
    /// as [`MessageBody::Unknown`]; a missing `messageType` header is the
    /// only hard failure.
    pub fn decode(&self, message: &Message) -> Result<MessageBody, WireError> {
        let tag = message.headers.require_str("messageType")?;
        match self.table.get(tag.as_str()) {
            Some(decode) => decode(&message.headers, &message.payload),
            None => Ok(MessageBody::Unknown { message_type: tag, raw: message.payload.clone() }),
        }
    }
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn payload<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn decode_connect(headers: &Headers, bytes: &[u8]) -> Result<MessageBody, WireError> {
    let body: ConnectPayload = payload(bytes)?;
    Ok(MessageBody::Connect {
        user: headers.require_str("user")?,
        password: headers.require_str("password")?,
        session_class: headers.get_str("sessionClass").unwrap_or_default(),
        subscriptions: body.subscriptions,
    })
}

fn decode_connected(headers: &Headers, _bytes: &[u8]) -> Result<MessageBody, WireError> {
    Ok(MessageBody::Connected { session_id: SessionId::new(headers.require_str("sessionId")?) })
}

fn decode_subscribe(headers: &Headers, _bytes: &[u8]) -> Result<MessageBody, WireError> {
    Ok(MessageBody::Subscribe { destination: headers.require_str("destination")? })
}

fn decode_register_node(_headers: &Headers, bytes: &[u8]) -> Result<MessageBody, WireError> {
    let body: RegisterNodePayload = payload(bytes)?;
    Ok(MessageBody::RegisterNode { node: body.node })
}

fn decode_node_info(_headers: &Headers, bytes: &[u8]) -> Result<MessageBody, WireError> {
    let body: NodeInfoPayload = payload(bytes)?;
    Ok(MessageBody::NodeInfo { telemetry: body.telemetry, active_command_ids: body.commands })
}

fn decode_node_status(headers: &Headers, _bytes: &[u8]) -> Result<MessageBody, WireError> {
    let raw = headers.require_str("status")?;
    let status = raw.parse().map_err(|_| WireError::HeaderType {
        name: "status",
        expected: "node status",
        value: raw,
    })?;
    Ok(MessageBody::NodeStatus {
        status_id: SessionId::new(headers.require_str("statusId")?),
        status,
    })
}

fn decode_event_list(headers: &Headers, bytes: &[u8]) -> Result<MessageBody, WireError> {
    let body: EventListPayload = payload(bytes)?;
    Ok(MessageBody::EventList {
        job_id: JobId::new(headers.require_u64("jobId")?),
        events: body.events,
    })
}

fn decode_command_status(headers: &Headers, bytes: &[u8]) -> Result<MessageBody, WireError> {
    let raw = headers.require_str("status")?;
    let state = raw.parse().map_err(|_| WireError::HeaderType {
        name: "status",
        expected: "command state",
        value: raw,
    })?;
    let body: CommandStatusPayload = payload(bytes)?;
    Ok(MessageBody::CommandStatus {
        command_id: CommandId::new(headers.require_str("commandId")?),
        state,
        failure_reason: body.failure_reason,
    })
}

fn decode_command(headers: &Headers, bytes: &[u8]) -> Result<MessageBody, WireError> {
    let body: CommandPayload = payload(bytes)?;
    Ok(MessageBody::Command(Command {
        command_id: CommandId::new(headers.require_str("commandId")?),
        job_id: JobId::new(headers.require_u64("jobId")?),
        target_node: headers.get_str("targetNode").filter(|t| !t.is_empty()).map(SessionId::new),
        requires_chroot: body.requires_chroot,
        required_flavors: body.required_flavors,
        spec: body.spec,
    }))
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
