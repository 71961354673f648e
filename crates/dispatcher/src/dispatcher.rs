// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduling core.
//!
//! One task owns all dispatcher state and consumes its bus session's
//! inbound stream; handlers never block on anything but the bus mailbox,
//! so no lock is ever held across an await.
//!
//! Every command is in exactly one of three places: the queue, the
//! `assigned` map, or gone (terminal). Assignment is level-triggered:
//! any change that could make an assignment possible runs a full pass
//! over the queue, and a pass that finds nothing to do is free.

use crate::bus::{BusError, BusHandle};
use crate::queue::CommandQueue;
use crate::registry::NodeRegistry;
use crate::relay::{EventRelay, StateSink};
use rmake_core::{Command, CommandId, FlavorMatcher, SessionId};
use rmake_wire::{destinations, Message, MessageBody, MessageRegistry, NodeStatusKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Session class the bus files dispatcher connections under.
pub const SESSION_CLASS: &str = "DSP";

/// Destinations the dispatcher listens on.
pub const SUBSCRIPTIONS: [&str; 6] = [
    destinations::REGISTER,
    destinations::COMMAND,
    destinations::EVENT,
    destinations::NODE_STATUS,
    destinations::COMMAND_STATUS,
    destinations::INTERNAL_NODES,
];

pub struct Dispatcher {
    bus: BusHandle,
    session_id: SessionId,
    inbound: mpsc::Receiver<Message>,
    decoder: MessageRegistry,
    matcher: Arc<dyn FlavorMatcher>,
    registry: NodeRegistry,
    queue: CommandQueue,
    assigned: HashMap<CommandId, (SessionId, Command)>,
    relay: Arc<EventRelay>,
    state_sink: Arc<dyn StateSink>,
}

impl Dispatcher {
    /// Attach to the bus as an in-process session and build an idle
    /// dispatcher. Call [`run`](Self::run) to start scheduling.
    pub async fn attach(
        bus: BusHandle,
        matcher: Arc<dyn FlavorMatcher>,
        relay: Arc<EventRelay>,
        state_sink: Arc<dyn StateSink>,
    ) -> Result<Self, BusError> {
        let (session_id, inbound) = bus.attach(SESSION_CLASS, &SUBSCRIPTIONS).await?;
        Ok(Self {
            bus,
            session_id,
            inbound,
            decoder: MessageRegistry::standard(),
            matcher,
            registry: NodeRegistry::new(),
            queue: CommandQueue::new(),
            assigned: HashMap::new(),
            relay,
            state_sink,
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    /// Node a command is currently assigned to, if any.
    pub fn assigned_node(&self, command_id: &CommandId) -> Option<&SessionId> {
        self.assigned.get(command_id).map(|(session, _)| session)
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!(session = %self.session_id, "dispatcher running");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = self.inbound.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => break,
                },
            }
        }
        info!(session = %self.session_id, "dispatcher stopped");
    }

    async fn handle_message(&mut self, message: Message) {
        let sender = message.headers.session_id();
        let body = match self.decoder.decode(&message) {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "undecodable message dropped");
                return;
            }
        };

        match body {
            MessageBody::RegisterNode { node } => {
                let Some(sender) = sender else {
                    warn!("node registration without a session id");
                    return;
                };
                self.state_sink.node_registered(&sender, &node).await;
                self.registry.register(sender, node);
                self.assignment_pass().await;
            }

            MessageBody::NodeInfo { telemetry, active_command_ids } => {
                let Some(sender) = sender else { return };
                let freed = self.registry.heartbeat(&sender, telemetry, &active_command_ids);
                self.requeue(freed);
                self.assignment_pass().await;
            }

            MessageBody::Command(command) => {
                if command.is_stop() {
                    self.handle_stop(command).await;
                } else if self.queue.contains(&command.command_id)
                    || self.assigned.contains_key(&command.command_id)
                {
                    warn!(command = %command.command_id, "duplicate submission ignored");
                } else {
                    debug!(command = %command.command_id, job = %command.job_id, "command queued");
                    self.queue.push_back(command);
                    self.assignment_pass().await;
                }
            }

            MessageBody::CommandStatus { command_id, state, failure_reason } => {
                if !state.is_terminal() {
                    debug!(command = %command_id, "command in progress");
                    return;
                }
                self.state_sink
                    .command_finished(&command_id, state, failure_reason.as_ref())
                    .await;
                match self.assigned.remove(&command_id) {
                    Some((session, _)) => {
                        self.registry.release(&session, &command_id);
                        info!(command = %command_id, %state, "command finished");
                        self.assignment_pass().await;
                    }
                    None => debug!(command = %command_id, "terminal status for untracked command"),
                }
            }

            MessageBody::NodeStatus { status_id, status } => {
                if status == NodeStatusKind::Disconnected && self.registry.contains(&status_id) {
                    info!(session = %status_id, "node disconnected");
                    let freed = self.registry.remove(&status_id);
                    self.state_sink.node_removed(&status_id).await;
                    self.requeue(freed);
                    self.assignment_pass().await;
                }
            }

            MessageBody::EventList { job_id, events } => {
                self.relay.relay(job_id, &events).await;
            }

            MessageBody::Connect { .. }
            | MessageBody::Connected { .. }
            | MessageBody::Subscribe { .. } => {}

            MessageBody::Unknown { message_type, .. } => {
                debug!(%message_type, "ignoring unknown message type");
            }
        }
    }

    /// Return freed commands to the front of the queue, unassigned. No
    /// synthetic terminal status: the submitter will observe the
    /// terminal status of the re-run.
    fn requeue(&mut self, freed: Vec<CommandId>) {
        for command_id in freed {
            if let Some((session, mut command)) = self.assigned.remove(&command_id) {
                warn!(command = %command_id, node = %session, "requeueing freed command");
                command.target_node = None;
                self.queue.push_front(command);
            }
        }
    }

    async fn handle_stop(&mut self, stop: Command) {
        let Some(target) = stop.stop_target().cloned() else { return };

        // Still queued: never reached a node, nothing to tell anyone.
        if self.queue.remove(&target).is_some() {
            debug!(command = %target, "stopped while queued");
            return;
        }

        // Assigned: forward to the owning node. The target keeps its
        // slot until the node confirms with a terminal status.
        if let Some((session, _)) = self.assigned.get(&target) {
            let session = session.clone();
            info!(command = %target, node = %session, "forwarding stop");
            let mut stop = stop;
            stop.target_node = Some(session.clone());
            self.send_command(stop, &session).await;
            return;
        }

        warn!(command = %target, "stop for unknown command dropped");
    }

    /// Assign as many queued commands as the nodes will take, in
    /// submission order. A command no node can take is skipped and does
    /// not block the commands behind it.
    async fn assignment_pass(&mut self) {
        loop {
            let mut pick = None;
            for command in self.queue.iter() {
                let node = match &command.target_node {
                    Some(target) => self
                        .registry
                        .get(target)
                        .filter(|node| {
                            NodeRegistry::eligible(node, command, self.matcher.as_ref())
                        })
                        .map(|_| target.clone()),
                    None => self.registry.best_node(command, self.matcher.as_ref()),
                };
                if let Some(node) = node {
                    pick = Some((command.command_id.clone(), node));
                    break;
                }
            }

            let Some((command_id, node)) = pick else { break };
            let Some(mut command) = self.queue.remove(&command_id) else { break };
            command.target_node = Some(node.clone());
            self.registry.assign(&node, command_id.clone(), command.requires_chroot);
            self.assigned.insert(command_id.clone(), (node.clone(), command.clone()));
            info!(command = %command_id, node = %node, "command assigned");
            self.state_sink.command_assigned(&command_id, &node).await;
            self.send_command(command, &node).await;
        }
    }

    async fn send_command(&self, command: Command, session: &SessionId) {
        match MessageBody::Command(command).into_message() {
            Ok(mut message) => {
                message.direct(destinations::COMMAND, Some(session));
                if let Err(err) = self.bus.publish(&self.session_id, message).await {
                    warn!(error = %err, "failed to publish command");
                }
            }
            Err(err) => warn!(error = %err, "failed to encode command"),
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
