// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message bus server.
//!
//! One actor task owns every session and subscription; connection tasks
//! only move bytes. A session is either a TCP connection (through
//! [`serve`]) or an in-process attachment (through [`BusHandle::attach`],
//! which is how the dispatcher rides the bus without a socket).
//!
//! Handshake: the first message on a connection must be `CONNECT`. The
//! bus mints `sessionId = "<class>-<host>:<n>"`, registers the requested
//! subscriptions, answers `CONNECTED`, and announces the session on
//! `/internal/nodes`. Teardown announces `DISCONNECTED` there too, which
//! is what drives dispatcher node removal.

mod subscription;

pub use subscription::{Subscription, SubscriptionTable};

use rmake_core::{Clock, SessionId};
use rmake_wire::{
    destinations, read_message, write_message, Message, MessageBody, MessageRegistry,
    NodeStatusKind, Stamper, WireError,
};
use std::collections::HashMap;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outbound queue depth per session; a session that stays this far
/// behind starts losing messages.
const OUTBOUND_DEPTH: usize = 256;

/// Mailbox depth for the bus actor.
const MAILBOX_DEPTH: usize = 1024;

/// Pseudo session id the bus stamps its own notices with.
const BUS_SESSION: &str = "messagebus";

#[derive(Debug, Error)]
pub enum BusError {
    #[error("first message must be CONNECT, got {0:?}")]
    HandshakeExpectedConnect(String),

    #[error("message bus is shut down")]
    BusClosed,

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

enum BusRequest {
    Connect {
        host: String,
        hello: Message,
        outbound: mpsc::Sender<Message>,
        reply: oneshot::Sender<Result<SessionId, BusError>>,
    },
    Attach {
        session_class: String,
        subscriptions: Vec<String>,
        outbound: mpsc::Sender<Message>,
        reply: oneshot::Sender<SessionId>,
    },
    Publish {
        session: SessionId,
        message: Message,
    },
    Closed {
        session: SessionId,
    },
}

/// Cheap handle to the bus actor.
#[derive(Clone)]
pub struct BusHandle {
    tx: mpsc::Sender<BusRequest>,
}

impl BusHandle {
    /// Attach an in-process session: no handshake, no socket. Returns
    /// the minted session id and the session's inbound message stream.
    pub async fn attach(
        &self,
        session_class: &str,
        subscriptions: &[&str],
    ) -> Result<(SessionId, mpsc::Receiver<Message>), BusError> {
        let (outbound, inbound) = mpsc::channel(OUTBOUND_DEPTH);
        let (reply, response) = oneshot::channel();
        self.tx
            .send(BusRequest::Attach {
                session_class: session_class.to_string(),
                subscriptions: subscriptions.iter().map(|s| s.to_string()).collect(),
                outbound,
                reply,
            })
            .await
            .map_err(|_| BusError::BusClosed)?;
        let session = response.await.map_err(|_| BusError::BusClosed)?;
        Ok((session, inbound))
    }

    /// Publish a message on behalf of `session`.
    pub async fn publish(&self, session: &SessionId, message: Message) -> Result<(), BusError> {
        self.tx
            .send(BusRequest::Publish { session: session.clone(), message })
            .await
            .map_err(|_| BusError::BusClosed)
    }

    async fn connect(
        &self,
        host: String,
        hello: Message,
        outbound: mpsc::Sender<Message>,
    ) -> Result<SessionId, BusError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(BusRequest::Connect { host, hello, outbound, reply })
            .await
            .map_err(|_| BusError::BusClosed)?;
        response.await.map_err(|_| BusError::BusClosed)?
    }

    async fn closed(&self, session: &SessionId) {
        let _ = self.tx.send(BusRequest::Closed { session: session.clone() }).await;
    }
}

struct Session {
    outbound: mpsc::Sender<Message>,
    stamper: Stamper,
}

/// The bus actor. Owns all routing state; runs until cancelled.
pub struct Bus<C: Clock> {
    rx: mpsc::Receiver<BusRequest>,
    sessions: HashMap<SessionId, Session>,
    subscriptions: SubscriptionTable,
    host_counts: HashMap<String, u64>,
    decoder: MessageRegistry,
    bus_stamper: Stamper,
    clock: C,
}

impl<C: Clock> Bus<C> {
    pub fn new(clock: C) -> (Self, BusHandle) {
        let (tx, rx) = mpsc::channel(MAILBOX_DEPTH);
        let bus = Self {
            rx,
            sessions: HashMap::new(),
            subscriptions: SubscriptionTable::new(),
            host_counts: HashMap::new(),
            decoder: MessageRegistry::standard(),
            bus_stamper: Stamper::new(SessionId::new(BUS_SESSION)),
            clock,
        };
        (bus, BusHandle { tx })
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                request = self.rx.recv() => match request {
                    Some(request) => self.handle(request),
                    None => break,
                },
            }
        }
    }

    fn handle(&mut self, request: BusRequest) {
        match request {
            BusRequest::Connect { host, hello, outbound, reply } => {
                let _ = reply.send(self.complete_connection(host, hello, outbound));
            }
            BusRequest::Attach { session_class, subscriptions, outbound, reply } => {
                let session = self.open_session(&session_class, "local", subscriptions, outbound);
                let _ = reply.send(session);
            }
            BusRequest::Publish { session, message } => self.inbound(&session, message),
            BusRequest::Closed { session } => self.drop_session(&session),
        }
    }

    fn complete_connection(
        &mut self,
        host: String,
        hello: Message,
        outbound: mpsc::Sender<Message>,
    ) -> Result<SessionId, BusError> {
        let body = self.decoder.decode(&hello)?;
        let (session_class, subscriptions) = match body {
            MessageBody::Connect { session_class, subscriptions, .. } => {
                let class = if session_class.is_empty() {
                    "Anonymous".to_string()
                } else {
                    session_class
                };
                (class, subscriptions)
            }
            other => {
                return Err(BusError::HandshakeExpectedConnect(other.message_type().to_string()))
            }
        };

        let session = self.open_session(&session_class, &host, subscriptions, outbound);
        self.send_to(
            &session,
            MessageBody::Connected { session_id: session.clone() },
            None,
        );
        Ok(session)
    }

    fn open_session(
        &mut self,
        session_class: &str,
        host: &str,
        subscriptions: Vec<String>,
        outbound: mpsc::Sender<Message>,
    ) -> SessionId {
        let count = self.host_counts.entry(host.to_string()).or_insert(1);
        let session = SessionId::new(format!("{session_class}-{host}:{count}"));
        *count += 1;

        info!(session = %session, "registering new session");
        self.sessions
            .insert(session.clone(), Session { outbound, stamper: Stamper::new(session.clone()) });
        for raw in subscriptions {
            self.subscriptions.add(&session, Subscription::parse(&raw));
        }
        self.announce(&session, NodeStatusKind::Connected);
        session
    }

    fn inbound(&mut self, sender: &SessionId, message: Message) {
        if message.headers.message_type().as_deref() == Some("SUBSCRIBE") {
            match self.decoder.decode(&message) {
                Ok(MessageBody::Subscribe { destination }) => {
                    self.subscriptions.add(sender, Subscription::parse(&destination));
                }
                Ok(_) | Err(_) => warn!(session = %sender, "malformed SUBSCRIBE"),
            }
            return;
        }
        self.route(sender, message);
    }

    fn route(&mut self, sender: &SessionId, mut message: Message) {
        if let Some(session) = self.sessions.get_mut(sender) {
            session.stamper.stamp(&mut message, &self.clock);
        }
        if message.headers.destination().is_none() {
            warn!(session = %sender, "message without destination dropped");
            return;
        }
        self.fan_out(sender, message);
    }

    fn fan_out(&mut self, sender: &SessionId, message: Message) {
        let receivers = self.subscriptions.receivers(&message, sender);
        if receivers.is_empty() {
            debug!(
                message_type = message.headers.message_type().as_deref().unwrap_or(""),
                "message had no subscribers"
            );
            return;
        }
        let mut dead = Vec::new();
        for receiver in receivers {
            let Some(session) = self.sessions.get(&receiver) else { continue };
            match session.outbound.try_send(message.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(session = %receiver, "session outbound queue full, message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(receiver),
            }
        }
        for session in dead {
            self.drop_session(&session);
        }
    }

    /// Publish a `NodeStatus` notice on `/internal/nodes`.
    fn announce(&mut self, session: &SessionId, status: NodeStatusKind) {
        let body = MessageBody::NodeStatus { status_id: session.clone(), status };
        let Ok(mut message) = body.into_message() else { return };
        message.direct(destinations::INTERNAL_NODES, None);
        self.bus_stamper.stamp(&mut message, &self.clock);
        let bus_session = self.bus_stamper.session_id().clone();
        self.fan_out(&bus_session, message);
    }

    /// Send a bus-originated message to exactly one session.
    fn send_to(&mut self, session: &SessionId, body: MessageBody, destination: Option<&str>) {
        let Ok(mut message) = body.into_message() else { return };
        if let Some(destination) = destination {
            message.direct(destination, Some(session));
        }
        self.bus_stamper.stamp(&mut message, &self.clock);
        if let Some(entry) = self.sessions.get(session) {
            if entry.outbound.try_send(message).is_err() {
                warn!(session = %session, "failed to deliver bus message");
            }
        }
    }

    fn drop_session(&mut self, session: &SessionId) {
        if self.sessions.remove(session).is_none() {
            return;
        }
        info!(session = %session, "session closed");
        self.subscriptions.remove_session(session);
        self.announce(session, NodeStatusKind::Disconnected);
    }
}

/// Accept loop: one task per connection, until cancelled.
pub async fn serve(listener: TcpListener, handle: BusHandle, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        let host = peer.ip().to_string();
                        if let Err(err) = run_connection(stream, host, handle).await {
                            debug!(%peer, error = %err, "connection ended");
                        }
                    });
                }
                Err(err) => warn!(error = %err, "accept failed"),
            },
        }
    }
}

async fn run_connection(
    stream: TcpStream,
    host: String,
    handle: BusHandle,
) -> Result<(), BusError> {
    let (mut read_half, mut write_half) = stream.into_split();

    let hello = read_message(&mut read_half).await?;
    let (outbound, mut outbound_rx) = mpsc::channel(OUTBOUND_DEPTH);
    let session = handle.connect(host, hello, outbound).await?;

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if write_message(&mut write_half, &message).await.is_err() {
                break;
            }
        }
    });

    let result = loop {
        match read_message(&mut read_half).await {
            Ok(message) => {
                if handle.publish(&session, message).await.is_err() {
                    break Ok(());
                }
            }
            Err(err) => break Err(err.into()),
        }
    };

    handle.closed(&session).await;
    writer.abort();
    result
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
