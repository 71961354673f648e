// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: boots the full `rmaked` composition (bus actor, TCP
//! accept loop, dispatcher session) and wraps raw socket peers.

use rmake_core::{
    Command, CommandId, CommandKind, CommandSpec, CommandState, ExactFlavorMatcher, FailureReason,
    Flavor, JobId, NodeDescriptor, NodeTelemetry, SessionId, SystemClock,
};
use rmake_dispatcher::bus::{serve, Bus};
use rmake_dispatcher::relay::NullStateSink;
use rmake_dispatcher::{Dispatcher, EventRelay};
use rmake_wire::{
    destinations, read_message, write_message, Message, MessageBody, MessageRegistry,
    NodeStatusKind,
};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

pub const SPEC_WAIT: Duration = Duration::from_secs(5);

/// A running build farm: bus, listener, dispatcher.
pub struct Farm {
    pub addr: SocketAddr,
    _cancel: CancellationToken,
}

impl Farm {
    pub async fn start() -> Farm {
        let (bus, handle) = Bus::new(SystemClock);
        let cancel = CancellationToken::new();
        tokio::spawn(bus.run(cancel.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, handle.clone(), cancel.clone()));

        let dispatcher = Dispatcher::attach(
            handle.clone(),
            Arc::new(ExactFlavorMatcher),
            Arc::new(EventRelay::new()),
            Arc::new(NullStateSink),
        )
        .await
        .unwrap();
        tokio::spawn(dispatcher.run(cancel.clone()));

        Farm { addr, _cancel: cancel }
    }
}

/// A connected bus peer speaking the wire protocol over TCP.
///
/// Each peer carries a companion `probe` connection subscribed to a
/// private destination; [`sync`](BusClient::sync) bounces a marker off
/// the bus through it so the harness can wait until the bus has routed
/// everything this peer wrote, instead of racing writes made on other
/// connections.
pub struct BusClient {
    stream: TcpStream,
    probe: TcpStream,
    sync_destination: String,
    pub session: SessionId,
    registry: MessageRegistry,
}

impl BusClient {
    pub async fn connect(farm: &Farm, session_class: &str, subscriptions: &[String]) -> Self {
        let mut stream = TcpStream::connect(farm.addr).await.unwrap();
        let hello = MessageBody::Connect {
            user: "spec".to_string(),
            password: "spec".to_string(),
            session_class: session_class.to_string(),
            subscriptions: subscriptions.to_vec(),
        }
        .into_message()
        .unwrap();
        write_message(&mut stream, &hello).await.unwrap();

        let registry = MessageRegistry::standard();
        let connected = read_message(&mut stream).await.unwrap();
        let session = match registry.decode(&connected).unwrap() {
            MessageBody::Connected { session_id } => session_id,
            other => panic!("expected CONNECTED, got {other:?}"),
        };

        // The probe's subscriptions are registered before its CONNECTED
        // reply, so once we read that reply the sync destination is live.
        let sync_destination = format!("/spec-sync/{session}");
        let mut probe = TcpStream::connect(farm.addr).await.unwrap();
        let hello = MessageBody::Connect {
            user: "spec".to_string(),
            password: "spec".to_string(),
            session_class: "PROBE".to_string(),
            subscriptions: vec![sync_destination.clone()],
        }
        .into_message()
        .unwrap();
        write_message(&mut probe, &hello).await.unwrap();
        read_message(&mut probe).await.unwrap();

        Self { stream, probe, sync_destination, session, registry }
    }

    /// Ordering barrier: wait until the bus has routed everything this
    /// connection wrote so far. The bus is one actor with FIFO queues,
    /// so when the marker comes back through the probe connection every
    /// earlier message has already reached its subscribers (including
    /// the dispatcher's inbound queue).
    async fn sync(&mut self) {
        let mut marker = MessageBody::NodeStatus {
            status_id: self.session.clone(),
            status: NodeStatusKind::Connected,
        }
        .into_message()
        .unwrap();
        marker.direct(&self.sync_destination, None);
        write_message(&mut self.stream, &marker).await.unwrap();
        loop {
            let echoed = tokio::time::timeout(SPEC_WAIT, read_message(&mut self.probe))
                .await
                .expect("timed out waiting for the sync marker")
                .unwrap();
            if echoed.headers.destination().as_deref() == Some(self.sync_destination.as_str()) {
                break;
            }
        }
    }

    /// Send a message that needs no destination (handshake-adjacent
    /// traffic the bus consumes itself).
    pub async fn send(&mut self, body: MessageBody) {
        let message = body.into_message().unwrap();
        write_message(&mut self.stream, &message).await.unwrap();
    }

    pub async fn send_to(&mut self, body: MessageBody, destination: &str) {
        let mut message = body.into_message().unwrap();
        message.direct(destination, None);
        write_message(&mut self.stream, &message).await.unwrap();
        self.sync().await;
    }

    pub async fn recv(&mut self) -> Message {
        tokio::time::timeout(SPEC_WAIT, read_message(&mut self.stream))
            .await
            .expect("timed out waiting for a message")
            .unwrap()
    }

    pub async fn recv_body(&mut self) -> MessageBody {
        let message = self.recv().await;
        self.registry.decode(&message).unwrap()
    }

    /// Assert that nothing arrives for a short grace period.
    pub async fn expect_silence(&mut self) {
        let result =
            tokio::time::timeout(Duration::from_millis(300), read_message(&mut self.stream)).await;
        assert!(result.is_err(), "expected no message");
    }
}

/// A worker node: a bus peer subscribed to its own targeted commands,
/// in the shape real nodes use (`/command?targetNode=<session>`).
pub struct Worker {
    pub client: BusClient,
}

impl Worker {
    pub async fn join(farm: &Farm, descriptor: NodeDescriptor) -> Worker {
        let mut client = BusClient::connect(farm, "WORKER", &[]).await;
        let pattern = format!("{}?targetNode={}", destinations::COMMAND, client.session);
        client.send(MessageBody::Subscribe { destination: pattern }).await;
        client
            .send_to(MessageBody::RegisterNode { node: descriptor }, destinations::REGISTER)
            .await;
        Worker { client }
    }

    pub async fn expect_command(&mut self) -> Command {
        match self.client.recv_body().await {
            MessageBody::Command(command) => command,
            other => panic!("expected a command, got {other:?}"),
        }
    }

    pub async fn heartbeat(&mut self, one_minute_load: f64, active: &[&str]) {
        self.client
            .send_to(
                MessageBody::NodeInfo {
                    telemetry: NodeTelemetry::new([one_minute_load, 0.0, 0.0]),
                    active_command_ids: active.iter().map(|id| CommandId::new(*id)).collect(),
                },
                destinations::NODE_STATUS,
            )
            .await;
    }

    pub async fn finish(
        &mut self,
        command_id: &str,
        state: CommandState,
        failure_reason: Option<FailureReason>,
    ) {
        self.client
            .send_to(
                MessageBody::CommandStatus {
                    command_id: CommandId::new(command_id),
                    state,
                    failure_reason,
                },
                destinations::COMMAND_STATUS,
            )
            .await;
    }
}

pub fn x86_descriptor(slots: u32, chroot_limit: u32, load_threshold: f64) -> NodeDescriptor {
    let mut job_types = BTreeSet::new();
    job_types.insert(CommandKind::Build);
    job_types.insert(CommandKind::Stop);
    NodeDescriptor {
        name: "builder".to_string(),
        host: "10.0.0.5".to_string(),
        slots,
        job_types,
        build_flavors: vec![Flavor::new("is: x86")],
        load_threshold,
        chroots: Vec::new(),
        chroot_limit,
    }
}

pub fn x86_build(id: &str, requires_chroot: bool) -> Command {
    Command {
        command_id: CommandId::new(id),
        job_id: JobId::new(1),
        target_node: None,
        requires_chroot,
        required_flavors: vec![Flavor::new("is: x86")],
        spec: CommandSpec::Build { job: serde_json::json!({"trove": "glibc:source"}) },
    }
}

pub fn unconstrained_build(id: &str) -> Command {
    Command {
        command_id: CommandId::new(id),
        job_id: JobId::new(2),
        target_node: None,
        requires_chroot: false,
        required_flavors: Vec::new(),
        spec: CommandSpec::Build { job: serde_json::json!({}) },
    }
}

pub fn stop(id: &str, target: &str) -> Command {
    Command {
        command_id: CommandId::new(id),
        job_id: JobId::new(1),
        target_node: None,
        requires_chroot: false,
        required_flavors: Vec::new(),
        spec: CommandSpec::Stop { target_command_id: CommandId::new(target) },
    }
}
