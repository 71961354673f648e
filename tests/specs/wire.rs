// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-level behavior through a live farm: chunked writes, event
//! routing with header filters, and stamping.

use crate::prelude::*;
use rmake_core::{JobEvent, JobId};
use rmake_wire::{destinations, read_message, Message, MessageBody, MessageRegistry};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

fn event_list(job: u64) -> MessageBody {
    MessageBody::EventList {
        job_id: JobId::new(job),
        events: vec![JobEvent {
            event: "TROVE_BUILT".to_string(),
            data: serde_json::json!({"trove": "glibc:source"}),
        }],
    }
}

#[tokio::test]
async fn handshake_survives_byte_at_a_time_writes() {
    let farm = Farm::start().await;
    let mut stream = TcpStream::connect(farm.addr).await.unwrap();

    let hello = MessageBody::Connect {
        user: "spec".to_string(),
        password: "spec".to_string(),
        session_class: "CLIENT".to_string(),
        subscriptions: Vec::new(),
    }
    .into_message()
    .unwrap();

    // The server's framing must not care where write boundaries fall.
    for byte in hello.encode().unwrap() {
        stream.write_all(&[byte]).await.unwrap();
        stream.flush().await.unwrap();
    }

    let connected = read_message(&mut stream).await.unwrap();
    assert!(matches!(
        MessageRegistry::standard().decode(&connected).unwrap(),
        MessageBody::Connected { .. }
    ));
}

#[tokio::test]
async fn event_subscriptions_filter_on_job_id() {
    let farm = Farm::start().await;
    let mut watcher =
        BusClient::connect(&farm, "CLIENT", &[format!("{}?jobId=7", destinations::EVENT)]).await;
    let mut emitter = BusClient::connect(&farm, "WORKER", &[]).await;

    emitter.send_to(event_list(8), destinations::EVENT).await;
    emitter.send_to(event_list(7), destinations::EVENT).await;

    // Only the watched job comes through.
    let delivered: Message = watcher.recv().await;
    assert_eq!(delivered.headers.require_i64("jobId").unwrap(), 7);
    watcher.expect_silence().await;
}

#[tokio::test]
async fn bus_stamps_relayed_messages() {
    let farm = Farm::start().await;
    let mut watcher = BusClient::connect(&farm, "CLIENT", &[destinations::EVENT.to_string()]).await;
    let mut emitter = BusClient::connect(&farm, "WORKER", &[]).await;
    let emitter_session = emitter.session.clone();

    emitter.send_to(event_list(1), destinations::EVENT).await;

    let delivered = watcher.recv().await;
    assert!(delivered.is_stamped());
    assert_eq!(delivered.headers.session_id().unwrap(), emitter_session);
    assert!(
        delivered
            .headers
            .message_id()
            .unwrap()
            .as_str()
            .starts_with(emitter_session.as_str())
    );
}
