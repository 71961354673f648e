// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stop semantics: queued targets vanish silently, assigned targets are
//! stopped through their node and hold their slot until confirmed.

use crate::prelude::*;
use rmake_core::{CommandId, CommandState, FailureReason};
use rmake_wire::{destinations, MessageBody};

#[tokio::test]
async fn stopping_a_queued_command_reaches_no_node() {
    let farm = Farm::start().await;
    let mut client = BusClient::connect(&farm, "CLIENT", &[]).await;

    // No nodes yet: c1 sits in the queue.
    client.send_to(MessageBody::Command(x86_build("c1", false)), destinations::COMMAND).await;
    client.send_to(MessageBody::Command(stop("s1", "c1")), destinations::COMMAND).await;

    // A node arriving later must never see the stopped command.
    let mut node = Worker::join(&farm, x86_descriptor(1, 1, 2.0)).await;
    client.send_to(MessageBody::Command(x86_build("c2", false)), destinations::COMMAND).await;
    assert_eq!(node.expect_command().await.command_id, "c2");
    node.client.expect_silence().await;
}

#[tokio::test]
async fn stopping_an_assigned_command_forwards_and_frees_on_confirmation() {
    let farm = Farm::start().await;
    let mut node = Worker::join(&farm, x86_descriptor(1, 1, 2.0)).await;
    let mut client = BusClient::connect(&farm, "CLIENT", &[]).await;

    client.send_to(MessageBody::Command(x86_build("c1", false)), destinations::COMMAND).await;
    assert_eq!(node.expect_command().await.command_id, "c1");

    client.send_to(MessageBody::Command(stop("s1", "c1")), destinations::COMMAND).await;
    let forwarded = node.expect_command().await;
    assert_eq!(forwarded.stop_target(), Some(&CommandId::new("c1")));

    // The slot is still held: c2 cannot be placed yet.
    client.send_to(MessageBody::Command(x86_build("c2", false)), destinations::COMMAND).await;
    node.client.expect_silence().await;

    // The node confirms the stop with a terminal status; c2 follows.
    node.finish(
        "c1",
        CommandState::Error,
        Some(FailureReason::Stopped { message: "stopped by request".to_string() }),
    )
    .await;
    assert_eq!(node.expect_command().await.command_id, "c2");
}

#[tokio::test]
async fn stop_for_an_unknown_target_is_ignored() {
    let farm = Farm::start().await;
    let mut node = Worker::join(&farm, x86_descriptor(1, 1, 2.0)).await;
    let mut client = BusClient::connect(&farm, "CLIENT", &[]).await;

    client.send_to(MessageBody::Command(stop("s1", "no-such-command")), destinations::COMMAND).await;
    node.client.expect_silence().await;
}
