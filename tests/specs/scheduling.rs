// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Assignment scenarios: slot-bounded serial assignment, load-gated
//! eligibility, and reassignment after node loss.

use crate::prelude::*;
use rmake_core::CommandState;
use rmake_wire::{destinations, MessageBody};

#[tokio::test]
async fn slots_serialize_chroot_builds_on_one_node() {
    let farm = Farm::start().await;
    let mut node = Worker::join(&farm, x86_descriptor(1, 1, 2.0)).await;
    let mut client = BusClient::connect(&farm, "CLIENT", &[]).await;

    client.send_to(MessageBody::Command(x86_build("c1", true)), destinations::COMMAND).await;
    client.send_to(MessageBody::Command(x86_build("c2", true)), destinations::COMMAND).await;

    // Pass 1: only c1 fits the single slot.
    let first = node.expect_command().await;
    assert_eq!(first.command_id, "c1");
    assert_eq!(first.target_node.as_ref(), Some(&node.client.session));
    node.client.expect_silence().await;

    // Completion frees the slot; c2 follows.
    node.finish("c1", CommandState::Completed, None).await;
    let second = node.expect_command().await;
    assert_eq!(second.command_id, "c2");
}

#[tokio::test]
async fn load_threshold_gates_assignment_until_a_cool_heartbeat() {
    let farm = Farm::start().await;
    let mut node = Worker::join(&farm, x86_descriptor(2, 1, 1.0)).await;
    let mut client = BusClient::connect(&farm, "CLIENT", &[]).await;

    // The node is hot: nothing may be assigned.
    node.heartbeat(5.0, &[]).await;
    client
        .send_to(MessageBody::Command(unconstrained_build("c1")), destinations::COMMAND)
        .await;
    node.client.expect_silence().await;

    // A cool heartbeat triggers a pass that places the command.
    node.heartbeat(0.3, &[]).await;
    assert_eq!(node.expect_command().await.command_id, "c1");
}

#[tokio::test]
async fn blocked_command_does_not_block_later_ones() {
    let farm = Farm::start().await;
    // Only x86 flavors are buildable here.
    let mut node = Worker::join(&farm, x86_descriptor(2, 1, 2.0)).await;
    let mut client = BusClient::connect(&farm, "CLIENT", &[]).await;

    let mut sparc = unconstrained_build("sparc-job");
    sparc.required_flavors = vec![rmake_core::Flavor::new("is: sparc")];
    client.send_to(MessageBody::Command(sparc), destinations::COMMAND).await;
    client
        .send_to(MessageBody::Command(unconstrained_build("c2")), destinations::COMMAND)
        .await;

    // The unsatisfiable first command is skipped, not a barrier.
    assert_eq!(node.expect_command().await.command_id, "c2");
}

#[tokio::test]
async fn node_loss_requeues_and_reassigns() {
    let farm = Farm::start().await;
    let mut lost = Worker::join(&farm, x86_descriptor(1, 1, 2.0)).await;
    let mut client = BusClient::connect(&farm, "CLIENT", &[]).await;

    client.send_to(MessageBody::Command(x86_build("c1", false)), destinations::COMMAND).await;
    assert_eq!(lost.expect_command().await.command_id, "c1");

    // The node drops off the bus; its command must not be lost.
    drop(lost);
    let mut successor = Worker::join(&farm, x86_descriptor(1, 1, 2.0)).await;
    let reassigned = successor.expect_command().await;
    assert_eq!(reassigned.command_id, "c1");
    assert_eq!(reassigned.target_node.as_ref(), Some(&successor.client.session));
}

#[tokio::test]
async fn heartbeat_reconciliation_recovers_a_lost_completion() {
    let farm = Farm::start().await;
    let mut node = Worker::join(&farm, x86_descriptor(1, 1, 2.0)).await;
    let mut client = BusClient::connect(&farm, "CLIENT", &[]).await;

    client.send_to(MessageBody::Command(x86_build("c1", false)), destinations::COMMAND).await;
    assert_eq!(node.expect_command().await.command_id, "c1");

    // The node's executor restarted: its heartbeat no longer lists c1.
    node.heartbeat(0.1, &[]).await;
    assert_eq!(node.expect_command().await.command_id, "c1");
}
