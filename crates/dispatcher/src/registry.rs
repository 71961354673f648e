// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registered worker nodes and assignment eligibility.
//!
//! Slot and chroot counters are never stored; they derive from the set
//! of assigned command ids, so they cannot drift from it.

use rmake_core::{Command, CommandId, FlavorMatcher, NodeDescriptor, NodeTelemetry, SessionId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Live state for one registered node.
#[derive(Debug)]
pub struct NodeState {
    pub descriptor: NodeDescriptor,
    pub telemetry: Option<NodeTelemetry>,
    /// Assigned command ids, with whether each occupies a chroot.
    assigned: HashMap<CommandId, bool>,
}

impl NodeState {
    fn new(descriptor: NodeDescriptor) -> Self {
        Self { descriptor, telemetry: None, assigned: HashMap::new() }
    }

    pub fn used_slots(&self) -> usize {
        self.assigned.len()
    }

    pub fn used_chroots(&self) -> usize {
        self.assigned.values().filter(|chroot| **chroot).count()
    }

    /// One-minute load average; a node that has never sent telemetry
    /// counts as idle.
    pub fn load(&self) -> f64 {
        self.telemetry.as_ref().map_or(0.0, NodeTelemetry::one_minute_load)
    }

    fn slot_fraction(&self) -> f64 {
        if self.descriptor.slots == 0 {
            return 1.0;
        }
        self.used_slots() as f64 / self.descriptor.slots as f64
    }
}

/// All nodes known to the dispatcher, keyed by bus session.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<SessionId, NodeState>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, session: &SessionId) -> bool {
        self.nodes.contains_key(session)
    }

    pub fn get(&self, session: &SessionId) -> Option<&NodeState> {
        self.nodes.get(session)
    }

    /// Insert or replace a node. Re-registration keeps nothing from the
    /// previous incarnation.
    pub fn register(&mut self, session: SessionId, descriptor: NodeDescriptor) {
        debug!(session = %session, node = %descriptor.name, slots = descriptor.slots, "node registered");
        self.nodes.insert(session, NodeState::new(descriptor));
    }

    /// Apply a heartbeat: refresh telemetry and reconcile the node's
    /// self-reported active set against ours. Commands we believe
    /// assigned but the node no longer reports are freed and returned
    /// for requeueing.
    pub fn heartbeat(
        &mut self,
        session: &SessionId,
        telemetry: NodeTelemetry,
        active: &[CommandId],
    ) -> Vec<CommandId> {
        let Some(node) = self.nodes.get_mut(session) else {
            warn!(session = %session, "heartbeat from unregistered node");
            return Vec::new();
        };
        node.telemetry = Some(telemetry);

        for reported in active {
            if !node.assigned.contains_key(reported) {
                warn!(session = %session, command = %reported, "node reports a command we never assigned");
            }
        }

        let lost: Vec<CommandId> = node
            .assigned
            .keys()
            .filter(|id| !active.contains(id))
            .cloned()
            .collect();
        for id in &lost {
            warn!(session = %session, command = %id, "assigned command missing from heartbeat, freeing");
            node.assigned.remove(id);
        }
        lost
    }

    /// Drop a node, returning every command that was assigned to it.
    pub fn remove(&mut self, session: &SessionId) -> Vec<CommandId> {
        match self.nodes.remove(session) {
            Some(node) => node.assigned.into_keys().collect(),
            None => Vec::new(),
        }
    }

    /// Record an assignment. Counters follow from the set.
    pub fn assign(&mut self, session: &SessionId, command_id: CommandId, requires_chroot: bool) {
        if let Some(node) = self.nodes.get_mut(session) {
            node.assigned.insert(command_id, requires_chroot);
        }
    }

    /// Free one assignment; false if the node or command was unknown.
    pub fn release(&mut self, session: &SessionId, command_id: &CommandId) -> bool {
        self.nodes
            .get_mut(session)
            .map_or(false, |node| node.assigned.remove(command_id).is_some())
    }

    /// Can `node` take `command` right now?
    pub fn eligible(node: &NodeState, command: &Command, matcher: &dyn FlavorMatcher) -> bool {
        let d = &node.descriptor;
        if !d.job_types.contains(&command.kind()) {
            return false;
        }
        if node.used_slots() >= d.slots as usize {
            return false;
        }
        if command.requires_chroot && node.used_chroots() >= d.chroot_limit as usize {
            return false;
        }
        if node.load() > d.load_threshold {
            return false;
        }
        command.required_flavors.iter().all(|required| {
            d.build_flavors.iter().any(|flavor| matcher.satisfies(flavor, required))
        })
    }

    /// Best eligible node for `command`: lowest used-slot fraction, then
    /// lowest load average.
    pub fn best_node(&self, command: &Command, matcher: &dyn FlavorMatcher) -> Option<SessionId> {
        self.nodes
            .iter()
            .filter(|(_, node)| Self::eligible(node, command, matcher))
            .min_by(|(_, a), (_, b)| {
                a.slot_fraction()
                    .total_cmp(&b.slot_fraction())
                    .then(a.load().total_cmp(&b.load()))
            })
            .map(|(session, _)| session.clone())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
