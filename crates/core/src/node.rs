// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker node capabilities and telemetry.

use crate::command::CommandKind;
use crate::flavor::Flavor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Capabilities a worker declares when registering on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub name: String,
    pub host: String,
    /// Maximum concurrently assigned commands.
    pub slots: u32,
    /// Command kinds this node accepts.
    pub job_types: BTreeSet<CommandKind>,
    /// Flavors this node can build.
    pub build_flavors: Vec<Flavor>,
    /// Assignments pause while the node's load average exceeds this.
    pub load_threshold: f64,
    /// Chroot names already present on the node.
    #[serde(default)]
    pub chroots: Vec<String>,
    /// Maximum concurrently assigned chroot-requiring commands.
    pub chroot_limit: u32,
}

/// Periodic self-reported machine state, sent with each heartbeat.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeTelemetry {
    /// 1/5/15 minute load averages.
    pub load_avg: [f64; 3],
}

impl NodeTelemetry {
    pub fn new(load_avg: [f64; 3]) -> Self {
        Self { load_avg }
    }

    /// The one-minute load average, which gates eligibility.
    pub fn one_minute_load(&self) -> f64 {
        self.load_avg[0]
    }
}
