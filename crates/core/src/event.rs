// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build-progress events.
//!
//! Inside a worker, the subprocess executing a command writes these to a
//! pipe; the supervising node process tags them with the job id and
//! publishes them on `/event`. The dispatcher relays them verbatim to
//! per-job subscribers; the payload is packaging-system data it never
//! interprets.

use serde::{Deserialize, Serialize};

/// One progress event for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Event name, e.g. `troveBuilding` or `jobLogUpdated`.
    pub event: String,
    /// Event arguments, opaque to the relay.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl JobEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self { event: event.into(), data }
    }
}
