// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job event fan-out and the persistence seam.
//!
//! Relaying is independent of assignment state: events flow whether or
//! not the dispatcher still tracks the command that produced them.
//! Ordering is per job only — events from one session arrive in emission
//! order and are fanned out in arrival order; nothing is promised across
//! jobs.

use async_trait::async_trait;
use parking_lot::Mutex;
use rmake_core::{
    CommandId, CommandState, FailureReason, JobEvent, JobId, NodeDescriptor, SessionId,
};
use std::sync::Arc;
use tracing::info;

/// Receives the event stream of build jobs (CLI watchers, persistence
/// loggers).
#[async_trait]
pub trait JobEventSink: Send + Sync {
    async fn job_events(&self, job_id: JobId, events: &[JobEvent]);
}

/// Fire-and-forget observer of node and command transitions. The
/// dispatcher never waits on or reads back from it.
#[async_trait]
pub trait StateSink: Send + Sync {
    async fn node_registered(&self, session: &SessionId, descriptor: &NodeDescriptor);
    async fn node_removed(&self, session: &SessionId);
    async fn command_assigned(&self, command_id: &CommandId, session: &SessionId);
    async fn command_finished(
        &self,
        command_id: &CommandId,
        state: CommandState,
        failure: Option<&FailureReason>,
    );
}

/// Default sink: structured log lines, nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl JobEventSink for TracingEventSink {
    async fn job_events(&self, job_id: JobId, events: &[JobEvent]) {
        for event in events {
            info!(job = %job_id, event = %event.event, "job event");
        }
    }
}

/// A `StateSink` that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStateSink;

#[async_trait]
impl StateSink for NullStateSink {
    async fn node_registered(&self, _session: &SessionId, _descriptor: &NodeDescriptor) {}
    async fn node_removed(&self, _session: &SessionId) {}
    async fn command_assigned(&self, _command_id: &CommandId, _session: &SessionId) {}
    async fn command_finished(
        &self,
        _command_id: &CommandId,
        _state: CommandState,
        _failure: Option<&FailureReason>,
    ) {
    }
}

/// Fans incoming event lists out to every subscribed sink.
#[derive(Default)]
pub struct EventRelay {
    sinks: Mutex<Vec<Arc<dyn JobEventSink>>>,
}

impl EventRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, sink: Arc<dyn JobEventSink>) {
        self.sinks.lock().push(sink);
    }

    pub async fn relay(&self, job_id: JobId, events: &[JobEvent]) {
        // Snapshot under the lock, await outside it.
        let sinks: Vec<Arc<dyn JobEventSink>> = self.sinks.lock().clone();
        for sink in sinks {
            sink.job_events(job_id, events).await;
        }
    }
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
