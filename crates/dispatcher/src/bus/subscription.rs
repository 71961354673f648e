// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Destination subscriptions with `?attr=value` filtering.

use rmake_core::SessionId;
use rmake_wire::Message;
use std::collections::HashMap;

/// One subscription: a destination plus header constraints.
///
/// `/event?jobId=7` receives `/event` messages whose `jobId` header is
/// `7`; every attr must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    destination: String,
    attrs: Vec<(String, String)>,
}

impl Subscription {
    /// Parse `/destination?attr=value&attr2=value2`.
    pub fn parse(raw: &str) -> Self {
        let (destination, query) = match raw.split_once('?') {
            Some((destination, query)) => (destination, Some(query)),
            None => (raw, None),
        };
        let attrs = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter(|attr| !attr.is_empty())
            .map(|attr| match attr.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (attr.to_string(), String::new()),
            })
            .collect();
        Self { destination: destination.to_string(), attrs }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn matches(&self, message: &Message) -> bool {
        if message.headers.destination().as_deref() != Some(&self.destination) {
            return false;
        }
        self.attrs
            .iter()
            .all(|(key, value)| message.headers.get_str(key).as_deref() == Some(value.as_str()))
    }
}

/// Per-session subscription lists.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    by_session: HashMap<SessionId, Vec<Subscription>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, session: &SessionId, subscription: Subscription) {
        self.by_session.entry(session.clone()).or_default().push(subscription);
    }

    pub fn remove_session(&mut self, session: &SessionId) {
        self.by_session.remove(session);
    }

    /// Sessions that should receive `message`, excluding its sender. A
    /// `targetId` header restricts delivery to that one session (which
    /// must still be subscribed).
    pub fn receivers(&self, message: &Message, sender: &SessionId) -> Vec<SessionId> {
        let target = message.headers.target_id();
        self.by_session
            .iter()
            .filter(|(session, _)| *session != sender)
            .filter(|(session, _)| target.as_ref().map_or(true, |t| t == *session))
            .filter(|(_, subs)| subs.iter().any(|s| s.matches(message)))
            .map(|(session, _)| session.clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
