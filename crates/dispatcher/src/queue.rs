// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submission-ordered pending commands.

use rmake_core::{Command, CommandId};
use std::collections::{HashSet, VecDeque};

/// FIFO of commands awaiting a node, with O(1) membership by id.
/// Unbounded: submitters are never pushed back.
#[derive(Debug, Default)]
pub struct CommandQueue {
    items: VecDeque<Command>,
    ids: HashSet<CommandId>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &CommandId) -> bool {
        self.ids.contains(id)
    }

    /// Enqueue at the back (normal submission order).
    pub fn push_back(&mut self, command: Command) {
        self.ids.insert(command.command_id.clone());
        self.items.push_back(command);
    }

    /// Enqueue at the front. Used when a previously assigned command is
    /// freed and should not lose its place to newer submissions.
    pub fn push_front(&mut self, command: Command) {
        self.ids.insert(command.command_id.clone());
        self.items.push_front(command);
    }

    /// Remove a command by id wherever it sits.
    pub fn remove(&mut self, id: &CommandId) -> Option<Command> {
        if !self.ids.remove(id) {
            return None;
        }
        let position = self.items.iter().position(|c| &c.command_id == id)?;
        self.items.remove(position)
    }

    /// Pending commands in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.items.iter()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
