// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatchable commands and their lifecycle.

use crate::flavor::Flavor;
use crate::id::{CommandId, JobId, SessionId};
use serde::{Deserialize, Serialize};

/// The kind of work a command asks a node to perform.
///
/// Nodes declare the kinds they accept in their descriptor; a command is
/// only assigned to a node advertising its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Build,
    Resolve,
    Action,
    Stop,
}

crate::simple_display! {
    CommandKind {
        Build => "build",
        Resolve => "resolve",
        Action => "action",
        Stop => "stop",
    }
}

/// Kind-specific command content.
///
/// Build and resolve jobs carry packaging-system data (trove lists,
/// build configuration, dependency jobs) that the dispatcher relays
/// without interpreting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandSpec {
    Build {
        job: serde_json::Value,
    },
    Resolve {
        job: serde_json::Value,
    },
    Action {
        action: String,
        args: serde_json::Value,
    },
    /// Ask the node running `target_command_id` to terminate it.
    Stop {
        target_command_id: CommandId,
    },
}

impl CommandSpec {
    pub fn kind(&self) -> CommandKind {
        match self {
            CommandSpec::Build { .. } => CommandKind::Build,
            CommandSpec::Resolve { .. } => CommandKind::Resolve,
            CommandSpec::Action { .. } => CommandKind::Action,
            CommandSpec::Stop { .. } => CommandKind::Stop,
        }
    }
}

/// A unit of dispatchable work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub command_id: CommandId,
    pub job_id: JobId,
    /// Empty until the dispatcher assigns the command to a node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node: Option<SessionId>,
    #[serde(default)]
    pub requires_chroot: bool,
    /// Flavors the executing node must be able to satisfy, all of them.
    #[serde(default)]
    pub required_flavors: Vec<Flavor>,
    pub spec: CommandSpec,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        self.spec.kind()
    }

    pub fn is_stop(&self) -> bool {
        matches!(self.spec, CommandSpec::Stop { .. })
    }

    /// Target of a stop command, if this is one.
    pub fn stop_target(&self) -> Option<&CommandId> {
        match &self.spec {
            CommandSpec::Stop { target_command_id } => Some(target_command_id),
            _ => None,
        }
    }
}

/// Terminal/progress state carried by a `CommandStatus` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandState {
    InProgress,
    Completed,
    Error,
}

impl CommandState {
    /// Terminal states free the assigned node's slot.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandState::Completed | CommandState::Error)
    }
}

crate::simple_display! {
    CommandState {
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
        Error => "ERROR",
    }
}

impl std::str::FromStr for CommandState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(CommandState::InProgress),
            "COMPLETED" => Ok(CommandState::Completed),
            "ERROR" => Ok(CommandState::Error),
            other => Err(format!("unknown command state {other:?}")),
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
