// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured reasons a command can fail.
//!
//! Workers attach one of these to a `CommandStatus(ERROR)` so submitters
//! can tell a recipe failure from broken infrastructure. There is no
//! automatic retry anywhere in the core; retry policy belongs to the
//! submitting layer.

use crate::id::{CommandId, SessionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// The build itself failed (recipe error, compile failure).
    BuildFailed {
        error: String,
        #[serde(default)]
        traceback: String,
    },
    /// Creating or entering the build chroot failed.
    ChrootFailed {
        error: String,
        #[serde(default)]
        traceback: String,
    },
    /// A bug in the build farm itself.
    InternalError {
        error: String,
        #[serde(default)]
        traceback: String,
    },
    /// The command was killed by an explicit stop request.
    Stopped { message: String },
    /// Generic command failure with no finer classification.
    CommandFailed {
        command_id: CommandId,
        error: String,
        #[serde(default)]
        traceback: String,
    },
    /// The node executing the command disappeared from the bus.
    NodeLost { session_id: SessionId },
}

impl FailureReason {
    pub fn has_traceback(&self) -> bool {
        match self {
            FailureReason::BuildFailed { traceback, .. }
            | FailureReason::ChrootFailed { traceback, .. }
            | FailureReason::InternalError { traceback, .. }
            | FailureReason::CommandFailed { traceback, .. } => !traceback.is_empty(),
            FailureReason::Stopped { .. } | FailureReason::NodeLost { .. } => false,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::BuildFailed { error, .. } => write!(f, "Failed while building: {error}"),
            FailureReason::ChrootFailed { error, .. } => {
                write!(f, "Failed while creating chroot: {error}")
            }
            FailureReason::InternalError { error, .. } => {
                write!(f, "Internal rMake Error: {error}")
            }
            FailureReason::Stopped { message } => write!(f, "Stopped: {message}"),
            FailureReason::CommandFailed { command_id, error, .. } => {
                write!(f, "Command {command_id} failed: {error}")
            }
            FailureReason::NodeLost { session_id } => {
                write!(f, "Node {session_id} lost while command was running")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_json() {
        let reason = FailureReason::ChrootFailed {
            error: "mount failed".to_string(),
            traceback: "Traceback (most recent call last)...".to_string(),
        };
        let json = serde_json::to_string(&reason).unwrap();
        let back: FailureReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reason);
        assert!(back.has_traceback());
    }

    #[test]
    fn stopped_has_no_traceback() {
        let reason = FailureReason::Stopped { message: "stop requested".to_string() };
        assert!(!reason.has_traceback());
        assert_eq!(reason.to_string(), "Stopped: stop requested");
    }
}
