// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rmake-core: domain types shared by the rMake wire protocol and dispatcher.
//!
//! Everything here is pure data: commands, node descriptors, flavors,
//! failure reasons, and job events. The packaging system (trove/version
//! resolution, dependency closure) is an external collaborator; its data
//! rides through these types opaquely.

pub mod macros;

pub mod clock;
pub mod command;
pub mod event;
pub mod failure;
pub mod flavor;
pub mod id;
pub mod node;

pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{Command, CommandKind, CommandSpec, CommandState};
pub use event::JobEvent;
pub use failure::FailureReason;
pub use flavor::{ExactFlavorMatcher, Flavor, FlavorMatcher};
pub use id::{CommandId, JobId, MessageId, SessionId};
pub use node::{NodeDescriptor, NodeTelemetry};
