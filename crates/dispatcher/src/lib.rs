// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rMake dispatcher: message bus server, node registry, and the
//! scheduling core that hands build commands to worker nodes.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod env;
pub mod queue;
pub mod registry;
pub mod relay;

pub use bus::{Bus, BusError, BusHandle};
pub use config::{Config, ConfigError};
pub use dispatcher::Dispatcher;
pub use queue::CommandQueue;
pub use registry::NodeRegistry;
pub use relay::{EventRelay, JobEventSink, NullStateSink, StateSink, TracingEventSink};
