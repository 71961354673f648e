// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the dispatcher crate.

use std::path::PathBuf;

/// Config file location: `RMAKE_CONFIG` > `/etc/rmake/dispatcher.toml`.
pub fn config_path() -> PathBuf {
    std::env::var("RMAKE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/rmake/dispatcher.toml"))
}

/// Listen address override.
pub fn listen_addr() -> Option<String> {
    std::env::var("RMAKE_LISTEN").ok().filter(|s| !s.is_empty())
}

/// Log filter override (`RMAKE_LOG`), fed to the `EnvFilter` at startup.
pub fn log_filter() -> Option<String> {
    std::env::var("RMAKE_LOG").ok().filter(|s| !s.is_empty())
}
