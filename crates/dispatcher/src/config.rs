// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rmaked` configuration: a TOML file with `RMAKE_*` env overrides.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the message bus listens on.
    pub listen: String,
    /// Default log filter; `RMAKE_LOG` overrides.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self { listen: "0.0.0.0:50900".to_string(), log_filter: "info".to_string() }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults. Env
    /// overrides are applied either way.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Read { path: path.display().to_string(), source })
            }
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(listen) = crate::env::listen_addr() {
            self.listen = listen;
        }
        if let Some(filter) = crate::env::log_filter() {
            self.log_filter = filter;
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
