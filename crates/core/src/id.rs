// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! String-backed identifier newtypes.
//!
//! Unlike randomly generated ids, every id in the bus protocol is minted
//! by a specific authority: session ids by the message bus
//! (`class-host:n`), message ids by the sending connection
//! (`sessionId:counter`), and command ids by the submitting client.
//! `define_id!` therefore only generates parsing and comparison plumbing,
//! never a random constructor.

/// Define a newtype ID wrapper around `SmolStr`.
///
/// Generates `new()` from any string-ish value, `as_str()`, `Display`,
/// `From<String>`, `From<&str>`, `PartialEq<str>`, `Borrow<str>`, and
/// `Deref` implementations.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub smol_str::SmolStr);

        impl $name {
            /// Create an ID from an existing string.
            pub fn new(id: impl Into<smol_str::SmolStr>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the ID is an empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }
    };
}

crate::define_id! {
    /// Bus-assigned connection identity, `<sessionClass>-<host>:<count>`.
    pub struct SessionId;
}

crate::define_id! {
    /// Client-assigned identifier for one dispatchable command.
    pub struct CommandId;
}

crate::define_id! {
    /// Per-connection message identifier, `<sessionId>:<counter>`.
    pub struct MessageId;
}

/// Numeric build-job identifier. Many commands can belong to one job.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
