// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build flavors and the flavor-satisfaction seam.
//!
//! A flavor is a structured variation descriptor (architecture, feature
//! flags). Whether one flavor satisfies another is a partial-order
//! compatibility check owned by the packaging system; the dispatcher only
//! consumes it through [`FlavorMatcher`].

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// An opaque flavor string, e.g. `is: x86` or `ssl,!bootstrap is: x86_64`.
///
/// The dispatcher never interprets the contents; it passes pairs of
/// flavors to a [`FlavorMatcher`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flavor(pub SmolStr);

impl Flavor {
    pub fn new(spec: impl Into<SmolStr>) -> Self {
        Self(spec.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Flavor {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// External predicate deciding whether a node's build flavor can produce
/// a required flavor.
pub trait FlavorMatcher: Send + Sync {
    fn satisfies(&self, node_flavor: &Flavor, required: &Flavor) -> bool;
}

/// Literal string equality.
///
/// The production deployment plugs in the packaging system's
/// partial-order check; exact matching is the built-in default and what
/// the test suites use.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactFlavorMatcher;

impl FlavorMatcher for ExactFlavorMatcher {
    fn satisfies(&self, node_flavor: &Flavor, required: &Flavor) -> bool {
        node_flavor == required
    }
}

impl<M: FlavorMatcher + ?Sized> FlavorMatcher for std::sync::Arc<M> {
    fn satisfies(&self, node_flavor: &Flavor, required: &Flavor) -> bool {
        (**self).satisfies(node_flavor, required)
    }
}

#[cfg(test)]
#[path = "flavor_tests.rs"]
mod tests;
