// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job's mutable environment map.
//!
//! Insertion order is preserved for diagnostics (so a dumped environment
//! reads the same way a shell's `env` output would). Values are opaque
//! strings; the core never interprets them except where [`crate::config::AgentConfig`]
//! parses a handful of recognised keys out of a snapshot.

use indexmap::IndexMap;

/// Ordered name -> value mapping, mutated only between phases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment(IndexMap<String, String>);

impl Environment {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Seed an environment from any iterator of (name, value) pairs,
    /// preserving the iteration order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = IndexMap::new();
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn unset(&mut self, key: &str) -> Option<String> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply an [`EnvironmentDiff`] produced by the hook executor.
    ///
    /// Keys the diff marks `Removed` are unset; everything else is set to
    /// its new value. Order is not otherwise disturbed: updating an
    /// existing key keeps its original position, new keys append.
    pub fn apply_diff(&mut self, diff: &EnvironmentDiff) {
        for (key, change) in &diff.changes {
            match change {
                EnvironmentChange::Set(value) => self.set(key.clone(), value.clone()),
                EnvironmentChange::Removed => {
                    self.unset(key);
                }
            }
        }
    }

    /// Render as a sequence of `KEY=value` lines, in insertion order.
    pub fn to_env_lines(&self) -> Vec<String> {
        self.0.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }

    /// Parse `KEY=value` lines (one per line, trailing newline optional)
    /// into an Environment. Lines without an `=` are skipped rather than
    /// treated as fatal, matching the "parse failures are no-diff, not
    /// fatal" guidance for the env-dump mechanism.
    pub fn from_env_lines(text: &str) -> Self {
        let mut map = IndexMap::new();
        for line in text.lines() {
            if let Some((key, value)) = line.split_once('=') {
                map.insert(key.to_string(), value.to_string());
            }
        }
        Self(map)
    }
}

impl FromIterator<(String, String)> for Environment {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

/// One key's change between a before/after environment snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentChange {
    /// Key is new or its value changed; carries the new value.
    Set(String),
    /// Key present before, absent after.
    Removed,
}

/// The set difference between two environment snapshots, as computed by
/// the hook executor from `before.env`/`after.env`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentDiff {
    pub changes: IndexMap<String, EnvironmentChange>,
}

impl EnvironmentDiff {
    /// Compute the diff a hook induced: keys added or changed in `after`
    /// relative to `before`, plus keys removed from `before`.
    pub fn compute(before: &Environment, after: &Environment) -> Self {
        let mut changes = IndexMap::new();
        for (key, after_value) in after.iter() {
            match before.get(key) {
                Some(before_value) if before_value == after_value => {}
                _ => {
                    changes.insert(key.to_string(), EnvironmentChange::Set(after_value.to_string()));
                }
            }
        }
        for (key, _) in before.iter() {
            if after.get(key).is_none() {
                changes.insert(key.to_string(), EnvironmentChange::Removed);
            }
        }
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
