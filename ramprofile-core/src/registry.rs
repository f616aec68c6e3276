//! Browser registry: identifier → profile location and process name.
//!
//! # Sources
//!
//! ```text
//! built-in table                       (always present)
//! <config_home>/ramprofile/browsers.yaml  (optional, user entries replace built-ins)
//! fallback rule                        (id → {subpath: id, process: id})
//! ```
//!
//! [`BrowserRegistry::lookup`] never fails; the fallback is only consulted
//! when no explicit entry exists for the exact identifier.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{io_err, CoreError};
use crate::paths::Layout;
use crate::types::{BrowserEntry, BrowserId, ProfileRoot};

// ---------------------------------------------------------------------------
// 1. Built-in table
// ---------------------------------------------------------------------------

const BUILTINS: &[(&str, &str, &str, ProfileRoot)] = &[
    ("brave", "BraveSoftware/Brave-Browser", "brave", ProfileRoot::ConfigHome),
    ("chromium", "chromium", "chromium", ProfileRoot::ConfigHome),
    ("google-chrome", "google-chrome", "chrome", ProfileRoot::ConfigHome),
    ("google-chrome-beta", "google-chrome-beta", "chrome", ProfileRoot::ConfigHome),
    ("google-chrome-unstable", "google-chrome-unstable", "chrome", ProfileRoot::ConfigHome),
    ("microsoft-edge", "microsoft-edge", "msedge", ProfileRoot::ConfigHome),
    ("vivaldi", "vivaldi", "vivaldi-bin", ProfileRoot::ConfigHome),
    ("opera", "opera", "opera", ProfileRoot::ConfigHome),
    ("falkon", "falkon", "falkon", ProfileRoot::ConfigHome),
    ("qutebrowser", "qutebrowser", "qutebrowser", ProfileRoot::ConfigHome),
    ("firefox", ".mozilla/firefox", "firefox", ProfileRoot::Home),
    ("librewolf", ".librewolf", "librewolf", ProfileRoot::Home),
];

// ---------------------------------------------------------------------------
// 2. Registry
// ---------------------------------------------------------------------------

/// Result of a registry lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub entry: BrowserEntry,
    /// `true` when the entry was synthesized by the fallback rule.
    pub fallback: bool,
}

/// Explicit browser entries keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct BrowserRegistry {
    entries: BTreeMap<BrowserId, BrowserEntry>,
}

impl BrowserRegistry {
    /// Registry holding only the built-in table.
    pub fn with_builtins() -> Self {
        let entries = BUILTINS
            .iter()
            .filter_map(|(id, subpath, process, root)| {
                let id = BrowserId::parse(id).ok()?;
                Some((id.clone(), BrowserEntry::new(id, *subpath, *process, *root)))
            })
            .collect();
        Self { entries }
    }

    /// Built-ins merged with the user file under `layout`, if it exists.
    pub fn load_at(layout: &Layout) -> Result<Self, CoreError> {
        let mut registry = Self::with_builtins();
        for entry in load_user_entries(&layout.user_registry_path())? {
            registry.insert(entry);
        }
        Ok(registry)
    }

    /// Add or replace an explicit entry.
    pub fn insert(&mut self, entry: BrowserEntry) {
        if let Some(previous) = self.entries.get(&entry.identifier) {
            if previous != &entry {
                tracing::info!(browser = %entry.identifier, "user entry replaces built-in");
            }
        }
        self.entries.insert(entry.identifier.clone(), entry);
    }

    /// Explicit entry for `id`, if any.
    pub fn get(&self, id: &BrowserId) -> Option<&BrowserEntry> {
        self.entries.get(id)
    }

    /// Resolve `id`, falling back to `{subpath: id, process: id}` for unknown ids.
    pub fn lookup(&self, id: &BrowserId) -> Lookup {
        if let Some(entry) = self.entries.get(id) {
            return Lookup {
                entry: entry.clone(),
                fallback: false,
            };
        }
        tracing::warn!(
            browser = %id,
            "unknown browser; assuming profile directory '{id}' and process '{id}', verify both manually"
        );
        Lookup {
            entry: BrowserEntry::new(id.clone(), id.as_str(), id.as_str(), ProfileRoot::ConfigHome),
            fallback: true,
        }
    }

    /// Known identifiers in sorted order.
    pub fn known_ids(&self) -> impl Iterator<Item = &BrowserId> {
        self.entries.keys()
    }
}

// ---------------------------------------------------------------------------
// 3. User file
// ---------------------------------------------------------------------------

fn load_user_entries(path: &Path) -> Result<Vec<BrowserEntry>, CoreError> {
    if !path.exists() {
        return Ok(vec![]);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(vec![]);
    }
    serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> BrowserId {
        BrowserId::parse(s).expect("valid id")
    }

    #[test]
    fn builtins_are_complete() {
        let registry = BrowserRegistry::with_builtins();
        assert_eq!(registry.known_ids().count(), BUILTINS.len());
    }

    #[test]
    fn explicit_entry_is_not_fallback() {
        let registry = BrowserRegistry::with_builtins();
        let found = registry.lookup(&id("vivaldi"));
        assert!(!found.fallback);
        assert_eq!(found.entry.process_name, "vivaldi-bin");
    }

    #[test]
    fn fallback_does_not_insert() {
        let registry = BrowserRegistry::with_builtins();
        let _ = registry.lookup(&id("netsurf"));
        assert!(registry.get(&id("netsurf")).is_none());
    }
}
