//! Domain types for browser profile synchronization.
//!
//! Path fields use `PathBuf`; identifiers are newtypes so a raw user token can
//! never reach the filesystem without passing through [`BrowserId::parse`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A normalized browser identifier (`brave`, `google-chrome`, ...).
///
/// Always lowercase and free of path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BrowserId(String);

impl BrowserId {
    /// Trim, lowercase and validate a single user-supplied token.
    pub fn parse(token: &str) -> Result<Self, CoreError> {
        let normalized = token.trim().to_lowercase();
        let valid = !normalized.is_empty()
            && !normalized.starts_with('.')
            && normalized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'));
        if !valid {
            return Err(CoreError::InvalidIdentifier {
                token: token.to_string(),
            });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BrowserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for BrowserId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<BrowserId> for String {
    fn from(id: BrowserId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Directory a profile subpath is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProfileRoot {
    /// `$XDG_CONFIG_HOME` (or `$HOME/.config`).
    #[default]
    ConfigHome,
    /// `$HOME`: Firefox-family browsers.
    Home,
}

/// State of the psd user service as reported by the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Inactive,
    Active,
    Failed,
}

impl ServiceState {
    /// Map `systemctl is-active` output to a state.
    pub fn from_is_active(output: &str) -> Self {
        match output.trim() {
            "active" => ServiceState::Active,
            "failed" => ServiceState::Failed,
            _ => ServiceState::Inactive,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Inactive => write!(f, "inactive"),
            ServiceState::Active => write!(f, "active"),
            ServiceState::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Filesystem and process metadata for one browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserEntry {
    #[serde(rename = "id")]
    pub identifier: BrowserId,
    /// Profile directory relative to [`BrowserEntry::root`].
    pub profile_subpath: String,
    /// Exact process name, as matched by `pgrep -x`.
    pub process_name: String,
    #[serde(default)]
    pub root: ProfileRoot,
}

impl BrowserEntry {
    pub fn new(
        identifier: BrowserId,
        profile_subpath: impl Into<String>,
        process_name: impl Into<String>,
        root: ProfileRoot,
    ) -> Self {
        Self {
            identifier,
            profile_subpath: profile_subpath.into(),
            process_name: process_name.into(),
            root,
        }
    }
}

/// Ordered, deduplicated, non-empty set of requested browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection(Vec<BrowserId>);

impl Selection {
    /// Parse free text separated by commas and/or whitespace.
    ///
    /// The first occurrence of an identifier fixes its position.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let mut ids: Vec<BrowserId> = Vec::new();
        for token in input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.trim().is_empty())
        {
            let id = BrowserId::parse(token)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Err(CoreError::EmptySelection);
        }
        Ok(Self(ids))
    }

    pub fn ids(&self) -> &[BrowserId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Feature flags chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub use_overlay: bool,
    pub use_backups: bool,
    pub fast_sync: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            use_overlay: true,
            use_backups: true,
            fast_sync: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_id_is_lowercased_and_trimmed() {
        assert_eq!(BrowserId::parse("  Brave ").unwrap().as_str(), "brave");
    }

    #[test]
    fn browser_id_rejects_path_like_tokens() {
        for bad in ["../etc", "a/b", ".hidden", ""] {
            assert!(
                matches!(BrowserId::parse(bad), Err(CoreError::InvalidIdentifier { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn selection_dedupes_mixed_case() {
        let sel = Selection::parse("Brave, brave BRAVE").expect("parse");
        assert_eq!(sel.ids(), &[BrowserId::parse("brave").unwrap()]);
    }

    #[test]
    fn selection_keeps_first_seen_order() {
        let sel = Selection::parse("vivaldi,brave chromium, vivaldi").expect("parse");
        let names: Vec<&str> = sel.ids().iter().map(BrowserId::as_str).collect();
        assert_eq!(names, vec!["vivaldi", "brave", "chromium"]);
    }

    #[test]
    fn selection_empty_is_error() {
        assert!(matches!(Selection::parse(" ,  , "), Err(CoreError::EmptySelection)));
    }

    #[test]
    fn service_state_from_is_active() {
        assert_eq!(ServiceState::from_is_active("active\n"), ServiceState::Active);
        assert_eq!(ServiceState::from_is_active("failed"), ServiceState::Failed);
        assert_eq!(ServiceState::from_is_active("activating"), ServiceState::Inactive);
        assert_eq!(ServiceState::from_is_active(""), ServiceState::Inactive);
    }
}
