//! ramprofile core library: domain types, browser registry, psd config, errors.
//!
//! - [`types`]: identifiers, browser entries, selection, flags
//! - [`registry`]: built-in and user browser entries plus the fallback rule
//! - [`config`]: `psd.conf` rendering and replacement
//! - [`paths`]: [`paths::Layout`] and fixed names
//! - [`host`]: capability traits for external tools
//! - [`error`]: [`CoreError`]

pub mod config;
pub mod error;
pub mod host;
pub mod paths;
pub mod registry;
pub mod types;

pub use config::{write_config_at, MaterializeOutcome, RuntimeConfig};
pub use error::CoreError;
pub use paths::Layout;
pub use registry::{BrowserRegistry, Lookup};
pub use types::{BrowserEntry, BrowserId, Flags, ProfileRoot, Selection, ServiceState};
