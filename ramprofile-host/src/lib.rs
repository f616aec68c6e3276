//! Host side of ramprofile: precondition checks, overlay prerequisites,
//! running-browser conflicts, the psd user service and the resync timer,
//! composed by [`pipeline::run_setup`].
//!
//! Every effect on the machine goes through the capability traits in
//! [`ramprofile_core::host`]; [`SystemHost`] implements them with real commands.

pub mod conflicts;
pub mod enabler;
mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod preflight;
pub mod profiles;
pub mod system;
pub mod timer;

#[cfg(test)]
mod testing;

pub use error::{Diagnostics, HostError};
pub use pipeline::{run_setup, Capabilities, Pauses, SetupOptions, SetupReport};
pub use system::SystemHost;
