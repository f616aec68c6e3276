//! Running browsers hold locks on the profile directories psd is about to take
//! over. This module finds them and, with the operator's consent, stops them.
//!
//! Targets are tracked by process name, so `google-chrome` and
//! `google-chrome-beta` (both `chrome`) collapse to a single kill target.

use std::time::Duration;

use ramprofile_core::host::{ProcessControl, Termination};
use ramprofile_core::BrowserEntry;
use serde::Serialize;

use crate::error::{command_err, HostError};

/// What [`resolve`] found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedSet {
    /// Distinct running process names, in first-seen order.
    pub running: Vec<String>,
    /// Process names that were signalled or had already exited.
    pub terminated: Vec<String>,
    /// The operator chose to keep the processes running.
    pub declined: bool,
}

/// Distinct process names of `entries` that are currently running.
pub fn find_running(
    entries: &[BrowserEntry],
    processes: &dyn ProcessControl,
) -> Result<Vec<String>, HostError> {
    let mut running: Vec<String> = Vec::new();
    for entry in entries {
        if running.contains(&entry.process_name) {
            continue;
        }
        let alive = processes
            .is_running(&entry.process_name)
            .map_err(|e| command_err("pgrep", e))?;
        if alive {
            tracing::info!(browser = %entry.identifier, process = %entry.process_name, "browser is running");
            running.push(entry.process_name.clone());
        }
    }
    Ok(running)
}

/// Find running browsers and terminate them if `confirm` agrees.
///
/// `confirm` is asked once for the whole set and only when the set is
/// non-empty. A process that exited between the check and the kill counts as
/// terminated.
pub fn resolve(
    entries: &[BrowserEntry],
    processes: &dyn ProcessControl,
    confirm: impl FnOnce(&[String]) -> Result<bool, HostError>,
    pause: Duration,
) -> Result<ResolvedSet, HostError> {
    let running = find_running(entries, processes)?;
    if running.is_empty() {
        return Ok(ResolvedSet::default());
    }

    if !confirm(&running)? {
        tracing::warn!(
            processes = %running.join(", "),
            "leaving browsers running; psd may hit locked profile files"
        );
        return Ok(ResolvedSet {
            running,
            terminated: vec![],
            declined: true,
        });
    }

    let mut terminated = Vec::new();
    for name in &running {
        match processes.terminate(name) {
            Ok(Termination::Signalled) => {
                tracing::info!(process = %name, "sent SIGTERM");
                terminated.push(name.clone());
            }
            Ok(Termination::NotRunning) => {
                tracing::debug!(process = %name, "already exited");
                terminated.push(name.clone());
            }
            Err(err) => {
                tracing::warn!(process = %name, error = %err, "could not terminate process");
            }
        }
    }

    if !pause.is_zero() {
        std::thread::sleep(pause);
    }

    Ok(ResolvedSet {
        running,
        terminated,
        declined: false,
    })
}
