//! Resync timer override (`psd-resync.timer.d/frequency.conf`).

use std::path::PathBuf;

use ramprofile_core::host::{CommandOutput, ServiceControl};
use ramprofile_core::paths::RESYNC_TIMER_UNIT;
use ramprofile_core::Layout;
use serde::Serialize;

use crate::error::{command_err, io_err, HostError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TimerOutcome {
    /// No override requested. `stale` names an override left by an earlier run.
    Default { stale: Option<PathBuf> },
    Applied { path: PathBuf, minutes: u32 },
}

/// Drop-in text replacing the timer's `OnUnitActiveSec`.
///
/// The empty assignment clears the packaged value before setting the new one.
pub fn render_override(minutes: u32) -> String {
    format!(
        "[Unit]\n\
         Description=Timer for profile-sync-daemon - {minutes}min\n\
         \n\
         [Timer]\n\
         OnUnitActiveSec=\n\
         OnUnitActiveSec={minutes}min\n"
    )
}

/// Write the override, reload unit files and restart the timer.
pub fn apply(
    interval_minutes: Option<u32>,
    layout: &Layout,
    services: &dyn ServiceControl,
) -> Result<TimerOutcome, HostError> {
    let path = layout.timer_override_path();
    let Some(minutes) = interval_minutes else {
        let stale = path.exists().then(|| path.clone());
        if let Some(stale) = &stale {
            tracing::warn!(
                path = %stale.display(),
                "a resync override from an earlier run is still active; delete it to restore the default cadence"
            );
        }
        return Ok(TimerOutcome::Default { stale });
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = path.with_file_name("frequency.conf.tmp");
    std::fs::write(&tmp, render_override(minutes)).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }

    let out = services
        .daemon_reload()
        .map_err(|e| command_err("systemctl", e))?;
    check("daemon-reload", "", out)?;
    let out = services
        .restart(RESYNC_TIMER_UNIT)
        .map_err(|e| command_err("systemctl", e))?;
    check("restart", RESYNC_TIMER_UNIT, out)?;

    tracing::info!(unit = RESYNC_TIMER_UNIT, minutes, "resync timer override applied");
    Ok(TimerOutcome::Applied { path, minutes })
}

fn check(action: &'static str, unit: &str, out: CommandOutput) -> Result<(), HostError> {
    if out.success() {
        return Ok(());
    }
    Err(HostError::ServiceCommand {
        action,
        unit: unit.to_string(),
        detail: out.detail(),
    })
}
