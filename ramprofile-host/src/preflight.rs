//! Preconditions checked before the first mutation.

use std::path::Path;

use ramprofile_core::host::{Elevator, ToolLocator};
use ramprofile_core::paths::{DAEMON_BINARY, PACKAGE_NAME};
use ramprofile_core::Layout;
use serde::Serialize;

use crate::error::{command_err, HostError};

/// Package managers tried in order, with their non-interactive install arguments.
const PACKAGE_MANAGERS: &[(&str, &[&str])] = &[
    ("pacman", &["-S", "--needed", "--noconfirm"]),
    ("apt-get", &["install", "-y"]),
    ("dnf", &["install", "-y"]),
    ("zypper", &["--non-interactive", "install"]),
];

/// Result of the precondition checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreflightReport {
    /// Package manager used to install psd during this run, if any.
    pub installed_with: Option<String>,
    /// `None` when the mount table could not be read.
    pub tmp_is_tmpfs: Option<bool>,
}

/// Verify required tools, installing psd when it is missing.
pub fn check(
    layout: &Layout,
    tools: &dyn ToolLocator,
    elevator: &dyn Elevator,
) -> Result<PreflightReport, HostError> {
    require(tools, "systemctl", "a systemd user session is required")?;
    let tool = elevator.tool();
    require(
        tools,
        tool.program(),
        "install it or pick another one with --privilege-tool",
    )?;

    let installed_with = if tools.find(DAEMON_BINARY).is_none() {
        Some(install_daemon(tools, elevator)?)
    } else {
        None
    };

    let tmp_is_tmpfs = tmp_is_tmpfs(&layout.proc_mounts());
    match tmp_is_tmpfs {
        Some(false) => tracing::warn!(
            "/tmp is not a tmpfs mount; psd keeps profiles in $XDG_RUNTIME_DIR, but check your memory-backed storage"
        ),
        Some(true) => {}
        None => tracing::debug!("could not read mount table; skipping tmpfs check"),
    }

    Ok(PreflightReport {
        installed_with,
        tmp_is_tmpfs,
    })
}

fn require(tools: &dyn ToolLocator, program: &str, hint: &str) -> Result<(), HostError> {
    if tools.find(program).is_none() {
        return Err(HostError::MissingTool {
            tool: program.to_string(),
            hint: hint.to_string(),
        });
    }
    Ok(())
}

fn install_daemon(tools: &dyn ToolLocator, elevator: &dyn Elevator) -> Result<String, HostError> {
    let Some((manager, args)) = PACKAGE_MANAGERS
        .iter()
        .find(|(manager, _)| tools.find(manager).is_some())
    else {
        return Err(HostError::MissingTool {
            tool: DAEMON_BINARY.to_string(),
            hint: format!("no supported package manager found; install {PACKAGE_NAME} manually"),
        });
    };

    tracing::info!(manager, package = PACKAGE_NAME, "installing profile-sync-daemon");
    let mut full: Vec<&str> = args.to_vec();
    full.push(PACKAGE_NAME);
    let out = elevator
        .run(manager, &full)
        .map_err(|e| command_err(*manager, e))?;
    if !out.success() {
        return Err(HostError::InstallFailed {
            package: PACKAGE_NAME.to_string(),
            detail: out.detail(),
        });
    }
    Ok(manager.to_string())
}

/// Whether `/tmp` is a tmpfs mount according to `mounts` (`/proc/mounts` format).
pub fn tmp_is_tmpfs(mounts: &Path) -> Option<bool> {
    let text = std::fs::read_to_string(mounts).ok()?;
    let tmp_fs = text.lines().rev().find_map(|line| {
        let mut fields = line.split_whitespace();
        let _device = fields.next()?;
        let mount_point = fields.next()?;
        let fs_type = fields.next()?;
        (mount_point == "/tmp").then(|| fs_type.to_string())
    });
    Some(matches!(tmp_fs.as_deref(), Some("tmpfs")))
}
