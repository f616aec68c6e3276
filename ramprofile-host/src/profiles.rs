//! psd refuses to manage a profile directory that does not exist yet. For each
//! missing one the operator may launch the browser once to create it.

use std::path::PathBuf;
use std::time::Duration;

use ramprofile_core::host::ProcessControl;
use ramprofile_core::{BrowserEntry, BrowserId, Layout};
use serde::Serialize;

use crate::error::HostError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Present,
    /// Created by launching the browser during this run.
    Launched,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileCheck {
    pub browser: BrowserId,
    pub path: PathBuf,
    pub status: ProfileStatus,
}

/// Check every profile directory, offering a launch for missing ones.
///
/// The browser is launched by its identifier, which is the executable name for
/// every built-in entry. `confirm` receives the browser id.
pub fn ensure_profiles(
    entries: &[BrowserEntry],
    layout: &Layout,
    processes: &dyn ProcessControl,
    mut confirm: impl FnMut(&BrowserId) -> Result<bool, HostError>,
    pause: Duration,
) -> Result<Vec<ProfileCheck>, HostError> {
    let mut checks = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = layout.profile_dir(entry);
        let status = if path.is_dir() {
            ProfileStatus::Present
        } else if confirm(&entry.identifier)? {
            launch_and_wait(entry, &path, processes, pause)
        } else {
            tracing::warn!(
                browser = %entry.identifier,
                path = %path.display(),
                "profile directory missing; psd will not sync this browser until it exists"
            );
            ProfileStatus::Missing
        };
        checks.push(ProfileCheck {
            browser: entry.identifier.clone(),
            path,
            status,
        });
    }
    Ok(checks)
}

fn launch_and_wait(
    entry: &BrowserEntry,
    path: &std::path::Path,
    processes: &dyn ProcessControl,
    pause: Duration,
) -> ProfileStatus {
    if let Err(err) = processes.launch(entry.identifier.as_str()) {
        tracing::warn!(browser = %entry.identifier, error = %err, "could not launch browser");
        return ProfileStatus::Missing;
    }
    tracing::info!(browser = %entry.identifier, "launched browser to create its profile");
    if !pause.is_zero() {
        std::thread::sleep(pause);
    }
    if path.is_dir() {
        ProfileStatus::Launched
    } else {
        tracing::warn!(
            browser = %entry.identifier,
            path = %path.display(),
            "profile directory still missing after launch"
        );
        ProfileStatus::Missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHost, TestDirs};
    use ramprofile_core::BrowserRegistry;

    fn entry(id: &str) -> BrowserEntry {
        BrowserRegistry::with_builtins()
            .lookup(&BrowserId::parse(id).unwrap())
            .entry
    }

    #[test]
    fn existing_profile_is_not_prompted() {
        let dirs = TestDirs::new();
        let layout = dirs.layout();
        let brave = entry("brave");
        std::fs::create_dir_all(layout.profile_dir(&brave)).unwrap();

        let host = FakeHost::default();
        let checks = ensure_profiles(
            &[brave],
            &layout,
            &host,
            |_| panic!("must not prompt"),
            Duration::ZERO,
        )
        .expect("check");
        assert_eq!(checks[0].status, ProfileStatus::Present);
    }

    #[test]
    fn accepted_launch_creates_profile() {
        let dirs = TestDirs::new();
        let layout = dirs.layout();
        let brave = entry("brave");
        let host = FakeHost::default().launching("brave", layout.profile_dir(&brave));

        let checks =
            ensure_profiles(&[brave], &layout, &host, |_| Ok(true), Duration::ZERO).expect("check");
        assert_eq!(checks[0].status, ProfileStatus::Launched);
        assert_eq!(host.calls(), vec!["launch brave"]);
    }

    #[test]
    fn failed_launch_leaves_profile_missing() {
        let dirs = TestDirs::new();
        let host = FakeHost::default();
        let checks = ensure_profiles(
            &[entry("netsurf")],
            &dirs.layout(),
            &host,
            |_| Ok(true),
            Duration::ZERO,
        )
        .expect("check");
        assert_eq!(checks[0].status, ProfileStatus::Missing);
    }

    #[test]
    fn declined_launch_is_missing_without_launch() {
        let dirs = TestDirs::new();
        let host = FakeHost::default();
        let mut asked = Vec::new();
        let checks = ensure_profiles(
            &[entry("brave"), entry("vivaldi")],
            &dirs.layout(),
            &host,
            |id| {
                asked.push(id.to_string());
                Ok(false)
            },
            Duration::ZERO,
        )
        .expect("check");
        assert_eq!(asked, vec!["brave", "vivaldi"]);
        assert!(checks.iter().all(|c| c.status == ProfileStatus::Missing));
        assert!(host.calls().is_empty());
    }
}
