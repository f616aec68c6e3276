//! Overlay prerequisites: a no-prompt rule for the overlay helper and the
//! `overlay` kernel module.
//!
//! Nothing here aborts the run. A missing rule, a failed smoke check or an
//! unloadable module is reported as [`EnablerOutcome::Degraded`] because each
//! is fixed outside this run (new login session, reboot, manual modprobe).

use ramprofile_core::host::{Elevator, PrivilegeTool};
use ramprofile_core::paths::{OVERLAY_HELPER, OVERLAY_MODULE};
use ramprofile_core::Layout;
use serde::Serialize;

const SUDOERS_MODE: u32 = 0o440;
const DOAS_MODE: u32 = 0o400;
const STAGED_RULE_NAME: &str = "psd-overlay-helper.new";

/// Result of [`enable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reasons", rename_all = "lowercase")]
pub enum EnablerOutcome {
    Ready,
    Degraded(Vec<String>),
}

/// What happened to the authorization rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStatus {
    Created,
    AlreadyPresent,
}

/// Prepare overlay mode for `user`. Returns `Ready` without side effects when
/// `use_overlay` is false.
pub fn enable(use_overlay: bool, user: &str, layout: &Layout, elevator: &dyn Elevator) -> EnablerOutcome {
    if !use_overlay {
        return EnablerOutcome::Ready;
    }

    let mut reasons = Vec::new();

    match ensure_rule(user, layout, elevator) {
        Ok(RuleStatus::Created) => {
            tracing::info!(helper = OVERLAY_HELPER, tool = %elevator.tool(), "created no-prompt rule");
        }
        Ok(RuleStatus::AlreadyPresent) => {
            tracing::info!(helper = OVERLAY_HELPER, "no-prompt rule already present");
        }
        Err(reason) => {
            tracing::warn!("{reason}");
            reasons.push(reason);
        }
    }

    if let Err(reason) = smoke_check(elevator) {
        tracing::warn!("{reason}");
        reasons.push(reason);
    }

    if let Err(reason) = ensure_module(layout, elevator) {
        tracing::warn!("{reason}");
        reasons.push(reason);
    }

    if reasons.is_empty() {
        EnablerOutcome::Ready
    } else {
        EnablerOutcome::Degraded(reasons)
    }
}

/// Authorization line for `user` in the syntax of `tool`.
pub fn rule_line(tool: PrivilegeTool, user: &str) -> String {
    match tool {
        PrivilegeTool::Sudo => format!("{user} ALL=(ALL) NOPASSWD: {OVERLAY_HELPER}"),
        PrivilegeTool::Doas => format!("permit nopass {user} as root cmd {OVERLAY_HELPER}"),
    }
}

/// Create the rule once; a second call finds it and writes nothing.
pub fn ensure_rule(user: &str, layout: &Layout, elevator: &dyn Elevator) -> Result<RuleStatus, String> {
    if user.trim().is_empty() {
        return Err("cannot determine the user name; set $USER and re-run to create the no-prompt rule".to_string());
    }
    match elevator.tool() {
        PrivilegeTool::Sudo => ensure_sudoers_rule(user, layout, elevator),
        PrivilegeTool::Doas => ensure_doas_rule(user, layout, elevator),
    }
}

fn ensure_sudoers_rule(user: &str, layout: &Layout, elevator: &dyn Elevator) -> Result<RuleStatus, String> {
    let path = layout.sudoers_rule_path();
    let exists = elevator
        .path_exists(&path)
        .map_err(|e| format!("could not check {}: {e}", path.display()))?;
    if exists {
        return Ok(RuleStatus::AlreadyPresent);
    }

    // sudo skips sudoers.d names containing '.', so the rule is validated
    // there and only then moved to its live name.
    let staged = path.with_file_name(STAGED_RULE_NAME);
    let staged_arg = staged.display().to_string();
    let target = path.display().to_string();

    let line = format!("{}\n", rule_line(PrivilegeTool::Sudo, user));
    let out = elevator
        .write_file(&staged, &line, SUDOERS_MODE)
        .map_err(|e| format!("could not write {staged_arg}: {e}"))?;
    if !out.success() {
        return Err(format!("could not write {staged_arg}: {}", out.detail()));
    }

    let validated = elevator
        .run("visudo", &["-cf", &staged_arg])
        .map(|o| o.success())
        .unwrap_or(false);
    if !validated {
        return Err(match remove_staged(elevator, &staged_arg) {
            Ok(()) => format!("visudo rejected the rule; {staged_arg} removed"),
            Err(detail) => format!(
                "visudo rejected the rule and {staged_arg} could not be removed ({detail}); sudo ignores it, delete it manually"
            ),
        });
    }

    let moved = elevator
        .run("mv", &["-f", &staged_arg, &target])
        .map_err(|e| e.to_string())
        .and_then(|o| if o.success() { Ok(()) } else { Err(o.detail()) });
    if let Err(detail) = moved {
        let _ = remove_staged(elevator, &staged_arg);
        return Err(format!("could not move {staged_arg} to {target}: {detail}"));
    }
    Ok(RuleStatus::Created)
}

fn remove_staged(elevator: &dyn Elevator, staged: &str) -> Result<(), String> {
    let out = elevator.run("rm", &["-f", staged]).map_err(|e| e.to_string())?;
    if out.success() {
        Ok(())
    } else {
        Err(out.detail())
    }
}

fn ensure_doas_rule(user: &str, layout: &Layout, elevator: &dyn Elevator) -> Result<RuleStatus, String> {
    let path = layout.doas_config_path();
    let existing = elevator
        .read_file(&path)
        .map_err(|e| format!("could not read {}: {e}", path.display()))?
        .unwrap_or_default();

    let line = rule_line(PrivilegeTool::Doas, user);
    if existing.lines().any(|l| l.trim() == line) {
        return Ok(RuleStatus::AlreadyPresent);
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&line);
    updated.push('\n');

    let out = elevator
        .write_file(&path, &updated, DOAS_MODE)
        .map_err(|e| format!("could not write {}: {e}", path.display()))?;
    if !out.success() {
        return Err(format!("could not write {}: {}", path.display(), out.detail()));
    }
    Ok(RuleStatus::Created)
}

fn smoke_check(elevator: &dyn Elevator) -> Result<(), String> {
    let out = elevator
        .check_no_prompt(OVERLAY_HELPER)
        .map_err(|e| format!("could not verify no-prompt access to {OVERLAY_HELPER}: {e}"))?;
    if out.success() {
        return Ok(());
    }
    Err(format!(
        "{} still asks for a password for {OVERLAY_HELPER}; log out and back in for the rule to take effect",
        elevator.tool()
    ))
}

/// Whether the overlay module is loaded or built in.
pub fn module_loaded(layout: &Layout) -> bool {
    if layout.kernel_module_dir(OVERLAY_MODULE).exists() {
        return true;
    }
    std::fs::read_to_string(layout.proc_filesystems())
        .map(|text| {
            text.lines()
                .any(|l| l.split_whitespace().last() == Some(OVERLAY_MODULE))
        })
        .unwrap_or(false)
}

fn ensure_module(layout: &Layout, elevator: &dyn Elevator) -> Result<(), String> {
    if module_loaded(layout) {
        tracing::info!(module = OVERLAY_MODULE, "kernel module already loaded");
        return Ok(());
    }
    let out = elevator
        .run("modprobe", &[OVERLAY_MODULE])
        .map_err(|e| format!("could not run modprobe {OVERLAY_MODULE}: {e}"))?;
    if !out.success() {
        return Err(format!(
            "modprobe {OVERLAY_MODULE} failed ({}); overlay mode may not work until it is loaded",
            out.detail()
        ));
    }
    tracing::info!(module = OVERLAY_MODULE, "loaded kernel module");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHost, TestDirs};

    #[test]
    fn disabled_overlay_touches_nothing() {
        let dirs = TestDirs::new();
        let host = FakeHost::default().failing_smoke();
        assert_eq!(enable(false, "ada", &dirs.layout(), &host), EnablerOutcome::Ready);
        assert!(host.calls().is_empty());
    }

    #[test]
    fn sudoers_rule_created_once() {
        let dirs = TestDirs::new();
        let layout = dirs.layout();
        let host = FakeHost::default();

        assert_eq!(ensure_rule("ada", &layout, &host), Ok(RuleStatus::Created));
        assert_eq!(ensure_rule("ada", &layout, &host), Ok(RuleStatus::AlreadyPresent));

        let writes = host
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("write"))
            .count();
        assert_eq!(writes, 1);

        let text = std::fs::read_to_string(layout.sudoers_rule_path()).expect("rule");
        assert_eq!(text, "ada ALL=(ALL) NOPASSWD: /usr/bin/psd-overlay-helper\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(layout.sudoers_rule_path())
                .unwrap()
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(mode, 0o440);
        }
    }

    #[test]
    fn sudoers_rule_is_validated_before_going_live() {
        let dirs = TestDirs::new();
        let layout = dirs.layout();
        let host = FakeHost::default();

        ensure_rule("ada", &layout, &host).expect("rule");

        let live = layout.sudoers_rule_path();
        let staged = live.with_file_name("psd-overlay-helper.new");
        assert_eq!(
            host.calls(),
            vec![
                format!("write {} 440", staged.display()),
                format!("elevate visudo -cf {}", staged.display()),
                format!("elevate mv -f {} {}", staged.display(), live.display()),
            ]
        );
        assert!(live.exists());
        assert!(!staged.exists());
    }

    #[test]
    fn invalid_sudoers_rule_never_goes_live() {
        let dirs = TestDirs::new();
        let layout = dirs.layout();
        let host = FakeHost::default();
        host.fail_program("visudo");

        let err = ensure_rule("ada", &layout, &host).unwrap_err();
        assert!(err.contains("visudo rejected the rule"));
        assert!(err.ends_with("removed"));
        assert!(!layout.sudoers_rule_path().exists());
        assert!(!layout.sudoers_rule_path().with_file_name("psd-overlay-helper.new").exists());
    }

    #[test]
    fn failed_cleanup_is_reported_truthfully() {
        let dirs = TestDirs::new();
        let layout = dirs.layout();
        let host = FakeHost::default();
        host.fail_program("visudo");
        host.fail_program("rm");

        let err = ensure_rule("ada", &layout, &host).unwrap_err();
        let staged = layout.sudoers_rule_path().with_file_name("psd-overlay-helper.new");
        assert!(err.contains("could not be removed"), "{err}");
        assert!(staged.exists());
        assert!(!layout.sudoers_rule_path().exists());
    }

    #[test]
    fn empty_user_writes_no_rule() {
        let dirs = TestDirs::new();
        let layout = dirs.layout();
        let host = FakeHost::default();

        let err = ensure_rule("  ", &layout, &host).unwrap_err();
        assert!(err.contains("cannot determine the user name"));
        assert!(host.calls().is_empty());

        let EnablerOutcome::Degraded(reasons) = enable(true, "", &layout, &host) else {
            panic!("expected degraded outcome");
        };
        assert!(reasons[0].contains("cannot determine the user name"));
        assert!(!host.calls().iter().any(|c| c.starts_with("write")));
        assert!(!layout.sudoers_rule_path().exists());
    }

    #[test]
    fn doas_rule_appended_once() {
        let dirs = TestDirs::new();
        let layout = dirs.layout();
        dirs.write(&layout.doas_config_path(), "permit persist :wheel");
        let host = FakeHost::default().with_tool(PrivilegeTool::Doas);

        assert_eq!(ensure_rule("ada", &layout, &host), Ok(RuleStatus::Created));
        assert_eq!(ensure_rule("ada", &layout, &host), Ok(RuleStatus::AlreadyPresent));

        let text = std::fs::read_to_string(layout.doas_config_path()).expect("doas.conf");
        assert_eq!(
            text,
            "permit persist :wheel\npermit nopass ada as root cmd /usr/bin/psd-overlay-helper\n"
        );
    }

    #[test]
    fn smoke_failure_degrades_but_continues_to_module() {
        let dirs = TestDirs::new();
        let host = FakeHost::default().failing_smoke();

        let outcome = enable(true, "ada", &dirs.layout(), &host);
        let EnablerOutcome::Degraded(reasons) = outcome else {
            panic!("expected degraded outcome");
        };
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("log out and back in"));
        assert!(host.calls().iter().any(|c| c == "elevate modprobe overlay"));
    }

    #[test]
    fn loaded_module_skips_modprobe() {
        let dirs = TestDirs::new();
        let layout = dirs.layout();
        std::fs::create_dir_all(layout.kernel_module_dir("overlay")).expect("mkdir");
        let host = FakeHost::default();

        assert_eq!(enable(true, "ada", &layout, &host), EnablerOutcome::Ready);
        assert!(!host.calls().iter().any(|c| c.contains("modprobe")));
    }

    #[test]
    fn builtin_overlay_detected_from_proc_filesystems() {
        let dirs = TestDirs::new();
        let layout = dirs.layout();
        dirs.write(&layout.proc_filesystems(), "nodev\tsysfs\nnodev\toverlay\n\text4\n");
        assert!(module_loaded(&layout));
    }

    #[test]
    fn modprobe_failure_is_only_a_warning() {
        let dirs = TestDirs::new();
        let host = FakeHost::default();
        host.fail_program("modprobe");

        let EnablerOutcome::Degraded(reasons) = enable(true, "ada", &dirs.layout(), &host) else {
            panic!("expected degraded outcome");
        };
        assert!(reasons.iter().any(|r| r.contains("overlay mode may not work")));
    }

    #[test]
    fn refused_rule_write_is_degraded() {
        let dirs = TestDirs::new();
        let host = FakeHost::default().refusing_writes();
        let EnablerOutcome::Degraded(reasons) = enable(true, "ada", &dirs.layout(), &host) else {
            panic!("expected degraded outcome");
        };
        assert!(reasons[0].contains("could not write"));
    }
}
