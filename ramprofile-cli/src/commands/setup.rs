//! `ramprofile` setup run: flags, capability wiring and report output.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use ramprofile_core::host::PrivilegeTool;
use ramprofile_core::{Flags, Layout};
use ramprofile_host::enabler::EnablerOutcome;
use ramprofile_host::lifecycle::Transition;
use ramprofile_host::profiles::ProfileStatus;
use ramprofile_host::timer::TimerOutcome;
use ramprofile_host::{
    run_setup, Capabilities, Diagnostics, HostError, Pauses, SetupOptions, SetupReport, SystemHost,
};

use crate::prompt;

/// Options for a setup run.
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Browsers to sync, comma or space separated (e.g. "brave,vivaldi").
    /// Prompts when omitted.
    #[arg(long, value_name = "LIST")]
    pub browsers: Option<String>,

    /// Copy profiles to RAM instead of using an overlay filesystem.
    #[arg(long)]
    pub disable_overlay: bool,

    /// Do not keep crash-recovery snapshots of synced profiles.
    #[arg(long)]
    pub disable_backups: bool,

    /// Resync profiles to disk every 10 minutes instead of the packaged default.
    #[arg(long)]
    pub enable_fast_sync: bool,

    /// Privilege escalation tool: sudo | doas.
    #[arg(long, value_name = "TOOL", default_value_t = PrivilegeTool::Sudo)]
    pub privilege_tool: PrivilegeTool,

    /// Answer yes to every confirmation.
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Emit the setup report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SetupArgs {
    pub fn run(self) -> Result<()> {
        let layout = Layout::from_env().context("could not determine home directory")?;
        let host = SystemHost::new(self.privilege_tool);
        let prompter = prompt::for_stdin();
        let caps = Capabilities {
            elevator: &host,
            services: &host,
            processes: &host,
            tools: &host,
            prompter: prompter.as_ref(),
        };
        let options = SetupOptions {
            flags: self.flags(),
            browsers: self.browsers.clone(),
            assume_yes: self.yes,
            user: current_user(&layout.home),
            pauses: Pauses::default(),
        };

        tracing::debug!(user = %options.user, tool = %self.privilege_tool, "starting setup");
        let report = match run_setup(&layout, &options, caps) {
            Ok(report) => report,
            Err(err) => {
                if let HostError::ServiceFailed { diagnostics, .. } = &err {
                    print_diagnostics(diagnostics);
                }
                return Err(err).context("setup failed");
            }
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize setup report")?
            );
            return Ok(());
        }
        print_summary(&report);
        Ok(())
    }

    fn flags(&self) -> Flags {
        Flags {
            use_overlay: !self.disable_overlay,
            use_backups: !self.disable_backups,
            fast_sync: self.enable_fast_sync,
        }
    }
}

/// Account name for the overlay rule: `$USER`, `$LOGNAME`, then the home
/// directory's name.
fn current_user(home: &Path) -> String {
    user_from(|var| std::env::var(var).ok(), home)
}

fn user_from(lookup: impl Fn(&str) -> Option<String>, home: &Path) -> String {
    ["USER", "LOGNAME"]
        .iter()
        .filter_map(|var| lookup(var))
        .find(|name| !name.trim().is_empty())
        .or_else(|| {
            home.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct BrowserRow {
    #[tabled(rename = "browser")]
    browser: String,
    #[tabled(rename = "process")]
    process: String,
    #[tabled(rename = "profile")]
    profile: String,
    #[tabled(rename = "record")]
    record: String,
    #[tabled(rename = "profile dir")]
    profile_dir: String,
}

fn print_summary(report: &SetupReport) {
    println!(
        "ramprofile v{} | {} browsers | psd {}",
        env!("CARGO_PKG_VERSION"),
        report.browsers.len(),
        transition_label(report.service.transition),
    );

    if let Some(manager) = &report.preflight.installed_with {
        println!("installed profile-sync-daemon with {manager}");
    }

    let rows: Vec<BrowserRow> = report
        .browsers
        .iter()
        .map(|b| BrowserRow {
            browser: if b.fallback {
                format!("{} (unknown)", b.id)
            } else {
                b.id.to_string()
            },
            process: b.process_name.clone(),
            profile: profile_label(b.profile).to_string(),
            record: if b.record_created { "created" } else { "present" }.to_string(),
            profile_dir: b.profile_dir.display().to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if report.config_created {
        println!("{} {} created", "config".bold(), report.config_path.display());
    } else if report.changed_settings.is_empty() {
        println!("{} {} unchanged", "config".bold(), report.config_path.display());
    } else {
        println!(
            "{} {} ({})",
            "config".bold(),
            report.config_path.display(),
            report.changed_settings.join(", ")
        );
    }

    let overlay = match (&report.overlay, report.config.use_overlay) {
        (_, false) => "disabled".bright_black().to_string(),
        (EnablerOutcome::Ready, true) => "ready".green().to_string(),
        (EnablerOutcome::Degraded(_), true) => "degraded".yellow().to_string(),
    };
    println!("{} {overlay}", "overlay".bold());

    let timer = match &report.timer {
        TimerOutcome::Applied { minutes, .. } => format!("every {minutes}min"),
        TimerOutcome::Default { .. } => "packaged default".to_string(),
    };
    println!("{} {timer}", "resync".bold());

    if !report.conflicts.terminated.is_empty() {
        println!(
            "{} {}",
            "closed".bold(),
            report.conflicts.terminated.join(", ")
        );
    }

    for advisory in &report.advisories {
        println!("{} {advisory}", "!".yellow().bold());
    }

    println!("{}", "psd is active.".green().bold());
}

/// Status snapshot and journal excerpt, verbatim, plus what to try next.
fn print_diagnostics(diagnostics: &Diagnostics) {
    eprintln!("{}", "psd did not start. Service status:".red().bold());
    eprintln!("{}", diagnostics.status.trim_end());
    eprintln!("{}", "Recent log lines:".red().bold());
    eprintln!("{}", diagnostics.logs.trim_end());
    eprintln!();
    eprintln!("Close every selected browser, make sure each profile directory exists,");
    eprintln!("then run ramprofile again or `systemctl --user start psd`.");
}

fn transition_label(transition: Transition) -> &'static str {
    match transition {
        Transition::Started => "started",
        Transition::Restarted => "restarted",
    }
}

fn profile_label(status: ProfileStatus) -> &'static str {
    match status {
        ProfileStatus::Present => "present",
        ProfileStatus::Launched => "created",
        ProfileStatus::Missing => "missing",
    }
}
