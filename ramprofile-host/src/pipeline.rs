//! Setup pipeline: one full configuration run from browser selection to an
//! active psd service.
//!
//! ```text
//! selection → preflight → registry → detection records → profile check
//!   → psd.conf → overlay prerequisites → conflicts → service → resync timer
//! ```
//!
//! Every mutating stage is idempotent, so the whole run is safe to repeat.
//! Stages keep each browser's own [`BrowserEntry`] throughout.

use std::path::PathBuf;
use std::time::Duration;

use ramprofile_core::host::{Elevator, ProcessControl, Prompter, ServiceControl, ToolLocator};
use ramprofile_core::paths::{KILL_PAUSE, LAUNCH_PAUSE};
use ramprofile_core::{
    write_config_at, BrowserEntry, BrowserId, BrowserRegistry, Flags, Layout, RuntimeConfig,
    Selection,
};
use ramprofile_detector::{ensure_record, RecordOutcome};
use serde::Serialize;

use crate::conflicts::{self, ResolvedSet};
use crate::enabler::{self, EnablerOutcome};
use crate::error::HostError;
use crate::lifecycle::{self, Activation};
use crate::preflight::{self, PreflightReport};
use crate::profiles::{self, ProfileStatus};
use crate::timer::{self, TimerOutcome};

/// Fixed waits between stages. Tests use [`Pauses::none`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pauses {
    pub after_kill: Duration,
    pub after_launch: Duration,
}

impl Default for Pauses {
    fn default() -> Self {
        Self {
            after_kill: KILL_PAUSE,
            after_launch: LAUNCH_PAUSE,
        }
    }
}

impl Pauses {
    pub fn none() -> Self {
        Self {
            after_kill: Duration::ZERO,
            after_launch: Duration::ZERO,
        }
    }
}

/// Borrowed capability set for one run.
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    pub elevator: &'a dyn Elevator,
    pub services: &'a dyn ServiceControl,
    pub processes: &'a dyn ProcessControl,
    pub tools: &'a dyn ToolLocator,
    pub prompter: &'a dyn Prompter,
}

impl<'a> Capabilities<'a> {
    /// All capabilities served by one value.
    pub fn from_host<H>(host: &'a H) -> Self
    where
        H: Elevator + ServiceControl + ProcessControl + ToolLocator + Prompter,
    {
        Self {
            elevator: host,
            services: host,
            processes: host,
            tools: host,
            prompter: host,
        }
    }
}

/// Operator choices for a run.
#[derive(Debug, Clone)]
pub struct SetupOptions {
    pub flags: Flags,
    /// Browser list given up front; prompts when `None`.
    pub browsers: Option<String>,
    /// Answer yes to every confirmation.
    pub assume_yes: bool,
    /// Account the overlay rule is written for.
    pub user: String,
    pub pauses: Pauses,
}

/// Per-browser summary row.
#[derive(Debug, Clone, Serialize)]
pub struct BrowserReport {
    pub id: BrowserId,
    pub process_name: String,
    pub profile_dir: PathBuf,
    pub fallback: bool,
    pub record_created: bool,
    pub record_path: PathBuf,
    pub profile: ProfileStatus,
}

/// Everything a run did, for display or JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct SetupReport {
    pub preflight: PreflightReport,
    pub browsers: Vec<BrowserReport>,
    pub config: RuntimeConfig,
    pub config_path: PathBuf,
    /// No parseable config existed before this run.
    pub config_created: bool,
    pub changed_settings: Vec<&'static str>,
    pub overlay: EnablerOutcome,
    pub conflicts: ResolvedSet,
    pub service: Activation,
    pub timer: TimerOutcome,
    /// Non-fatal conditions the operator should look at.
    pub advisories: Vec<String>,
}

/// Run the whole setup sequence.
pub fn run_setup(
    layout: &Layout,
    options: &SetupOptions,
    caps: Capabilities<'_>,
) -> Result<SetupReport, HostError> {
    let selection = read_selection(options, caps.prompter)?;
    let preflight = preflight::check(layout, caps.tools, caps.elevator)?;

    let mut advisories = Vec::new();
    if preflight.tmp_is_tmpfs == Some(false) {
        advisories.push("/tmp is not mounted as tmpfs".to_string());
    }

    // Registry: one entry per requested identifier, carried through every stage.
    let registry = BrowserRegistry::load_at(layout)?;
    let lookups: Vec<_> = selection.ids().iter().map(|id| registry.lookup(id)).collect();
    for lookup in lookups.iter().filter(|l| l.fallback) {
        advisories.push(format!(
            "{} is not a known browser; verify {} and process '{}'",
            lookup.entry.identifier,
            layout.profile_dir(&lookup.entry).display(),
            lookup.entry.process_name
        ));
    }
    let entries: Vec<BrowserEntry> = lookups.iter().map(|l| l.entry.clone()).collect();

    let records: Vec<RecordOutcome> = entries
        .iter()
        .map(|entry| ensure_record(entry, layout, caps.elevator))
        .collect::<Result<_, _>>()?;

    let profiles = profiles::ensure_profiles(
        &entries,
        layout,
        caps.processes,
        |id| {
            confirm(
                caps.prompter,
                options.assume_yes,
                &format!("Profile for {id} does not exist. Launch {id} once to create it?"),
            )
        },
        options.pauses.after_launch,
    )?;
    for check in profiles.iter().filter(|c| c.status == ProfileStatus::Missing) {
        advisories.push(format!(
            "profile directory for {} is missing: {}",
            check.browser,
            check.path.display()
        ));
    }

    let config = RuntimeConfig::from_choices(&selection, options.flags);
    let materialized = write_config_at(layout, &config)?;
    let changed_settings = materialized.changed_fields();
    let config_created = materialized.previous.is_none();
    if !changed_settings.is_empty() {
        tracing::info!(changed = %changed_settings.join(", "), "psd configuration changed");
    }

    let overlay = enabler::enable(options.flags.use_overlay, &options.user, layout, caps.elevator);
    if let EnablerOutcome::Degraded(reasons) = &overlay {
        advisories.extend(reasons.iter().cloned());
    }

    let conflicts = conflicts::resolve(
        &entries,
        caps.processes,
        |names| {
            confirm(
                caps.prompter,
                options.assume_yes,
                &format!(
                    "Running browsers will lock their profiles: {}. Close them now?",
                    names.join(", ")
                ),
            )
        },
        options.pauses.after_kill,
    )?;
    if conflicts.declined {
        advisories.push(format!(
            "left running: {}; psd may fail on locked files",
            conflicts.running.join(", ")
        ));
    }

    let service = lifecycle::ensure_active(caps.services)?;

    let timer = timer::apply(config.sync_interval_minutes, layout, caps.services)?;
    if let TimerOutcome::Default { stale: Some(path) } = &timer {
        advisories.push(format!("earlier resync override still active: {}", path.display()));
    }

    let browsers = entries
        .iter()
        .zip(lookups.iter())
        .zip(records.iter().zip(profiles.iter()))
        .map(|((entry, lookup), (record, profile))| BrowserReport {
            id: entry.identifier.clone(),
            process_name: entry.process_name.clone(),
            profile_dir: profile.path.clone(),
            fallback: lookup.fallback,
            record_created: record.created(),
            record_path: record.path().to_path_buf(),
            profile: profile.status,
        })
        .collect();

    Ok(SetupReport {
        preflight,
        browsers,
        config,
        config_path: materialized.path,
        config_created,
        changed_settings,
        overlay,
        conflicts,
        service,
        timer,
        advisories,
    })
}

fn read_selection(options: &SetupOptions, prompter: &dyn Prompter) -> Result<Selection, HostError> {
    let raw = match &options.browsers {
        Some(list) => list.clone(),
        None => prompter
            .ask_line("Browsers to sync (comma or space separated)")
            .map_err(HostError::Prompt)?,
    };
    Ok(Selection::parse(&raw)?)
}

fn confirm(prompter: &dyn Prompter, assume_yes: bool, question: &str) -> Result<bool, HostError> {
    if assume_yes {
        return Ok(true);
    }
    prompter.confirm(question, true).map_err(HostError::Prompt)
}
