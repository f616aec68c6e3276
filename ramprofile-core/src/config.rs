//! psd runtime configuration (`psd.conf`).
//!
//! The file is regenerated from scratch on every run: the browser list is an
//! explicit bash array and each flag is its own named assignment. Nothing from
//! a previous file is carried over.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{io_err, CoreError};
use crate::paths::{Layout, BACKUP_LIMIT, FAST_SYNC_MINUTES};
use crate::types::{BrowserId, Flags, Selection};

const BANNER: &str = "# Generated by ramprofile. Re-running setup replaces this file.";

/// Everything psd reads from its configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeConfig {
    pub browsers: Vec<BrowserId>,
    pub use_overlay: bool,
    pub use_backups: bool,
    pub backup_limit: u32,
    /// `None` keeps the daemon's own resync cadence.
    pub sync_interval_minutes: Option<u32>,
}

/// Result of [`write_config_at`].
#[derive(Debug, Clone)]
pub struct MaterializeOutcome {
    pub path: PathBuf,
    pub config: RuntimeConfig,
    /// Parsed content of the file that was replaced, if one existed and parsed.
    pub previous: Option<RuntimeConfig>,
}

impl MaterializeOutcome {
    /// Names of the settings that differ from the replaced file.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let Some(prev) = &self.previous else {
            return vec![];
        };
        let cur = &self.config;
        let mut changed = Vec::new();
        if prev.browsers != cur.browsers {
            changed.push("BROWSERS");
        }
        if prev.use_overlay != cur.use_overlay {
            changed.push("USE_OVERLAYFS");
        }
        if prev.use_backups != cur.use_backups {
            changed.push("USE_BACKUPS");
        }
        if prev.backup_limit != cur.backup_limit {
            changed.push("BACKUP_LIMIT");
        }
        if prev.sync_interval_minutes != cur.sync_interval_minutes {
            changed.push("SYNC_INTERVAL_MINUTES");
        }
        changed
    }
}

impl RuntimeConfig {
    pub fn from_choices(selection: &Selection, flags: Flags) -> Self {
        Self {
            browsers: selection.ids().to_vec(),
            use_overlay: flags.use_overlay,
            use_backups: flags.use_backups,
            backup_limit: BACKUP_LIMIT,
            sync_interval_minutes: flags.fast_sync.then_some(FAST_SYNC_MINUTES),
        }
    }

    /// Render as `psd.conf` text.
    pub fn render(&self) -> String {
        let browsers: Vec<&str> = self.browsers.iter().map(BrowserId::as_str).collect();
        let mut out = String::new();
        out.push_str(BANNER);
        out.push('\n');
        out.push_str(&format!("BROWSERS=({})\n", browsers.join(" ")));
        out.push_str(&format!("USE_OVERLAYFS=\"{}\"\n", yes_no(self.use_overlay)));
        out.push_str(&format!("USE_BACKUPS=\"{}\"\n", yes_no(self.use_backups)));
        out.push_str(&format!("BACKUP_LIMIT={}\n", self.backup_limit));
        if let Some(minutes) = self.sync_interval_minutes {
            out.push_str(&format!("SYNC_INTERVAL_MINUTES={minutes}\n"));
        }
        out
    }

    /// Parse text produced by [`RuntimeConfig::render`].
    ///
    /// Returns `None` for files that do not carry a browser list, such as the
    /// commented template psd installs.
    pub fn parse(text: &str) -> Option<Self> {
        let mut browsers = None;
        let mut use_overlay = false;
        let mut use_backups = false;
        let mut backup_limit = BACKUP_LIMIT;
        let mut sync_interval_minutes = None;

        for line in text.lines().map(str::trim) {
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "BROWSERS" => {
                    let inner = value.trim_start_matches('(').trim_end_matches(')');
                    browsers = Some(
                        inner
                            .split_whitespace()
                            .filter_map(|t| BrowserId::parse(t.trim_matches('"')).ok())
                            .collect::<Vec<_>>(),
                    );
                }
                "USE_OVERLAYFS" => use_overlay = value == "yes",
                "USE_BACKUPS" => use_backups = value == "yes",
                "BACKUP_LIMIT" => backup_limit = value.parse().unwrap_or(BACKUP_LIMIT),
                "SYNC_INTERVAL_MINUTES" => sync_interval_minutes = value.parse().ok(),
                _ => {}
            }
        }

        Some(Self {
            browsers: browsers?,
            use_overlay,
            use_backups,
            backup_limit,
            sync_interval_minutes,
        })
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Replace `<config_home>/psd/psd.conf` with `config`.
///
/// Write flow: render → `psd.conf.tmp` sibling → `rename`.
pub fn write_config_at(layout: &Layout, config: &RuntimeConfig) -> Result<MaterializeOutcome, CoreError> {
    let path = layout.psd_config_path();
    let previous = read_existing(&path)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = path.with_file_name("psd.conf.tmp");
    std::fs::write(&tmp, config.render()).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }

    tracing::info!(path = %path.display(), "wrote psd configuration");
    Ok(MaterializeOutcome {
        path,
        config: config.clone(),
        previous,
    })
}

fn read_existing(path: &Path) -> Result<Option<RuntimeConfig>, CoreError> {
    if !path.exists() {
        return Ok(None);
    }
    // Hand edits may leave invalid UTF-8; the file is replaced either way.
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    Ok(RuntimeConfig::parse(&String::from_utf8_lossy(&bytes)))
}
