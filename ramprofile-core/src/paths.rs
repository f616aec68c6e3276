//! Filesystem layout and fixed names.
//!
//! Every path the tool reads or writes is derived from a [`Layout`]. Tests
//! build one with [`Layout::at`] over temp directories; the binary uses
//! [`Layout::from_env`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CoreError;
use crate::types::{BrowserEntry, BrowserId, ProfileRoot};

pub const PACKAGE_NAME: &str = "profile-sync-daemon";
pub const DAEMON_BINARY: &str = "psd";
pub const SERVICE_UNIT: &str = "psd.service";
pub const RESYNC_TIMER_UNIT: &str = "psd-resync.timer";
pub const OVERLAY_HELPER: &str = "/usr/bin/psd-overlay-helper";
pub const OVERLAY_MODULE: &str = "overlay";

pub const BACKUP_LIMIT: u32 = 5;
pub const FAST_SYNC_MINUTES: u32 = 10;
pub const LOG_EXCERPT_LINES: usize = 20;

pub const KILL_PAUSE: Duration = Duration::from_secs(2);
pub const LAUNCH_PAUSE: Duration = Duration::from_secs(5);

/// Resolved directories for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub home: PathBuf,
    pub config_home: PathBuf,
    /// Prefix for system locations (`/usr/share/psd`, `/etc`); `/` outside tests.
    pub system_root: PathBuf,
}

impl Layout {
    pub fn at(home: &Path, config_home: &Path, system_root: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            config_home: config_home.to_path_buf(),
            system_root: system_root.to_path_buf(),
        }
    }

    /// `$XDG_CONFIG_HOME` when set and absolute, else `$HOME/.config`.
    pub fn from_env() -> Result<Self, CoreError> {
        let home = dirs::home_dir().ok_or(CoreError::HomeNotFound)?;
        let config_home = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .filter(|p| p.is_absolute())
            .unwrap_or_else(|| home.join(".config"));
        Ok(Self::at(&home, &config_home, Path::new("/")))
    }

    fn system(&self, rel: &str) -> PathBuf {
        self.system_root.join(rel)
    }

    /// `<system>/usr/share/psd/browsers/`
    pub fn detection_dir(&self) -> PathBuf {
        self.system("usr/share/psd/browsers")
    }

    /// `<system>/usr/share/psd/browsers/<id>`
    pub fn detection_record_path(&self, id: &BrowserId) -> PathBuf {
        self.detection_dir().join(id.as_str())
    }

    /// Absolute profile directory for `entry`.
    pub fn profile_dir(&self, entry: &BrowserEntry) -> PathBuf {
        let base = match entry.root {
            ProfileRoot::ConfigHome => &self.config_home,
            ProfileRoot::Home => &self.home,
        };
        base.join(&entry.profile_subpath)
    }

    /// `<config_home>/psd/psd.conf`
    pub fn psd_config_path(&self) -> PathBuf {
        self.config_home.join("psd").join("psd.conf")
    }

    /// `<config_home>/ramprofile/browsers.yaml`
    pub fn user_registry_path(&self) -> PathBuf {
        self.config_home.join("ramprofile").join("browsers.yaml")
    }

    /// `<config_home>/systemd/user/psd-resync.timer.d/frequency.conf`
    pub fn timer_override_path(&self) -> PathBuf {
        self.config_home
            .join("systemd")
            .join("user")
            .join(format!("{RESYNC_TIMER_UNIT}.d"))
            .join("frequency.conf")
    }

    /// `<system>/etc/sudoers.d/psd-overlay-helper`
    pub fn sudoers_rule_path(&self) -> PathBuf {
        self.system("etc/sudoers.d/psd-overlay-helper")
    }

    /// `<system>/etc/doas.conf`
    pub fn doas_config_path(&self) -> PathBuf {
        self.system("etc/doas.conf")
    }

    pub fn proc_mounts(&self) -> PathBuf {
        self.system("proc/mounts")
    }

    pub fn proc_filesystems(&self) -> PathBuf {
        self.system("proc/filesystems")
    }

    pub fn kernel_module_dir(&self, module: &str) -> PathBuf {
        self.system("sys/module").join(module)
    }
}
