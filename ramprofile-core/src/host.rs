//! Capability traits for everything outside this process.
//!
//! Setup logic only talks to the host through these traits, so ordering and
//! idempotence can be tested with recording fakes. The `Command`-backed
//! implementations live in `ramprofile-host`.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::types::ServiceState;

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }

    /// Trimmed stderr, or stdout when stderr is empty.
    pub fn detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Tool used to run privileged commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrivilegeTool {
    #[default]
    Sudo,
    Doas,
}

impl PrivilegeTool {
    pub fn program(&self) -> &'static str {
        match self {
            PrivilegeTool::Sudo => "sudo",
            PrivilegeTool::Doas => "doas",
        }
    }
}

impl fmt::Display for PrivilegeTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

impl FromStr for PrivilegeTool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sudo" => Ok(PrivilegeTool::Sudo),
            "doas" => Ok(PrivilegeTool::Doas),
            other => Err(format!("unknown privilege tool '{other}'; expected: sudo, doas")),
        }
    }
}

/// Outcome of asking a process to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Signalled,
    /// Nothing matched; the process had already exited.
    NotRunning,
}

/// Runs commands and writes files with elevated privileges.
pub trait Elevator {
    fn tool(&self) -> PrivilegeTool;

    /// Run `program args...` through the privilege tool, prompting if needed.
    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput>;

    /// Create or replace `path` with `contents` and set its mode.
    fn write_file(&self, path: &Path, contents: &str, mode: u32) -> io::Result<CommandOutput>;

    /// Existence probe for paths inside directories the user cannot read.
    fn path_exists(&self, path: &Path) -> io::Result<bool>;

    /// Contents of a root-only file, `None` when it does not exist.
    fn read_file(&self, path: &Path) -> io::Result<Option<String>>;

    /// Verify `program` may run without a password prompt, without running it.
    fn check_no_prompt(&self, program: &str) -> io::Result<CommandOutput>;
}

/// User service manager (`systemctl --user`, `journalctl --user`).
pub trait ServiceControl {
    fn state(&self, unit: &str) -> io::Result<ServiceState>;
    fn enable(&self, unit: &str) -> io::Result<CommandOutput>;
    fn start(&self, unit: &str) -> io::Result<CommandOutput>;
    fn restart(&self, unit: &str) -> io::Result<CommandOutput>;
    fn daemon_reload(&self) -> io::Result<CommandOutput>;
    fn status_snapshot(&self, unit: &str) -> io::Result<String>;
    fn recent_logs(&self, unit: &str, lines: usize) -> io::Result<String>;
}

/// Process inspection, termination and launch by exact name.
pub trait ProcessControl {
    fn is_running(&self, process_name: &str) -> io::Result<bool>;
    fn terminate(&self, process_name: &str) -> io::Result<Termination>;
    /// Start `program` detached from this process.
    fn launch(&self, program: &str) -> io::Result<()>;
}

/// Locates executables on `PATH`.
pub trait ToolLocator {
    fn find(&self, program: &str) -> Option<PathBuf>;
}

/// Interactive questions.
pub trait Prompter {
    fn ask_line(&self, prompt: &str) -> io::Result<String>;
    fn confirm(&self, prompt: &str, default: bool) -> io::Result<bool>;
}
