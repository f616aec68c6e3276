//! `Command`-backed implementations of the capability traits.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use ramprofile_core::host::{
    CommandOutput, Elevator, PrivilegeTool, ProcessControl, ServiceControl, Termination,
    ToolLocator,
};
use ramprofile_core::ServiceState;

/// The real machine: privilege tool, `systemctl --user`, `pgrep`/`pkill`, `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost {
    tool: PrivilegeTool,
}

impl SystemHost {
    pub fn new(tool: PrivilegeTool) -> Self {
        Self { tool }
    }

    fn elevated(&self, program: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(self.tool.program());
        cmd.arg(program).args(args);
        cmd
    }
}

fn to_output(output: Output) -> CommandOutput {
    let status_code = output
        .status
        .code()
        .unwrap_or(if output.status.success() { 0 } else { 1 });
    CommandOutput {
        status_code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

fn capture(mut cmd: Command) -> io::Result<CommandOutput> {
    cmd.output().map(to_output)
}

/// Spawn `cmd` with `contents` on stdin. The child is always reaped, also
/// when writing to it fails.
fn feed_stdin(mut cmd: Command, contents: &str) -> io::Result<CommandOutput> {
    let mut child = cmd.stdin(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(err) = stdin.write_all(contents.as_bytes()) {
            drop(stdin);
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }
    }
    child.wait_with_output().map(to_output)
}

fn systemctl_user(args: &[&str]) -> io::Result<CommandOutput> {
    let mut cmd = Command::new("systemctl");
    cmd.arg("--user").args(args);
    capture(cmd)
}

// ---------------------------------------------------------------------------
// Elevator
// ---------------------------------------------------------------------------

impl Elevator for SystemHost {
    fn tool(&self) -> PrivilegeTool {
        self.tool
    }

    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        tracing::debug!(tool = %self.tool, program, ?args, "running privileged command");
        capture(self.elevated(program, args))
    }

    fn write_file(&self, path: &Path, contents: &str, mode: u32) -> io::Result<CommandOutput> {
        if let Some(parent) = path.parent() {
            let parent = parent.display().to_string();
            let mkdir = self.run("mkdir", &["-p", &parent])?;
            if !mkdir.success() {
                return Ok(mkdir);
            }
        }

        let target = path.display().to_string();
        let mut tee = self.elevated("tee", &[&target]);
        tee.stdout(Stdio::null());
        let tee = feed_stdin(tee, contents)?;
        if !tee.success() {
            return Ok(tee);
        }

        self.run("chmod", &[&format!("{mode:o}"), &target])
    }

    fn path_exists(&self, path: &Path) -> io::Result<bool> {
        let target = path.display().to_string();
        let out = self.run("test", &["-e", &target])?;
        match out.status_code {
            0 => Ok(true),
            1 => Ok(false),
            _ => Err(io::Error::other(format!(
                "{} could not test {target}: {}",
                self.tool,
                out.detail()
            ))),
        }
    }

    fn read_file(&self, path: &Path) -> io::Result<Option<String>> {
        if !self.path_exists(path)? {
            return Ok(None);
        }
        let target = path.display().to_string();
        let out = self.run("cat", &[&target])?;
        if !out.success() {
            return Err(io::Error::other(format!("cannot read {target}: {}", out.detail())));
        }
        Ok(Some(out.stdout))
    }

    fn check_no_prompt(&self, program: &str) -> io::Result<CommandOutput> {
        match self.tool {
            PrivilegeTool::Sudo => {
                let mut cmd = Command::new("sudo");
                cmd.args(["-n", "-l", program]);
                capture(cmd)
            }
            PrivilegeTool::Doas => {
                let mut cmd = Command::new("doas");
                cmd.args(["-C", "/etc/doas.conf", program]);
                let mut out = capture(cmd)?;
                // doas prints the matching action instead of signalling it in the status.
                if out.success() && out.stdout.trim() != "permit nopass" {
                    out.status_code = 1;
                }
                Ok(out)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceControl
// ---------------------------------------------------------------------------

impl ServiceControl for SystemHost {
    fn state(&self, unit: &str) -> io::Result<ServiceState> {
        let out = systemctl_user(&["is-active", unit])?;
        Ok(ServiceState::from_is_active(&out.stdout))
    }

    fn enable(&self, unit: &str) -> io::Result<CommandOutput> {
        systemctl_user(&["enable", unit])
    }

    fn start(&self, unit: &str) -> io::Result<CommandOutput> {
        systemctl_user(&["start", unit])
    }

    fn restart(&self, unit: &str) -> io::Result<CommandOutput> {
        systemctl_user(&["restart", unit])
    }

    fn daemon_reload(&self) -> io::Result<CommandOutput> {
        systemctl_user(&["daemon-reload"])
    }

    fn status_snapshot(&self, unit: &str) -> io::Result<String> {
        // `status` exits non-zero for inactive units; the text is still wanted.
        let out = systemctl_user(&["status", unit, "--no-pager"])?;
        Ok(format!("{}{}", out.stdout, out.stderr))
    }

    fn recent_logs(&self, unit: &str, lines: usize) -> io::Result<String> {
        let mut cmd = Command::new("journalctl");
        cmd.args(["--user", "-u", unit, "-n", &lines.to_string(), "--no-pager"]);
        let out = capture(cmd)?;
        Ok(format!("{}{}", out.stdout, out.stderr))
    }
}

// ---------------------------------------------------------------------------
// ProcessControl
// ---------------------------------------------------------------------------

impl ProcessControl for SystemHost {
    fn is_running(&self, process_name: &str) -> io::Result<bool> {
        let mut cmd = Command::new("pgrep");
        cmd.args(["-x", process_name]);
        let out = capture(cmd)?;
        match out.status_code {
            0 => Ok(true),
            1 => Ok(false),
            _ => Err(io::Error::other(format!("pgrep failed: {}", out.detail()))),
        }
    }

    fn terminate(&self, process_name: &str) -> io::Result<Termination> {
        let mut cmd = Command::new("pkill");
        cmd.args(["-x", process_name]);
        let out = capture(cmd)?;
        match out.status_code {
            0 => Ok(Termination::Signalled),
            1 => Ok(Termination::NotRunning),
            _ => Err(io::Error::other(format!("pkill failed: {}", out.detail()))),
        }
    }

    fn launch(&self, program: &str) -> io::Result<()> {
        let mut cmd = Command::new(program);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd.spawn().map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// ToolLocator
// ---------------------------------------------------------------------------

impl ToolLocator for SystemHost {
    fn find(&self, program: &str) -> Option<PathBuf> {
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
