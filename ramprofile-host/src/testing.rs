//! Recording fakes for the capability traits, shared by unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};

use ramprofile_core::host::{
    CommandOutput, Elevator, PrivilegeTool, ProcessControl, Prompter, ServiceControl,
    Termination, ToolLocator,
};
use ramprofile_core::{Layout, ServiceState};
use tempfile::TempDir;

/// Temp home + system root.
pub(crate) struct TestDirs {
    dir: TempDir,
}

impl TestDirs {
    pub(crate) fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    pub(crate) fn layout(&self) -> Layout {
        let home = self.dir.path().join("home");
        Layout::at(&home, &home.join(".config"), &self.dir.path().join("root"))
    }

    pub(crate) fn write(&self, path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, contents).expect("write");
    }
}

fn ok() -> CommandOutput {
    CommandOutput::default()
}

fn failed(detail: &str) -> CommandOutput {
    CommandOutput {
        status_code: 1,
        stdout: String::new(),
        stderr: format!("{detail}\n"),
    }
}

/// One fake standing in for the whole machine.
///
/// Files are written for real under the test layout so existence checks see
/// them; every external effect is also recorded as a line in `calls`.
#[derive(Default)]
pub(crate) struct FakeHost {
    tool: PrivilegeTool,
    calls: RefCell<Vec<String>>,
    missing_tools: BTreeSet<String>,
    failing_programs: RefCell<BTreeSet<String>>,
    refuse_writes: bool,
    smoke_fails: bool,
    /// Successive answers of `state()`; `Inactive` once exhausted.
    states: RefCell<VecDeque<ServiceState>>,
    running: RefCell<BTreeSet<String>>,
    /// Directory created when a program is launched.
    launch_creates: BTreeMap<String, PathBuf>,
    confirms: RefCell<VecDeque<bool>>,
    lines: RefCell<VecDeque<String>>,
}

impl FakeHost {
    pub(crate) fn with_tool(mut self, tool: PrivilegeTool) -> Self {
        self.tool = tool;
        self
    }

    pub(crate) fn without_tool(mut self, tool: &str) -> Self {
        self.missing_tools.insert(tool.to_string());
        self
    }

    pub(crate) fn refusing_writes(mut self) -> Self {
        self.refuse_writes = true;
        self
    }

    pub(crate) fn failing_smoke(mut self) -> Self {
        self.smoke_fails = true;
        self
    }

    pub(crate) fn launching(mut self, program: &str, creates: PathBuf) -> Self {
        self.launch_creates.insert(program.to_string(), creates);
        self
    }

    pub(crate) fn fail_program(&self, program: &str) {
        self.failing_programs.borrow_mut().insert(program.to_string());
    }

    pub(crate) fn with_states(self, states: &[ServiceState]) -> Self {
        self.states.borrow_mut().extend(states.iter().copied());
        self
    }

    pub(crate) fn with_running(self, names: &[&str]) -> Self {
        self.running
            .borrow_mut()
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub(crate) fn answering(self, answers: &[bool]) -> Self {
        self.confirms.borrow_mut().extend(answers.iter().copied());
        self
    }

    pub(crate) fn typing(self, line: &str) -> Self {
        self.lines.borrow_mut().push_back(line.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn outcome(&self, program: &str) -> CommandOutput {
        if self.failing_programs.borrow().contains(program) {
            failed(&format!("{program}: failed"))
        } else {
            ok()
        }
    }
}

impl Elevator for FakeHost {
    fn tool(&self) -> PrivilegeTool {
        self.tool
    }

    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        let mut call = format!("elevate {program}");
        for arg in args {
            call.push(' ');
            call.push_str(arg);
        }
        self.record(call);
        let outcome = self.outcome(program);
        if !outcome.success() {
            return Ok(outcome);
        }
        let paths: Vec<&str> = args.iter().copied().filter(|a| !a.starts_with('-')).collect();
        match (program, paths.as_slice()) {
            ("rm", _) => {
                for path in &paths {
                    let _ = std::fs::remove_file(path);
                }
            }
            ("mv", [from, to]) => std::fs::rename(from, to)?,
            _ => {}
        }
        Ok(outcome)
    }

    fn write_file(&self, path: &Path, contents: &str, mode: u32) -> io::Result<CommandOutput> {
        self.record(format!("write {} {mode:o}", path.display()));
        if self.refuse_writes {
            return Ok(failed("sudo: a password is required"));
        }
        std::fs::create_dir_all(path.parent().expect("parent"))?;
        std::fs::write(path, contents)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
        }
        Ok(ok())
    }

    fn path_exists(&self, path: &Path) -> io::Result<bool> {
        Ok(path.exists())
    }

    fn read_file(&self, path: &Path) -> io::Result<Option<String>> {
        if path.exists() {
            std::fs::read_to_string(path).map(Some)
        } else {
            Ok(None)
        }
    }

    fn check_no_prompt(&self, program: &str) -> io::Result<CommandOutput> {
        self.record(format!("smoke {program}"));
        if self.smoke_fails {
            Ok(failed("a password is required"))
        } else {
            Ok(ok())
        }
    }
}

impl ServiceControl for FakeHost {
    fn state(&self, _unit: &str) -> io::Result<ServiceState> {
        Ok(self
            .states
            .borrow_mut()
            .pop_front()
            .unwrap_or(ServiceState::Inactive))
    }

    fn enable(&self, unit: &str) -> io::Result<CommandOutput> {
        self.record(format!("systemctl enable {unit}"));
        Ok(self.outcome("enable"))
    }

    fn start(&self, unit: &str) -> io::Result<CommandOutput> {
        self.record(format!("systemctl start {unit}"));
        Ok(self.outcome("start"))
    }

    fn restart(&self, unit: &str) -> io::Result<CommandOutput> {
        self.record(format!("systemctl restart {unit}"));
        Ok(self.outcome("restart"))
    }

    fn daemon_reload(&self) -> io::Result<CommandOutput> {
        self.record("systemctl daemon-reload".to_string());
        Ok(self.outcome("daemon-reload"))
    }

    fn status_snapshot(&self, unit: &str) -> io::Result<String> {
        Ok(format!("× {unit} - Profile-sync-daemon\n   Active: failed\n"))
    }

    fn recent_logs(&self, _unit: &str, lines: usize) -> io::Result<String> {
        Ok(format!("psd[42]: browser still running ({lines} lines)\n"))
    }
}

impl ProcessControl for FakeHost {
    fn is_running(&self, process_name: &str) -> io::Result<bool> {
        Ok(self.running.borrow().contains(process_name))
    }

    fn terminate(&self, process_name: &str) -> io::Result<Termination> {
        self.record(format!("pkill {process_name}"));
        if self.running.borrow_mut().remove(process_name) {
            Ok(Termination::Signalled)
        } else {
            Ok(Termination::NotRunning)
        }
    }

    fn launch(&self, program: &str) -> io::Result<()> {
        self.record(format!("launch {program}"));
        match self.launch_creates.get(program) {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                self.running.borrow_mut().insert(program.to_string());
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no such program")),
        }
    }
}

impl ToolLocator for FakeHost {
    fn find(&self, program: &str) -> Option<PathBuf> {
        if self.missing_tools.contains(program) {
            None
        } else {
            Some(PathBuf::from("/usr/bin").join(program))
        }
    }
}

impl Prompter for FakeHost {
    fn ask_line(&self, prompt: &str) -> io::Result<String> {
        self.record(format!("ask {prompt}"));
        Ok(self.lines.borrow_mut().pop_front().unwrap_or_default())
    }

    fn confirm(&self, prompt: &str, default: bool) -> io::Result<bool> {
        self.record(format!("confirm {prompt}"));
        Ok(self.confirms.borrow_mut().pop_front().unwrap_or(default))
    }
}
