use std::path::PathBuf;

use thiserror::Error;

use ramprofile_core::ServiceState;

/// Status snapshot and log excerpt captured when the service fails to start.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostics {
    pub status: String,
    pub logs: String,
}

/// Error surface for preconditions, host commands and the setup pipeline.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run {program}: {source}")]
    Command {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("required tool '{tool}' not found on PATH; {hint}")]
    MissingTool { tool: String, hint: String },

    #[error("installing {package} failed: {detail}")]
    InstallFailed { package: String, detail: String },

    #[error("`systemctl --user {action} {unit}` failed: {detail}")]
    ServiceCommand {
        action: &'static str,
        unit: String,
        detail: String,
    },

    #[error("{unit} did not become active (state: {state})")]
    ServiceFailed {
        unit: String,
        state: ServiceState,
        diagnostics: Diagnostics,
    },

    #[error("prompt failed: {0}")]
    Prompt(#[source] std::io::Error),

    #[error(transparent)]
    Core(#[from] ramprofile_core::CoreError),

    #[error(transparent)]
    Detect(#[from] ramprofile_detector::DetectError),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> HostError {
    HostError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn command_err(program: impl Into<String>, source: std::io::Error) -> HostError {
    HostError::Command {
        program: program.into(),
        source,
    }
}
