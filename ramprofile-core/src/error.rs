//! Error types for ramprofile-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from registry, selection and config operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The browser selection contained no identifiers.
    #[error("no browsers selected")]
    EmptySelection,

    /// A selection token that cannot be used as a browser identifier.
    #[error("invalid browser identifier '{token}': use letters, digits, '.', '_', '+' or '-'")]
    InvalidIdentifier { token: String },
}

/// Convenience constructor for [`CoreError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
