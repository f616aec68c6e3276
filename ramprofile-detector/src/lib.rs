//! Detection record synthesis for `ramprofile-detector`.
//!
//! psd discovers browsers through one small file per browser under
//! `/usr/share/psd/browsers/`. `ensure_record(entry, ...)` writes that file for
//! browsers psd does not ship support for and leaves existing files alone, so
//! native records are never modified and repeated runs are no-ops.

use std::path::{Path, PathBuf};

use ramprofile_core::host::Elevator;
use ramprofile_core::{BrowserEntry, Layout};
use thiserror::Error;

/// Mode of a synthesized record: owner-writable, world-readable.
pub const RECORD_MODE: u32 = 0o644;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// What [`ensure_record`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// No record existed; one was written.
    Created { path: PathBuf },
    /// A record already existed (native support or an earlier run).
    AlreadyPresent { path: PathBuf },
}

impl RecordOutcome {
    pub fn path(&self) -> &Path {
        match self {
            RecordOutcome::Created { path } | RecordOutcome::AlreadyPresent { path } => path,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, RecordOutcome::Created { .. })
    }
}

/// Errors from record synthesis.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("could not run privileged write for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("privileged write to {path} failed: {detail}")]
    Elevation { path: PathBuf, detail: String },
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Record text for `entry`: the absolute profile directory and process name.
pub fn render_record(entry: &BrowserEntry, layout: &Layout) -> String {
    let profile = layout.profile_dir(entry);
    format!(
        "# Detection record for {id}, generated by ramprofile.\n\
         DIRArr[0]=\"{dir}\"\n\
         PSNAME=\"{process}\"\n",
        id = entry.identifier,
        dir = shell_quote_inner(&profile.display().to_string()),
        process = shell_quote_inner(&entry.process_name),
    )
}

/// Escape text for use inside a double-quoted shell string.
fn shell_quote_inner(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '"' | '$' | '`' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Make sure psd has a detection record for `entry`.
///
/// Returns [`RecordOutcome::AlreadyPresent`] without touching anything when a
/// record exists. Otherwise writes one through `elevator`; a failed elevation
/// is returned as [`DetectError::Elevation`].
pub fn ensure_record(
    entry: &BrowserEntry,
    layout: &Layout,
    elevator: &dyn Elevator,
) -> Result<RecordOutcome, DetectError> {
    let path = layout.detection_record_path(&entry.identifier);
    if path.exists() {
        tracing::info!(browser = %entry.identifier, path = %path.display(), "detection record present; leaving it untouched");
        return Ok(RecordOutcome::AlreadyPresent { path });
    }

    let contents = render_record(entry, layout);
    let output = elevator
        .write_file(&path, &contents, RECORD_MODE)
        .map_err(|e| DetectError::Io {
            path: path.clone(),
            source: e,
        })?;
    if !output.success() {
        return Err(DetectError::Elevation {
            path,
            detail: output.detail(),
        });
    }

    tracing::info!(browser = %entry.identifier, path = %path.display(), "created detection record");
    Ok(RecordOutcome::Created { path })
}
