//! psd user service lifecycle: restart if active, enable + start otherwise,
//! then verify.
//!
//! There is no retry. When the service does not come up the usual causes (a
//! browser still holding its lock, a missing profile directory) need the
//! operator, so the status snapshot and recent journal lines are returned in
//! [`HostError::ServiceFailed`] instead.

use ramprofile_core::host::{CommandOutput, ServiceControl};
use ramprofile_core::paths::{LOG_EXCERPT_LINES, SERVICE_UNIT};
use ramprofile_core::ServiceState;
use serde::Serialize;

use crate::error::{command_err, Diagnostics, HostError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Started,
    Restarted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub before: ServiceState,
    pub transition: Transition,
}

/// Bring [`SERVICE_UNIT`] to `Active`.
pub fn ensure_active(services: &dyn ServiceControl) -> Result<Activation, HostError> {
    let before = query(services)?;

    let transition = if before == ServiceState::Active {
        tracing::info!(unit = SERVICE_UNIT, "service active; restarting to pick up configuration");
        let out = services
            .restart(SERVICE_UNIT)
            .map_err(|e| command_err("systemctl", e))?;
        log_failure("restart", &out);
        Transition::Restarted
    } else {
        tracing::info!(unit = SERVICE_UNIT, state = %before, "service not active; enabling and starting");
        let out = services
            .enable(SERVICE_UNIT)
            .map_err(|e| command_err("systemctl", e))?;
        log_failure("enable", &out);
        let out = services
            .start(SERVICE_UNIT)
            .map_err(|e| command_err("systemctl", e))?;
        log_failure("start", &out);
        Transition::Started
    };

    let after = query(services)?;
    if after != ServiceState::Active {
        return Err(HostError::ServiceFailed {
            unit: SERVICE_UNIT.to_string(),
            state: after,
            diagnostics: collect_diagnostics(services),
        });
    }

    tracing::info!(unit = SERVICE_UNIT, "service active");
    Ok(Activation { before, transition })
}

fn query(services: &dyn ServiceControl) -> Result<ServiceState, HostError> {
    services
        .state(SERVICE_UNIT)
        .map_err(|e| command_err("systemctl", e))
}

// The post-transition state check decides success; this only keeps the detail.
fn log_failure(action: &str, out: &CommandOutput) {
    if !out.success() {
        tracing::warn!(unit = SERVICE_UNIT, action, detail = %out.detail(), "systemctl reported an error");
    }
}

/// Status snapshot and journal excerpt, verbatim. Collection errors are
/// reported inline rather than hiding the other half.
pub fn collect_diagnostics(services: &dyn ServiceControl) -> Diagnostics {
    let status = services
        .status_snapshot(SERVICE_UNIT)
        .unwrap_or_else(|e| format!("(status unavailable: {e})"));
    let logs = services
        .recent_logs(SERVICE_UNIT, LOG_EXCERPT_LINES)
        .unwrap_or_else(|e| format!("(journal unavailable: {e})"));
    Diagnostics { status, logs }
}
