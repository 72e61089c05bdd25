//! Uninstallation and cleanup
//!
//! Every step is best-effort: a failure is logged and recorded, and the next
//! step still runs, so a partially installed host is cleaned as far as
//! possible. Credentials under the certificate directory are left in place.

use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};

use super::port_hop::NetworkRemapper;
use crate::config::HostLayout;
use crate::control::ServiceController;
use crate::error::Result;
use crate::process::{CommandRunner, CommandSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// Nothing to remove or stop
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallStep {
    pub name: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    pub steps: Vec<UninstallStep>,
}

impl UninstallReport {
    fn record(&mut self, name: &str, result: Result<bool>) {
        let outcome = match result {
            Ok(true) => StepOutcome::Done,
            Ok(false) => StepOutcome::Skipped,
            Err(e) => {
                warn!("Uninstall step '{name}' failed: {e}");
                StepOutcome::Failed(e.to_string())
            }
        };
        self.steps.push(UninstallStep {
            name: name.to_string(),
            outcome,
        });
    }

    #[cfg(test)]
    pub fn outcome(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.name == name).map(|s| &s.outcome)
    }

    /// `true` when at least one step changed the host
    pub fn changed_anything(&self) -> bool {
        self.steps.iter().any(|s| s.outcome == StepOutcome::Done)
    }
}

/// Remove the proxy installation from the host.
pub fn uninstall(
    layout: &HostLayout,
    controller: &dyn ServiceController,
    runner: &dyn CommandRunner,
    remapper: &NetworkRemapper<'_>,
    shortcut_name: &str,
) -> UninstallReport {
    info!("Removing the {} installation", layout.service_name());
    let mut report = UninstallReport::default();
    let unit_path = controller.unit_path();
    let has_unit = unit_path.exists();

    report.record(
        "stop service",
        if has_unit { controller.stop().map(|()| true) } else { Ok(false) },
    );
    report.record(
        "disable service",
        if has_unit { controller.disable().map(|()| true) } else { Ok(false) },
    );
    report.record(
        "remove legacy port-hop unit",
        remove_legacy_port_hop(layout, runner),
    );
    report.record("remove config directory", remove_path(&layout.config_dir()));
    report.record("remove shortcut", remove_path(&layout.shortcut_path(shortcut_name)));
    report.record("remove binary", remove_path(&layout.binary_path()));
    report.record("remove service unit", remove_path(&unit_path));

    // Nothing was installed: leave the init system and NAT table alone
    let installed = report.changed_anything()
        || report
            .steps
            .iter()
            .any(|s| matches!(s.outcome, StepOutcome::Failed(_)));
    report.record(
        "reload init system",
        if installed { controller.reload().map(|()| true) } else { Ok(false) },
    );
    report.record(
        "flush NAT table",
        if installed { remapper.flush().map(|()| true) } else { Ok(false) },
    );

    info!("Uninstall finished");
    report
}

fn remove_legacy_port_hop(layout: &HostLayout, runner: &dyn CommandRunner) -> Result<bool> {
    let unit = layout.legacy_port_hop_unit();
    if !unit.exists() {
        return Ok(false);
    }
    for verb in ["stop", "disable"] {
        let output = runner.run(&CommandSpec::new("systemctl").args([verb, "port-hop"]))?;
        if !output.success() {
            warn!("systemctl {verb} port-hop: {}", output.diagnostic());
        }
    }
    remove_path(&unit)
}

/// Remove a file or directory tree; `Ok(false)` when it did not exist.
fn remove_path(path: &Path) -> Result<bool> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
