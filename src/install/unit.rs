//! Service unit registration and activation.
//!
//! Writes the init-system definition for the proxy, registers it for boot,
//! starts it and reports whether it came up. Activation problems are
//! reported with remediation commands; nothing is rolled back.

use std::path::PathBuf;

use log::{info, warn};

use super::file_ops::write_file_atomic;
use crate::config::HostLayout;
use crate::control::{ServiceController, ServiceUnit};
use crate::error::{InstallerError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceActivation {
    Active,
    /// Not running after start; carries commands for the operator to inspect
    Inactive { remediation: Vec<String> },
}

impl ServiceActivation {
    pub fn is_active(&self) -> bool {
        matches!(self, ServiceActivation::Active)
    }
}

/// Write the unit file for the proxy server.
pub fn write_unit(controller: &dyn ServiceController, layout: &HostLayout) -> Result<PathBuf> {
    let unit = ServiceUnit::for_layout(layout);
    let path = controller.unit_path();
    write_file_atomic(&path, controller.render_unit(&unit).as_bytes(), controller.unit_mode())
        .map_err(|e| InstallerError::Service(format!("cannot write {}: {e}", path.display())))?;
    info!("Wrote {} unit {}", controller.init_system(), path.display());
    Ok(path)
}

/// Write, reload, enable and start the unit, then verify it is active.
///
/// Only the unit write is fatal.
pub fn register_service(
    controller: &dyn ServiceController,
    layout: &HostLayout,
) -> Result<ServiceActivation> {
    write_unit(controller, layout)?;

    // Evaluated in order; each failure is only logged
    let steps = [
        ("reload", controller.reload()),
        ("enable", controller.enable()),
        ("start", controller.start()),
    ];
    for (name, result) in steps {
        if let Err(e) = result {
            warn!("{} {name} of {} failed: {e}", controller.init_system(), layout.service_name());
        }
    }

    Ok(verify_activation(controller))
}

pub fn verify_activation(controller: &dyn ServiceController) -> ServiceActivation {
    match controller.is_active() {
        Ok(true) => ServiceActivation::Active,
        Ok(false) => ServiceActivation::Inactive {
            remediation: controller.diagnostics(),
        },
        Err(e) => {
            warn!("Could not query service state: {e}");
            ServiceActivation::Inactive {
                remediation: controller.diagnostics(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{OpenRc, Systemd};
    use crate::install::file_ops::mode_of;
    use crate::testing::FakeRunner;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_systemd_registration_sequence() {
        let dir = tempdir().unwrap();
        let layout = HostLayout::new(dir.path(), "hysteria-server");
        let runner = FakeRunner::new();
        let systemd = Systemd::new(&layout, &runner);

        let activation = register_service(&systemd, &layout).unwrap();

        assert!(activation.is_active());
        assert_eq!(
            runner.commands(),
            vec![
                "systemctl daemon-reload",
                "systemctl enable hysteria-server",
                "systemctl start hysteria-server",
                "systemctl is-active hysteria-server",
            ]
        );
        let unit_path = layout.systemd_unit_dir().join("hysteria-server.service");
        let unit = fs::read_to_string(&unit_path).unwrap();
        assert!(unit.contains("Restart=on-failure\n"));
        assert_eq!(mode_of(&unit_path).unwrap(), 0o644);
    }

    #[test]
    fn test_failed_start_is_reported_not_fatal() {
        let dir = tempdir().unwrap();
        let layout = HostLayout::new(dir.path(), "hysteria-server");
        let runner = FakeRunner::new()
            .fail_on("systemctl start")
            .exit_with("systemctl is-active", 3);
        let systemd = Systemd::new(&layout, &runner);

        match register_service(&systemd, &layout).unwrap() {
            ServiceActivation::Inactive { remediation } => {
                assert!(remediation.iter().any(|c| c.contains("journalctl")));
            }
            ServiceActivation::Active => panic!("service should not be active"),
        }
    }

    #[test]
    fn test_openrc_script_is_executable() {
        let dir = tempdir().unwrap();
        let layout = HostLayout::new(dir.path(), "hysteria-server");
        let runner = FakeRunner::new();
        let openrc = OpenRc::new(&layout, &runner);

        let path = write_unit(&openrc, &layout).unwrap();
        assert_eq!(path, layout.openrc_init_dir().join("hysteria-server"));
        assert_eq!(mode_of(&path).unwrap(), 0o755);
    }
}
