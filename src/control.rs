//! Service lifecycle control - delegates to the host's init system
//!
//! Provides a unified interface over the init systems the installer supports:
//! - systemd (systemctl) on Debian and Red Hat families
//! - OpenRC (rc-service / rc-update) on Alpine

use std::path::PathBuf;

use crate::config::HostLayout;
use crate::error::Result;
use crate::install::detection::OsFamily;
use crate::process::CommandRunner;

mod openrc_control;
mod systemd_control;

pub use openrc_control::OpenRc;
pub use systemd_control::Systemd;

/// Seconds the init system waits before restarting a failed proxy
pub const RESTART_DELAY_SECS: u32 = 10;

/// Supervised process definition for the proxy server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUnit {
    pub name: String,
    pub description: String,
    pub executable_path: PathBuf,
    pub config_path: PathBuf,
}

impl ServiceUnit {
    pub fn for_layout(layout: &HostLayout) -> Self {
        Self {
            name: layout.service_name().to_string(),
            description: "Hysteria Server Service".to_string(),
            executable_path: layout.host_path(&layout.binary_path()),
            config_path: layout.host_path(&layout.config_path()),
        }
    }

    /// Arguments passed to the proxy binary
    pub fn server_args(&self) -> String {
        format!("server -c {}", self.config_path.display())
    }
}

/// Init-system operations the registrar and uninstaller rely on
pub trait ServiceController {
    /// Human-readable init system name, for logs
    fn init_system(&self) -> &'static str;

    /// Where the unit definition lives
    fn unit_path(&self) -> PathBuf;

    /// Permission bits for the unit definition
    fn unit_mode(&self) -> u32;

    fn render_unit(&self, unit: &ServiceUnit) -> String;

    /// Make the init system pick up changed unit files
    fn reload(&self) -> Result<()>;

    /// Register for start at boot
    fn enable(&self) -> Result<()>;

    fn disable(&self) -> Result<()>;

    fn start(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    /// Returns: Ok(true) if the service is running
    fn is_active(&self) -> Result<bool>;

    /// Commands the operator can run to find out why the service is down
    fn diagnostics(&self) -> Vec<String>;
}

/// Pick the init system for a platform family
pub fn controller_for<'a>(
    family: OsFamily,
    layout: &HostLayout,
    runner: &'a dyn CommandRunner,
) -> Box<dyn ServiceController + 'a> {
    match family {
        OsFamily::Alpine => Box::new(OpenRc::new(layout, runner)),
        OsFamily::Debian | OsFamily::RedHat | OsFamily::Unknown => {
            Box::new(Systemd::new(layout, runner))
        }
    }
}
