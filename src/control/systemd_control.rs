//! Service control using systemd (systemctl)

use std::path::PathBuf;

use super::{RESTART_DELAY_SECS, ServiceController, ServiceUnit};
use crate::config::HostLayout;
use crate::error::Result;
use crate::process::{CommandRunner, CommandSpec};

pub struct Systemd<'a> {
    runner: &'a dyn CommandRunner,
    service_name: String,
    unit_dir: PathBuf,
}

impl<'a> Systemd<'a> {
    pub fn new(layout: &HostLayout, runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            service_name: layout.service_name().to_string(),
            unit_dir: layout.systemd_unit_dir(),
        }
    }

    fn systemctl(&self, verb: &str) -> Result<()> {
        let spec = CommandSpec::new("systemctl").args([verb, self.service_name.as_str()]);
        self.runner.run_checked(&spec)?;
        Ok(())
    }
}

impl ServiceController for Systemd<'_> {
    fn init_system(&self) -> &'static str {
        "systemd"
    }

    fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(format!("{}.service", self.service_name))
    }

    fn unit_mode(&self) -> u32 {
        0o644
    }

    fn render_unit(&self, unit: &ServiceUnit) -> String {
        let mut content = String::with_capacity(512);

        content.push_str("[Unit]\n");
        content.push_str(&format!("Description={}\n", unit.description));
        content.push_str("Documentation=https://hysteria.network/\n");
        content.push_str("After=network.target nss-lookup.target\n");
        content.push('\n');

        content.push_str("[Service]\n");
        content.push_str("Type=simple\n");
        content.push_str("User=root\n");
        content.push_str(&format!(
            "ExecStart={} {}\n",
            unit.executable_path.display(),
            unit.server_args()
        ));
        content.push_str("Restart=on-failure\n");
        content.push_str(&format!("RestartSec={RESTART_DELAY_SECS}\n"));
        content.push_str("LimitNOFILE=infinity\n");
        content.push('\n');

        content.push_str("[Install]\n");
        content.push_str("WantedBy=multi-user.target\n");

        content
    }

    fn reload(&self) -> Result<()> {
        self.runner
            .run_checked(&CommandSpec::new("systemctl").arg("daemon-reload"))?;
        Ok(())
    }

    fn enable(&self) -> Result<()> {
        self.systemctl("enable")
    }

    fn disable(&self) -> Result<()> {
        self.systemctl("disable")
    }

    fn start(&self) -> Result<()> {
        self.systemctl("start")
    }

    fn stop(&self) -> Result<()> {
        self.systemctl("stop")
    }

    fn is_active(&self) -> Result<bool> {
        let spec = CommandSpec::new("systemctl").args(["is-active", self.service_name.as_str()]);
        // systemctl is-active exits 0 only when active
        Ok(self.runner.run(&spec)?.success())
    }

    fn diagnostics(&self) -> Vec<String> {
        vec![
            format!("systemctl status {}", self.service_name),
            format!("journalctl -u {}", self.service_name),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;

    #[test]
    fn test_unit_runs_server_with_config() {
        let runner = FakeRunner::new();
        let layout = HostLayout::new("/", "hysteria-server");
        let systemd = Systemd::new(&layout, &runner);

        let unit = systemd.render_unit(&ServiceUnit::for_layout(&layout));
        assert!(unit.contains(
            "ExecStart=/usr/local/bin/hysteria server -c /etc/hysteria/config.yaml\n"
        ));
        assert!(unit.contains("Restart=on-failure\nRestartSec=10\n"));
        assert!(unit.contains("LimitNOFILE=infinity\n"));
        assert!(unit.ends_with("WantedBy=multi-user.target\n"));
        assert_eq!(
            systemd.unit_path(),
            PathBuf::from("/etc/systemd/system/hysteria-server.service")
        );
    }

    #[test]
    fn test_is_active_follows_exit_code() {
        let runner = FakeRunner::new().fail_on("systemctl is-active");
        let layout = HostLayout::new("/", "hysteria-server");
        let systemd = Systemd::new(&layout, &runner);
        assert!(!systemd.is_active().unwrap());

        let runner = FakeRunner::new();
        let systemd = Systemd::new(&layout, &runner);
        assert!(systemd.is_active().unwrap());
    }

    #[test]
    fn test_control_verbs() {
        let runner = FakeRunner::new();
        let layout = HostLayout::new("/", "hysteria-server");
        let systemd = Systemd::new(&layout, &runner);

        systemd.reload().unwrap();
        systemd.enable().unwrap();
        systemd.start().unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "systemctl daemon-reload",
                "systemctl enable hysteria-server",
                "systemctl start hysteria-server",
            ]
        );
    }
}
