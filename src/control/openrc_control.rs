//! Service control using OpenRC (rc-service, rc-update)

use std::path::PathBuf;

use super::{RESTART_DELAY_SECS, ServiceController, ServiceUnit};
use crate::config::HostLayout;
use crate::error::Result;
use crate::process::{CommandRunner, CommandSpec};

/// Kernel default for fs.nr_open, the highest nofile limit a process can get
const NOFILE_LIMIT: u32 = 1_048_576;

pub struct OpenRc<'a> {
    runner: &'a dyn CommandRunner,
    service_name: String,
    init_dir: PathBuf,
}

impl<'a> OpenRc<'a> {
    pub fn new(layout: &HostLayout, runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            service_name: layout.service_name().to_string(),
            init_dir: layout.openrc_init_dir(),
        }
    }

    fn rc_service(&self, verb: &str) -> Result<()> {
        let spec = CommandSpec::new("rc-service").args([self.service_name.as_str(), verb]);
        self.runner.run_checked(&spec)?;
        Ok(())
    }

    fn rc_update(&self, verb: &str) -> Result<()> {
        let spec =
            CommandSpec::new("rc-update").args([verb, self.service_name.as_str(), "default"]);
        self.runner.run_checked(&spec)?;
        Ok(())
    }
}

impl ServiceController for OpenRc<'_> {
    fn init_system(&self) -> &'static str {
        "openrc"
    }

    fn unit_path(&self) -> PathBuf {
        self.init_dir.join(&self.service_name)
    }

    fn unit_mode(&self) -> u32 {
        0o755
    }

    fn render_unit(&self, unit: &ServiceUnit) -> String {
        format!(
            r#"#!/sbin/openrc-run

name="{name}"
description="{description}"
supervisor=supervise-daemon
command="{binary}"
command_args="{args}"
respawn_delay={RESTART_DELAY_SECS}
respawn_max=0
rc_ulimit="-n {NOFILE_LIMIT}"
output_log="/var/log/{name}.log"
error_log="/var/log/{name}.log"

depend() {{
    need net
    after firewall
}}
"#,
            name = unit.name,
            description = unit.description,
            binary = unit.executable_path.display(),
            args = unit.server_args(),
        )
    }

    fn reload(&self) -> Result<()> {
        // OpenRC reads init scripts on every invocation
        Ok(())
    }

    fn enable(&self) -> Result<()> {
        self.rc_update("add")
    }

    fn disable(&self) -> Result<()> {
        self.rc_update("del")
    }

    fn start(&self) -> Result<()> {
        self.rc_service("start")
    }

    fn stop(&self) -> Result<()> {
        self.rc_service("stop")
    }

    fn is_active(&self) -> Result<bool> {
        let spec = CommandSpec::new("rc-service").args([self.service_name.as_str(), "status"]);
        Ok(self.runner.run(&spec)?.success())
    }

    fn diagnostics(&self) -> Vec<String> {
        vec![
            format!("rc-service {} status", self.service_name),
            format!("tail -n 50 /var/log/{}.log", self.service_name),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;

    #[test]
    fn test_init_script_supervises_server() {
        let runner = FakeRunner::new();
        let layout = HostLayout::new("/", "hysteria-server");
        let openrc = OpenRc::new(&layout, &runner);

        let script = openrc.render_unit(&ServiceUnit::for_layout(&layout));
        assert!(script.starts_with("#!/sbin/openrc-run\n"));
        assert!(script.contains("command=\"/usr/local/bin/hysteria\"\n"));
        assert!(script.contains("command_args=\"server -c /etc/hysteria/config.yaml\"\n"));
        assert!(script.contains("respawn_delay=10\n"));
        assert!(script.contains("rc_ulimit=\"-n 1048576\"\n"));
        assert_eq!(openrc.unit_path(), PathBuf::from("/etc/init.d/hysteria-server"));
        assert_eq!(openrc.unit_mode(), 0o755);
    }

    #[test]
    fn test_enable_adds_to_default_runlevel() {
        let runner = FakeRunner::new();
        let layout = HostLayout::new("/", "hysteria-server");
        let openrc = OpenRc::new(&layout, &runner);

        openrc.reload().unwrap();
        openrc.enable().unwrap();
        openrc.start().unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "rc-update add hysteria-server default",
                "rc-service hysteria-server start",
            ]
        );
    }
}
