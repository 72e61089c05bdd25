//! UDP port hopping via NAT redirection

use std::fmt;

use log::{debug, info};

use super::detection::OsFamily;
use crate::error::{InstallerError, Result};
use crate::process::{CommandRunner, CommandSpec};

const FALLBACK_INTERFACE: &str = "eth0";

/// Redirects an external UDP range onto the proxy's listen port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortHopRule {
    external_start: u16,
    external_end: u16,
    internal_port: u16,
    interface: String,
}

impl PortHopRule {
    pub fn new(
        external_start: u16,
        external_end: u16,
        internal_port: u16,
        interface: impl Into<String>,
    ) -> Result<Self> {
        if external_start == 0 || external_start >= external_end {
            return Err(InstallerError::PortHop(format!(
                "invalid range {external_start}-{external_end}: start must be lower than end"
            )));
        }
        if internal_port == 0 {
            return Err(InstallerError::PortHop("listen port must not be 0".to_string()));
        }
        let interface = interface.into();
        if interface.is_empty() || interface.contains(char::is_whitespace) {
            return Err(InstallerError::PortHop(format!("invalid interface name '{interface}'")));
        }

        Ok(Self {
            external_start,
            external_end,
            internal_port,
            interface,
        })
    }

    /// PREROUTING rule body shared by the check and append commands
    fn rule_args(&self) -> Vec<String> {
        vec![
            "PREROUTING".to_string(),
            "-i".to_string(),
            self.interface.clone(),
            "-p".to_string(),
            "udp".to_string(),
            "--dport".to_string(),
            format!("{}:{}", self.external_start, self.external_end),
            "-j".to_string(),
            "REDIRECT".to_string(),
            "--to-ports".to_string(),
            self.internal_port.to_string(),
        ]
    }
}

impl fmt::Display for PortHopRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "udp {}-{} on {} -> {}",
            self.external_start, self.external_end, self.interface, self.internal_port
        )
    }
}

pub struct NetworkRemapper<'a> {
    runner: &'a dyn CommandRunner,
    family: OsFamily,
}

impl<'a> NetworkRemapper<'a> {
    pub fn new(runner: &'a dyn CommandRunner, family: OsFamily) -> Self {
        Self { runner, family }
    }

    /// Device of the default route, or `eth0` when it cannot be determined
    pub fn default_interface(&self) -> String {
        let spec = CommandSpec::new("ip").args(["route", "show", "default"]);
        let device = match self.runner.run(&spec) {
            Ok(output) if output.success() => parse_route_device(&output.stdout),
            Ok(_) | Err(_) => None,
        };
        device.unwrap_or_else(|| {
            debug!("no default route device found, using {FALLBACK_INTERFACE}");
            FALLBACK_INTERFACE.to_string()
        })
    }

    /// Install `rule` unless an identical rule is already present.
    pub fn apply(&self, rule: &PortHopRule) -> Result<()> {
        let check = CommandSpec::new("iptables")
            .args(["-t", "nat", "-C"])
            .args(rule.rule_args());
        let present = self.runner.run(&check).map(|o| o.success()).unwrap_or(false);

        if present {
            info!("Port hopping rule already present ({rule})");
        } else {
            let append = CommandSpec::new("iptables")
                .args(["-t", "nat", "-A"])
                .args(rule.rule_args());
            self.runner.run_checked(&append).map_err(port_hop_error)?;
            info!("Port hopping enabled: {rule}");
        }

        if self.family == OsFamily::Alpine {
            self.persist()?;
        }
        Ok(())
    }

    /// Save NAT rules across reboots where the firewall service needs it
    fn persist(&self) -> Result<()> {
        self.runner
            .run_checked(&CommandSpec::new("rc-update").args(["add", "iptables", "default"]))
            .map_err(port_hop_error)?;
        self.runner
            .run_checked(&CommandSpec::new("/etc/init.d/iptables").arg("save"))
            .map_err(port_hop_error)?;
        Ok(())
    }

    /// Flush the whole NAT table
    pub fn flush(&self) -> Result<()> {
        self.runner
            .run_checked(&CommandSpec::new("iptables").args(["-t", "nat", "-F"]))
            .map_err(port_hop_error)?;
        Ok(())
    }
}

fn parse_route_device(routes: &str) -> Option<String> {
    routes.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        words.find(|w| *w == "dev")?;
        words.next().map(str::to_string)
    })
}

fn port_hop_error(e: InstallerError) -> InstallerError {
    InstallerError::PortHop(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;

    #[test]
    fn test_rule_invariants() {
        let rule = PortHopRule::new(20000, 50000, 443, "eth0").unwrap();
        assert_eq!((rule.external_start, rule.external_end), (20000, 50000));
        assert_eq!(rule.internal_port, 443);

        assert!(PortHopRule::new(50000, 20000, 443, "eth0").is_err());
        assert!(PortHopRule::new(20000, 20000, 443, "eth0").is_err());
        assert!(PortHopRule::new(0, 100, 443, "eth0").is_err());
        assert!(PortHopRule::new(1, 65535, 0, "eth0").is_err());
        assert!(PortHopRule::new(1, 65535, 443, "").is_err());
    }

    #[test]
    fn test_interface_from_default_route() {
        let runner = FakeRunner::new().respond(
            "ip route show default",
            "default via 10.0.0.1 dev ens3 proto dhcp src 10.0.0.5 metric 100\n",
        );
        assert_eq!(NetworkRemapper::new(&runner, OsFamily::Debian).default_interface(), "ens3");

        let runner = FakeRunner::new().respond("ip route show default", "");
        assert_eq!(NetworkRemapper::new(&runner, OsFamily::Debian).default_interface(), "eth0");
    }

    #[test]
    fn test_apply_appends_redirect() {
        let runner = FakeRunner::new().exit_with("iptables -t nat -C", 1);
        let rule = PortHopRule::new(20000, 50000, 8443, "ens3").unwrap();
        NetworkRemapper::new(&runner, OsFamily::Debian).apply(&rule).unwrap();

        assert!(runner.ran(
            "iptables -t nat -A PREROUTING -i ens3 -p udp --dport 20000:50000 -j REDIRECT --to-ports 8443"
        ));
        assert!(!runner.ran("rc-update"));
    }

    #[test]
    fn test_existing_rule_is_not_duplicated() {
        let runner = FakeRunner::new();
        let rule = PortHopRule::new(20000, 50000, 443, "eth0").unwrap();
        NetworkRemapper::new(&runner, OsFamily::Debian).apply(&rule).unwrap();
        assert!(!runner.ran("iptables -t nat -A"));
    }

    #[test]
    fn test_alpine_persists_rules() {
        let runner = FakeRunner::new().exit_with("iptables -t nat -C", 1);
        let rule = PortHopRule::new(20000, 50000, 443, "eth0").unwrap();
        NetworkRemapper::new(&runner, OsFamily::Alpine).apply(&rule).unwrap();

        let commands = runner.commands();
        assert_eq!(commands[commands.len() - 2], "rc-update add iptables default");
        assert_eq!(commands[commands.len() - 1], "/etc/init.d/iptables save");
    }

    #[test]
    fn test_failures_are_port_hop_errors() {
        let runner = FakeRunner::new().fail_on("iptables");
        let rule = PortHopRule::new(20000, 50000, 443, "eth0").unwrap();
        let remapper = NetworkRemapper::new(&runner, OsFamily::Debian);
        assert!(matches!(remapper.apply(&rule), Err(InstallerError::PortHop(_))));
        assert!(matches!(remapper.flush(), Err(InstallerError::PortHop(_))));
    }
}
