//! Required host tooling, installed through the family's package manager

use log::{info, warn};

use super::detection::OsFamily;
use crate::error::{InstallerError, Result};
use crate::process::{CommandRunner, CommandSpec};

/// Tools the rest of the workflow shells out to
const REQUIRED_TOOLS: &[&str] = &["curl", "openssl", "iptables"];

const BASE_PACKAGES: &[&str] = &["wget", "curl", "openssl", "iptables"];

/// Minimal images ship busybox only
const ALPINE_PACKAGES: &[&str] = &["wget", "curl", "openssl", "iptables", "bash", "coreutils"];

pub trait PackageInstaller {
    fn manager(&self) -> &'static str;

    /// Install `packages`; already-present packages are not an error.
    fn install(&self, packages: &[&str]) -> Result<()>;
}

pub struct Apt<'a> {
    runner: &'a dyn CommandRunner,
}

impl PackageInstaller for Apt<'_> {
    fn manager(&self) -> &'static str {
        "apt-get"
    }

    fn install(&self, packages: &[&str]) -> Result<()> {
        let update = CommandSpec::new("apt-get")
            .arg("update")
            .env("DEBIAN_FRONTEND", "noninteractive");
        let install = CommandSpec::new("apt-get")
            .args(["install", "-y"])
            .args(packages.iter().copied())
            .env("DEBIAN_FRONTEND", "noninteractive");

        run_package_step(self.runner, self.manager(), &update)?;
        run_package_step(self.runner, self.manager(), &install)
    }
}

/// dnf on current Red Hat releases, yum on older ones
pub struct Yum<'a> {
    runner: &'a dyn CommandRunner,
    program: &'static str,
}

impl<'a> Yum<'a> {
    pub fn detect(runner: &'a dyn CommandRunner) -> Self {
        let program = if runner.locate("dnf").is_some() { "dnf" } else { "yum" };
        Self { runner, program }
    }
}

impl PackageInstaller for Yum<'_> {
    fn manager(&self) -> &'static str {
        self.program
    }

    fn install(&self, packages: &[&str]) -> Result<()> {
        let install = CommandSpec::new(self.program)
            .args(["install", "-y"])
            .args(packages.iter().copied());
        run_package_step(self.runner, self.manager(), &install)
    }
}

pub struct Apk<'a> {
    runner: &'a dyn CommandRunner,
}

impl PackageInstaller for Apk<'_> {
    fn manager(&self) -> &'static str {
        "apk"
    }

    fn install(&self, packages: &[&str]) -> Result<()> {
        let update = CommandSpec::new("apk").arg("update");
        let add = CommandSpec::new("apk").arg("add").args(packages.iter().copied());

        run_package_step(self.runner, self.manager(), &update)?;
        run_package_step(self.runner, self.manager(), &add)
    }
}

fn run_package_step(runner: &dyn CommandRunner, manager: &str, spec: &CommandSpec) -> Result<()> {
    let output = runner.run(spec).map_err(|e| InstallerError::DependencyInstall {
        manager: manager.to_string(),
        message: e.to_string(),
    })?;

    if !output.success() {
        return Err(InstallerError::DependencyInstall {
            manager: manager.to_string(),
            message: format!("`{spec}` exited with {}: {}", output.exit_code, output.diagnostic()),
        });
    }
    Ok(())
}

pub fn installer_for<'a>(
    family: OsFamily,
    runner: &'a dyn CommandRunner,
) -> Result<Box<dyn PackageInstaller + 'a>> {
    match family {
        OsFamily::Debian => Ok(Box::new(Apt { runner })),
        OsFamily::RedHat => Ok(Box::new(Yum::detect(runner))),
        OsFamily::Alpine => Ok(Box::new(Apk { runner })),
        OsFamily::Unknown => Err(InstallerError::UnsupportedPlatform(
            "no package manager for unknown distribution".to_string(),
        )),
    }
}

pub fn required_packages(family: OsFamily) -> &'static [&'static str] {
    match family {
        OsFamily::Alpine => ALPINE_PACKAGES,
        _ => BASE_PACKAGES,
    }
}

/// Install every required package. Any package-manager failure is fatal.
pub fn ensure_dependencies(family: OsFamily, runner: &dyn CommandRunner) -> Result<()> {
    let installer = installer_for(family, runner)?;
    let packages = required_packages(family);

    info!("Installing dependencies with {}: {}", installer.manager(), packages.join(" "));
    installer.install(packages)?;

    let missing = missing_tools(runner);
    if !missing.is_empty() {
        warn!(
            "{} reported success but these tools are still not on PATH: {}",
            installer.manager(),
            missing.join(", ")
        );
    }
    Ok(())
}

/// Required tools not found on PATH
pub fn missing_tools(runner: &dyn CommandRunner) -> Vec<&'static str> {
    REQUIRED_TOOLS
        .iter()
        .copied()
        .filter(|tool| runner.locate(tool).is_none())
        .collect()
}
