//! Platform detection
//!
//! Classifies the host into an OS family (which decides the package manager,
//! init system and firewall persistence) and a CPU architecture (which decides
//! the release artifact). Both are derived once per run and never persisted.

use std::fmt;
use std::fs;

use log::{debug, info};

use crate::config::HostLayout;
use crate::error::{InstallerError, Result};
use crate::process::{CommandRunner, CommandSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Debian,
    RedHat,
    Alpine,
    Unknown,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OsFamily::Debian => "debian-like",
            OsFamily::RedHat => "redhat-like",
            OsFamily::Alpine => "alpine-like",
            OsFamily::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Amd64,
    Arm64,
    Arm,
}

impl Architecture {
    /// Suffix used by the proxy's release artifacts
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm64 => "arm64",
            Architecture::Arm => "arm",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    pub family: OsFamily,
    pub architecture: Architecture,
}

impl fmt::Display for PlatformProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.family, self.architecture)
    }
}

/// Detect the host platform. Unknown families and architectures are fatal.
pub fn detect_platform(layout: &HostLayout, runner: &dyn CommandRunner) -> Result<PlatformProfile> {
    let family = detect_family(layout);
    if family == OsFamily::Unknown {
        return Err(InstallerError::UnsupportedPlatform(
            "no supported distribution found in /etc/os-release or /etc/issue".to_string(),
        ));
    }

    let machine = runner
        .run_checked(&CommandSpec::new("uname").arg("-m"))?
        .stdout
        .trim()
        .to_string();
    let architecture = map_architecture(family, &machine)?;

    let profile = PlatformProfile {
        family,
        architecture,
    };
    info!("Detected platform {profile} (machine: {machine})");
    Ok(profile)
}

/// Classify the OS family from os-release, falling back to /etc/issue.
///
/// Never fails: unreadable files count as no match.
pub fn detect_family(layout: &HostLayout) -> OsFamily {
    if let Ok(content) = fs::read_to_string(layout.os_release()) {
        let family = family_from_os_release(&content);
        if family != OsFamily::Unknown {
            return family;
        }
    }

    if let Ok(content) = fs::read_to_string(layout.issue()) {
        let family = family_from_issue(&content);
        if family != OsFamily::Unknown {
            return family;
        }
    }

    debug!("no known distribution identifiers found");
    OsFamily::Unknown
}

fn family_from_os_release(content: &str) -> OsFamily {
    let mut ids = Vec::new();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() == "ID" || key.trim() == "ID_LIKE" {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            ids.extend(value.split_whitespace().map(str::to_ascii_lowercase));
        }
    }

    ids.iter()
        .map(|id| family_from_id(id))
        .find(|family| *family != OsFamily::Unknown)
        .unwrap_or(OsFamily::Unknown)
}

fn family_from_id(id: &str) -> OsFamily {
    match id {
        "alpine" => OsFamily::Alpine,
        "debian" | "ubuntu" => OsFamily::Debian,
        "rhel" | "centos" | "fedora" | "rocky" | "almalinux" => OsFamily::RedHat,
        _ => OsFamily::Unknown,
    }
}

fn family_from_issue(content: &str) -> OsFamily {
    let content = content.to_ascii_lowercase();
    if content.contains("alpine") {
        OsFamily::Alpine
    } else if content.contains("debian") || content.contains("ubuntu") {
        OsFamily::Debian
    } else if ["centos", "red hat", "fedora"]
        .iter()
        .any(|name| content.contains(name))
    {
        OsFamily::RedHat
    } else {
        OsFamily::Unknown
    }
}

/// Map a `uname -m` string onto a release architecture
///
/// Alpine additionally accepts every `armv7*` variant as `arm`.
pub fn map_architecture(family: OsFamily, machine: &str) -> Result<Architecture> {
    match machine {
        "x86_64" => Ok(Architecture::Amd64),
        "aarch64" => Ok(Architecture::Arm64),
        "armv7l" => Ok(Architecture::Arm),
        other if family == OsFamily::Alpine && other.starts_with("armv7") => Ok(Architecture::Arm),
        other => Err(InstallerError::UnsupportedArchitecture(other.to_string())),
    }
}
