//! Error types for the installer
//!
//! Every component returns `InstallerError`. Whether a failure aborts the
//! workflow or is only reported is decided by the lifecycle orchestrator, not
//! by the component that raised it.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallerError {
    #[error("root privileges are required")]
    PermissionDenied,

    #[error("unsupported operating system: {0}")]
    UnsupportedPlatform(String),

    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("dependency installation via {manager} failed: {message}")]
    DependencyInstall { manager: String, message: String },

    #[error("failed to acquire the proxy binary: {0}")]
    BinaryAcquisition(String),

    #[error("proxy binary at {} failed its self-check: {message}", .path.display())]
    BinaryVerification { path: PathBuf, message: String },

    #[error("credential provisioning failed: {0}")]
    Credential(String),

    #[error("port hopping setup failed: {0}")]
    PortHop(String),

    #[error("service registration failed: {0}")]
    Service(String),

    #[error("cannot build share link: {0}")]
    ShareLink(String),

    #[error("no configuration found at {}", .0.display())]
    NotConfigured(PathBuf),

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("command `{cmd}` failed: {message}")]
    Command { cmd: String, message: String },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("prompt cancelled: {0}")]
    Cancelled(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("release metadata error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallerError {
    /// Operator-facing hint for failures that have an obvious next step.
    pub fn remediation(&self) -> Option<String> {
        match self {
            Self::PermissionDenied => Some("re-run as root, e.g. `sudo hy2-install`".to_string()),
            Self::BinaryVerification { path, .. } => {
                Some(format!("try running `{} version` manually", path.display()))
            }
            Self::UnsupportedPlatform(_) => {
                Some("supported families: Debian/Ubuntu, CentOS/RHEL/Fedora, Alpine".to_string())
            }
            Self::Credential(_) => Some(
                "for ACME, make sure the domain resolves to this host and port 80 is reachable"
                    .to_string(),
            ),
            Self::NotConfigured(_) => Some("run the install workflow first".to_string()),
            _ => None,
        }
    }
}

pub type Result<T, E = InstallerError> = std::result::Result<T, E>;
