//! Installer settings and host filesystem layout
//!
//! Settings are read from an optional TOML file; every field has a default so
//! an empty or missing file yields a working installer. All host paths are
//! derived from [`HostLayout`], which is rooted at `settings.root` (normally
//! `/`) so workflows can run against a scratch directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{InstallerError, Result};

/// Settings file consulted when `--settings` is not given.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/hysteria-installer.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InstallerSettings {
    /// Filesystem root every host path is resolved against
    pub root: PathBuf,
    /// Init-system unit name for the proxy
    pub service_name: String,
    /// GitHub `owner/name` of the proxy project
    pub repository: String,
    /// Vendor bootstrap script, piped into bash
    pub bootstrap_url: String,
    pub github_api: String,
    pub github_download: String,
    /// Site the proxy impersonates when probed
    pub masquerade_url: String,
    pub shortcut_name: String,
    /// Remote bootstrap the shortcut stub re-fetches and executes
    pub shortcut_source_url: String,
    /// Tried in order; each must answer with a bare IP address
    pub ip_endpoints: Vec<String>,
    pub acme_home: PathBuf,
    pub acme_bootstrap_url: String,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            service_name: "hysteria-server".to_string(),
            repository: "apernet/hysteria".to_string(),
            bootstrap_url: "https://get.hy2.sh/".to_string(),
            github_api: "https://api.github.com".to_string(),
            github_download: "https://github.com".to_string(),
            masquerade_url: "https://www.bing.com".to_string(),
            shortcut_name: "hy2".to_string(),
            shortcut_source_url:
                "https://raw.githubusercontent.com/heyuecock/hysteria2/main/install.sh".to_string(),
            ip_endpoints: vec![
                "https://api-ipv4.ip.sb/ip".to_string(),
                "https://api-ipv6.ip.sb/ip".to_string(),
            ],
            acme_home: PathBuf::from("/root/.acme.sh"),
            acme_bootstrap_url: "https://get.acme.sh".to_string(),
        }
    }
}

impl InstallerSettings {
    /// Load settings from `path`, or from [`DEFAULT_SETTINGS_PATH`] when present.
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            InstallerError::Settings(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_path_component(&self.service_name) {
            return Err(InstallerError::Settings(format!(
                "service_name must be a single path component, got '{}'",
                self.service_name
            )));
        }
        if !is_path_component(&self.shortcut_name) {
            return Err(InstallerError::Settings(format!(
                "shortcut_name must be a single path component, got '{}'",
                self.shortcut_name
            )));
        }
        if self.repository.split('/').filter(|p| !p.is_empty()).count() != 2 {
            return Err(InstallerError::Settings(format!(
                "repository must look like owner/name, got '{}'",
                self.repository
            )));
        }

        let urls = [
            ("bootstrap_url", &self.bootstrap_url),
            ("github_api", &self.github_api),
            ("github_download", &self.github_download),
            ("masquerade_url", &self.masquerade_url),
            ("shortcut_source_url", &self.shortcut_source_url),
            ("acme_bootstrap_url", &self.acme_bootstrap_url),
        ];
        for (field, value) in urls.into_iter().chain(
            self.ip_endpoints
                .iter()
                .map(|endpoint| ("ip_endpoints", endpoint)),
        ) {
            url::Url::parse(value)
                .map_err(|e| InstallerError::Settings(format!("{field}: '{value}': {e}")))?;
        }

        Ok(())
    }

    pub fn layout(&self) -> HostLayout {
        HostLayout::new(&self.root, &self.service_name)
    }
}

/// `true` when `name` can be used as a file name on its own.
pub fn is_path_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Well-known host paths, resolved against an injectable root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    root: PathBuf,
    service_name: String,
}

impl HostLayout {
    pub fn new(root: impl Into<PathBuf>, service_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            service_name: service_name.into(),
        }
    }

    /// Map an absolute host path into this layout's root.
    pub fn resolve(&self, absolute: &str) -> PathBuf {
        self.root.join(absolute.trim_start_matches('/'))
    }

    /// The path `path` has on the host itself, with this layout's root removed.
    ///
    /// Artifacts the proxy or init system read (config, unit) must carry host
    /// paths. Paths outside the root are returned unchanged.
    pub fn host_path(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.root) {
            Ok(relative) => Path::new("/").join(relative),
            Err(_) => path.to_path_buf(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn config_dir(&self) -> PathBuf {
        self.resolve("/etc/hysteria")
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir().join("config.yaml")
    }

    /// Canonical install location of the proxy executable
    pub fn binary_path(&self) -> PathBuf {
        self.resolve("/usr/local/bin/hysteria")
    }

    /// Conventional locations a bootstrap may have installed the binary to
    pub fn binary_candidates(&self) -> Vec<PathBuf> {
        vec![self.binary_path(), self.resolve("/usr/bin/hysteria")]
    }

    pub fn cert_dir(&self) -> PathBuf {
        self.resolve("/etc/ssl/private")
    }

    pub fn systemd_unit_dir(&self) -> PathBuf {
        self.resolve("/etc/systemd/system")
    }

    pub fn openrc_init_dir(&self) -> PathBuf {
        self.resolve("/etc/init.d")
    }

    /// Unit left behind by older installers that persisted NAT rules via systemd
    pub fn legacy_port_hop_unit(&self) -> PathBuf {
        self.systemd_unit_dir().join("port-hop.service")
    }

    pub fn shortcut_path(&self, name: &str) -> PathBuf {
        self.resolve("/usr/local/bin").join(name)
    }

    pub fn os_release(&self) -> PathBuf {
        self.resolve("/etc/os-release")
    }

    pub fn issue(&self) -> PathBuf {
        self.resolve("/etc/issue")
    }
}
