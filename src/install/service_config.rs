//! Proxy service configuration synthesis
//!
//! The config is rendered from a fixed template before credentials exist,
//! with placeholder TLS paths that the credential step patches in place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::{info, warn};
use regex::{Captures, Regex};

use super::file_ops::write_file_atomic;
use crate::config::HostLayout;
use crate::error::{InstallerError, Result};

pub const CONFIG_MODE: u32 = 0o600;

pub const PLACEHOLDER_CERT: &str = "/etc/ssl/cert.pem";
pub const PLACEHOLDER_KEY: &str = "/etc/ssl/key.pem";

static CERT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?P<indent>[ \t]*)cert:.*$").expect("valid pattern"));
static KEY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?P<indent>[ \t]*)key:.*$").expect("valid pattern"));
static LISTEN_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^listen:\s*\S*:(?P<port>\d+)\s*$").expect("valid pattern"));
static PASSWORD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]+password:[ \t]*(?P<value>\S+)[ \t]*$").expect("valid pattern")
});

/// QUIC flow-control windows, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTuning {
    pub stream_receive_window: u64,
    pub conn_receive_window: u64,
}

impl Default for TransportTuning {
    fn default() -> Self {
        Self {
            stream_receive_window: 8_388_608,
            conn_receive_window: 20_971_520,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub listen_port: u16,
    pub auth_secret: String,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub masquerade_url: String,
    pub transport: TransportTuning,
}

impl ServiceConfig {
    /// A config whose TLS paths still point at the placeholders
    pub fn new(
        listen_port: u16,
        auth_secret: impl Into<String>,
        masquerade_url: impl Into<String>,
    ) -> Self {
        Self {
            listen_port,
            auth_secret: auth_secret.into(),
            tls_cert_path: PathBuf::from(PLACEHOLDER_CERT),
            tls_key_path: PathBuf::from(PLACEHOLDER_KEY),
            masquerade_url: masquerade_url.into(),
            transport: TransportTuning::default(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "listen: :{port}

auth:
  type: password
  password: {secret}

tls:
  cert: {cert}
  key: {key}

masquerade:
  type: proxy
  proxy:
    url: {masquerade}
    rewriteHost: true

quic:
  initStreamReceiveWindow: {stream}
  maxStreamReceiveWindow: {stream}
  initConnReceiveWindow: {conn}
  maxConnReceiveWindow: {conn}
",
            port = self.listen_port,
            secret = self.auth_secret,
            cert = self.tls_cert_path.display(),
            key = self.tls_key_path.display(),
            masquerade = self.masquerade_url,
            stream = self.transport.stream_receive_window,
            conn = self.transport.conn_receive_window,
        )
    }

    /// Overwrite the installation's config wholesale.
    pub fn write(&self, layout: &HostLayout) -> Result<PathBuf> {
        let path = layout.config_path();
        write_file_atomic(&path, self.render().as_bytes(), CONFIG_MODE)?;
        info!("Wrote {}", path.display());
        Ok(path)
    }
}

/// Replace the value of every `cert:` and `key:` line, keeping indentation.
///
/// Returns the new content and whether both keys were present.
pub fn rewrite_credential_paths(content: &str, cert: &Path, key: &Path) -> (String, bool) {
    let has_both = CERT_LINE.is_match(content) && KEY_LINE.is_match(content);

    let cert = cert.display().to_string();
    let key = key.display().to_string();
    let content = CERT_LINE.replace_all(content, |caps: &Captures| {
        format!("{}cert: {cert}", &caps["indent"])
    });
    let content = KEY_LINE.replace_all(&content, |caps: &Captures| {
        format!("{}key: {key}", &caps["indent"])
    });
    (content.into_owned(), has_both)
}

/// Point the installed config at freshly provisioned credentials.
///
/// `cert` and `key` are layout paths; the config receives their host paths.
pub fn patch_credential_paths(layout: &HostLayout, cert: &Path, key: &Path) -> Result<()> {
    let path = layout.config_path();
    let content = read_config(&path)?;

    let cert = layout.host_path(cert);
    let key = layout.host_path(key);
    let (patched, has_both) = rewrite_credential_paths(&content, &cert, &key);
    if !has_both {
        warn!(
            "{} is missing a cert: or key: line; TLS paths may be incomplete",
            path.display()
        );
    }
    if patched != content {
        write_file_atomic(&path, patched.as_bytes(), CONFIG_MODE)?;
    }
    info!("Config now uses {} and {}", cert.display(), key.display());
    Ok(())
}

fn read_config(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => InstallerError::NotConfigured(path.to_path_buf()),
        _ => e.into(),
    })
}

/// The fields the installer reads back from an existing config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledConfig {
    pub raw: String,
    pub listen_port: Option<u16>,
    pub password: Option<String>,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

impl InstalledConfig {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let listen_port = LISTEN_LINE
            .captures(&raw)
            .and_then(|caps| caps["port"].parse().ok());
        let password = PASSWORD_LINE
            .captures(&raw)
            .map(|caps| caps["value"].to_string());
        let cert_path = value_of(&CERT_LINE, &raw, "cert:");
        let key_path = value_of(&KEY_LINE, &raw, "key:");

        Self {
            raw,
            listen_port,
            password,
            cert_path,
            key_path,
        }
    }

    pub fn load(layout: &HostLayout) -> Result<Self> {
        Ok(Self::parse(read_config(&layout.config_path())?))
    }
}

fn value_of(pattern: &Regex, raw: &str, key: &str) -> Option<PathBuf> {
    let line = pattern.find(raw)?.as_str();
    let value = line.trim_start().strip_prefix(key)?.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}
