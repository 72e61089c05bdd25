//! TLS credential provisioning
//!
//! Produces the certificate/key pair the proxy serves: a long-lived
//! self-signed pair bound to an impersonated hostname, or an ACME-issued pair
//! obtained through a [`CertificateIssuer`].

mod acme;
mod self_signed;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use time::OffsetDateTime;

use crate::config::HostLayout;
use crate::error::{InstallerError, Result};
use crate::install::file_ops::set_mode;

pub use acme::{AcmeSh, CertificateIssuer};

/// Hostnames offered for the self-signed subject, keyed "1" to "5"
pub const RECOMMENDED_HOSTNAMES: [&str; 5] = [
    "www.bing.com",
    "www.microsoft.com",
    "www.apple.com",
    "www.amazon.com",
    "www.cloudflare.com",
];

/// Menu key for a custom hostname
pub const CUSTOM_HOSTNAME_CHOICE: &str = "6";

/// Used for an empty custom hostname and for the self-signed retry
pub const FALLBACK_HOSTNAME: &str = "www.bing.com";

/// Credential files stay readable by the unprivileged proxy user
pub const CREDENTIAL_MODE: u32 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceMode {
    SelfSigned,
    Acme,
}

impl fmt::Display for IssuanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IssuanceMode::SelfSigned => "self-signed",
            IssuanceMode::Acme => "acme",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialRequest {
    SelfSigned { hostname: String },
    Acme { domain: String, email: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialMaterial {
    pub certificate_path: PathBuf,
    pub key_path: PathBuf,
    pub subject_hostname: String,
    pub issuance_mode: IssuanceMode,
}

/// Resolve a hostname menu answer ("1"-"5", or "6" with `custom`)
pub fn hostname_for_choice(choice: &str, custom: Option<&str>) -> String {
    if choice == CUSTOM_HOSTNAME_CHOICE {
        return match custom.map(str::trim) {
            Some(custom) if !custom.is_empty() => custom.to_string(),
            _ => FALLBACK_HOSTNAME.to_string(),
        };
    }
    choice
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| RECOMMENDED_HOSTNAMES.get(i))
        .unwrap_or(&FALLBACK_HOSTNAME)
        .to_string()
}

/// Produce credentials for `request` under the layout's certificate directory.
pub fn provision_credentials(
    request: &CredentialRequest,
    layout: &HostLayout,
    issuer: &dyn CertificateIssuer,
) -> Result<CredentialMaterial> {
    let cert_dir = layout.cert_dir();
    fs::create_dir_all(&cert_dir)?;

    let material = match request {
        CredentialRequest::SelfSigned { hostname } => {
            match self_signed::generate(&cert_dir, hostname) {
                Ok(material) => material,
                Err(e) if hostname != FALLBACK_HOSTNAME => {
                    warn!(
                        "Self-signed certificate for {hostname} failed ({e}); \
                         retrying with {FALLBACK_HOSTNAME}"
                    );
                    self_signed::generate(&cert_dir, FALLBACK_HOSTNAME)?
                }
                Err(e) => return Err(e),
            }
        }
        CredentialRequest::Acme { domain, email } => {
            let (certificate_path, key_path) = issuer.issue(domain, email, &cert_dir)?;
            for path in [&certificate_path, &key_path] {
                if !path.is_file() {
                    return Err(InstallerError::Credential(format!(
                        "{} did not produce {}",
                        issuer.name(),
                        path.display()
                    )));
                }
            }
            CredentialMaterial {
                certificate_path,
                key_path,
                subject_hostname: domain.clone(),
                issuance_mode: IssuanceMode::Acme,
            }
        }
    };

    set_mode(&material.certificate_path, CREDENTIAL_MODE)?;
    set_mode(&material.key_path, CREDENTIAL_MODE)?;
    info!(
        "{} certificate for {} at {}",
        material.issuance_mode,
        material.subject_hostname,
        material.certificate_path.display()
    );
    Ok(material)
}

/// Subject and remaining lifetime of an installed certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub common_name: Option<String>,
    pub days_remaining: i64,
}

impl CertificateSummary {
    pub fn from_pem(cert_pem: &str) -> Result<Self> {
        let block = pem::parse(cert_pem)
            .map_err(|e| InstallerError::Credential(format!("invalid certificate PEM: {e}")))?;
        if block.tag() != "CERTIFICATE" {
            return Err(InstallerError::Credential(format!(
                "expected a CERTIFICATE block, found {}",
                block.tag()
            )));
        }

        let (_, cert) = x509_parser::parse_x509_certificate(block.contents())
            .map_err(|e| InstallerError::Credential(format!("invalid X.509 certificate: {e}")))?;

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let days_remaining = (cert.validity().not_after.timestamp() - now) / 86_400;

        Ok(Self {
            common_name,
            days_remaining,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_pem(&fs::read_to_string(path)?)
    }
}

impl fmt::Display for CertificateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.common_name {
            Some(cn) => write!(f, "CN={cn}")?,
            None => f.write_str("no CN")?,
        }
        if self.days_remaining < 0 {
            write!(f, ", expired {} days ago", -self.days_remaining)
        } else {
            write!(f, ", expires in {} days", self.days_remaining)
        }
    }
}
