//! ACME issuance through acme.sh

use std::path::{Path, PathBuf};

use log::info;

use crate::error::{InstallerError, Result};
use crate::process::{CommandRunner, CommandSpec};

/// acme.sh exits 2 when the existing certificate is not due for renewal
const EXIT_RENEWAL_SKIPPED: i32 = 2;

/// Obtains a CA-signed certificate for a domain
pub trait CertificateIssuer {
    fn name(&self) -> &'static str;

    /// Issue for `domain` and install the chain and key into `cert_dir`.
    ///
    /// Returns `(certificate_path, key_path)`.
    fn issue(&self, domain: &str, email: &str, cert_dir: &Path) -> Result<(PathBuf, PathBuf)>;
}

pub struct AcmeSh<'a> {
    runner: &'a dyn CommandRunner,
    home: PathBuf,
    bootstrap_url: String,
}

impl<'a> AcmeSh<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        home: PathBuf,
        bootstrap_url: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            home,
            bootstrap_url: bootstrap_url.into(),
        }
    }

    fn script(&self) -> PathBuf {
        self.home.join("acme.sh")
    }

    fn ensure_installed(&self, email: &str) -> Result<()> {
        if self.script().is_file() {
            return Ok(());
        }
        info!("Installing acme.sh...");
        let spec = CommandSpec::shell(format!(
            "curl -fsSL {} | sh -s email={email}",
            self.bootstrap_url
        ));
        self.runner.run_checked(&spec).map_err(credential_error)?;
        Ok(())
    }

    fn acme(&self) -> CommandSpec {
        CommandSpec::new(self.script().display().to_string())
    }
}

impl CertificateIssuer for AcmeSh<'_> {
    fn name(&self) -> &'static str {
        "acme.sh"
    }

    fn issue(&self, domain: &str, email: &str, cert_dir: &Path) -> Result<(PathBuf, PathBuf)> {
        self.ensure_installed(email)?;

        info!("Requesting a certificate for {domain} (standalone HTTP challenge)...");
        let issue = self
            .acme()
            .args(["--issue", "-d", domain, "--standalone", "-k", "ec-256"]);
        let output = self.runner.run(&issue).map_err(credential_error)?;
        match output.exit_code {
            0 => {}
            EXIT_RENEWAL_SKIPPED => info!("Existing certificate for {domain} is still valid"),
            code => {
                return Err(InstallerError::Credential(format!(
                    "acme.sh --issue exited with {code}: {}",
                    output.diagnostic()
                )));
            }
        }

        let cert_path = cert_dir.join("cert.pem");
        let key_path = cert_dir.join("cert.key");
        let install = self
            .acme()
            .args(["--installcert", "-d", domain, "--key-file"])
            .arg(key_path.display().to_string())
            .arg("--fullchain-file")
            .arg(cert_path.display().to_string())
            .arg("--ecc");
        self.runner.run_checked(&install).map_err(credential_error)?;

        Ok((cert_path, key_path))
    }
}

fn credential_error(e: InstallerError) -> InstallerError {
    match e {
        InstallerError::Credential(_) => e,
        other => InstallerError::Credential(other.to_string()),
    }
}
