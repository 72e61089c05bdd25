//! Proxy binary provisioning
//!
//! Vendor bootstrap first, direct release download as the only fallback,
//! then relocation into the canonical path and a `version` self-check.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::checksum::{expected_digest, file_sha256};
use super::github::latest_release_tag;
use super::platform::{artifact_name, asset_url};
use crate::config::{HostLayout, InstallerSettings};
use crate::error::{InstallerError, Result};
use crate::http::Fetcher;
use crate::install::detection::Architecture;
use crate::install::file_ops::set_mode;
use crate::process::{CommandRunner, CommandSpec};

const BINARY_MODE: u32 = 0o755;

pub struct BinaryProvisioner<'a> {
    settings: &'a InstallerSettings,
    layout: &'a HostLayout,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn Fetcher,
}

impl<'a> BinaryProvisioner<'a> {
    pub fn new(
        settings: &'a InstallerSettings,
        layout: &'a HostLayout,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn Fetcher,
    ) -> Self {
        Self {
            settings,
            layout,
            runner,
            fetcher,
        }
    }

    /// Ensure a verified executable exists at the canonical path.
    pub fn provision(&self, arch: Architecture) -> Result<PathBuf> {
        if let Err(bootstrap_err) = self.run_bootstrap() {
            warn!(
                "Vendor bootstrap failed ({bootstrap_err}); \
                 downloading the release artifact directly"
            );
            self.download_release(arch).map_err(|e| {
                InstallerError::BinaryAcquisition(format!(
                    "bootstrap failed ({bootstrap_err}) and direct download failed ({e})"
                ))
            })?;
        }

        let canonical = self.layout.binary_path();
        let found = self.locate().ok_or_else(|| {
            InstallerError::BinaryAcquisition(format!(
                "no executable found in {}",
                self.layout
                    .binary_candidates()
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        if found != canonical {
            info!("Copying {} to {}", found.display(), canonical.display());
            if let Some(parent) = canonical.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&found, &canonical)?;
        }
        set_mode(&canonical, BINARY_MODE)?;

        self.self_check(&canonical)?;
        Ok(canonical)
    }

    fn run_bootstrap(&self) -> Result<()> {
        info!("Running vendor bootstrap from {}", self.settings.bootstrap_url);
        let spec = CommandSpec::shell(format!("curl -fsSL {} | bash", self.settings.bootstrap_url));
        self.runner.run_checked(&spec)?;
        Ok(())
    }

    /// Download the latest release artifact into the canonical path.
    ///
    /// The artifact lands in a sibling temp file that is only renamed into
    /// place after its digest checks out.
    fn download_release(&self, arch: Architecture) -> Result<()> {
        let repo = &self.settings.repository;
        let tag = latest_release_tag(self.fetcher, &self.settings.github_api, repo)?;
        let asset = artifact_name(arch);
        let url = asset_url(&self.settings.github_download, repo, &tag, &asset);
        info!("Downloading {asset} ({tag})");

        let canonical = self.layout.binary_path();
        let parent = canonical
            .parent()
            .ok_or_else(|| InstallerError::BinaryAcquisition("binary path has no parent".into()))?;
        fs::create_dir_all(parent)?;

        let staged = tempfile::Builder::new()
            .prefix(".hysteria-")
            .suffix(".download")
            .tempfile_in(parent)?;
        let bytes = self.fetcher.download(&url, staged.path())?;
        if bytes == 0 {
            return Err(InstallerError::BinaryAcquisition(format!("{url} returned an empty body")));
        }

        self.verify_digest(repo, &tag, &asset, staged.path())?;

        set_mode(staged.path(), BINARY_MODE)?;
        staged.persist(&canonical).map_err(|e| InstallerError::Io(e.error))?;
        Ok(())
    }

    fn verify_digest(&self, repo: &str, tag: &str, asset: &str, path: &Path) -> Result<()> {
        let manifest_url = asset_url(&self.settings.github_download, repo, tag, "hashes.txt");
        let manifest = match self.fetcher.fetch_text(&manifest_url) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("No checksum manifest for {tag} ({e}); skipping verification");
                return Ok(());
            }
        };
        let Some(expected) = expected_digest(&manifest, asset) else {
            warn!("hashes.txt for {tag} does not list {asset}; skipping verification");
            return Ok(());
        };

        let actual = file_sha256(path)?;
        if actual != expected {
            return Err(InstallerError::BinaryAcquisition(format!(
                "checksum mismatch for {asset}: expected {expected}, got {actual}"
            )));
        }
        info!("Verified SHA-256 of {asset}");
        Ok(())
    }

    fn locate(&self) -> Option<PathBuf> {
        self.layout
            .binary_candidates()
            .into_iter()
            .find(|candidate| candidate.is_file())
    }

    fn self_check(&self, binary: &Path) -> Result<()> {
        let spec = CommandSpec::new(binary.display().to_string()).arg("version");
        let output = self.runner.run(&spec).map_err(|e| InstallerError::BinaryVerification {
            path: binary.to_path_buf(),
            message: e.to_string(),
        })?;
        if !output.success() {
            return Err(InstallerError::BinaryVerification {
                path: binary.to_path_buf(),
                message: format!("exit code {}: {}", output.exit_code, output.diagnostic()),
            });
        }
        if let Some(version) = output.stdout.lines().find(|l| l.contains("Version")) {
            info!("Installed {}", version.trim());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::file_ops::mode_of;
    use crate::testing::{FakeFetcher, FakeRunner};
    use tempfile::tempdir;

    const LATEST: &str = "https://api.github.com/repos/apernet/hysteria/releases/latest";
    const ARTIFACT: &str =
        "https://github.com/apernet/hysteria/releases/download/app/v2.6.1/hysteria-linux-amd64";
    const HASHES: &str =
        "https://github.com/apernet/hysteria/releases/download/app/v2.6.1/hashes.txt";

    fn settings_at(root: &Path) -> InstallerSettings {
        InstallerSettings {
            root: root.to_path_buf(),
            ..InstallerSettings::default()
        }
    }

    fn release_fetcher(body: &[u8]) -> FakeFetcher {
        FakeFetcher::new()
            .text(LATEST, r#"{"tag_name":"app/v2.6.1"}"#)
            .file(ARTIFACT, body)
    }

    #[test]
    fn test_bootstrap_success_skips_download() {
        let dir = tempdir().unwrap();
        let settings = settings_at(dir.path());
        let layout = settings.layout();
        let binary = layout.binary_path();
        fs::create_dir_all(binary.parent().unwrap()).unwrap();
        fs::write(&binary, b"#!/bin/sh\n").unwrap();

        let runner = FakeRunner::new();
        let fetcher = FakeFetcher::new();
        let path = BinaryProvisioner::new(&settings, &layout, &runner, &fetcher)
            .provision(Architecture::Amd64)
            .unwrap();

        assert_eq!(path, binary);
        assert!(fetcher.requested().is_empty());
        assert!(runner.ran("curl -fsSL https://get.hy2.sh/ | bash"));
        assert!(runner.ran("usr/local/bin/hysteria version"));
        assert_eq!(mode_of(&binary).unwrap(), 0o755);
    }

    #[test]
    fn test_binary_in_usr_bin_is_copied() {
        let dir = tempdir().unwrap();
        let settings = settings_at(dir.path());
        let layout = settings.layout();
        let elsewhere = layout.resolve("/usr/bin/hysteria");
        fs::create_dir_all(elsewhere.parent().unwrap()).unwrap();
        fs::write(&elsewhere, b"ELF").unwrap();

        let runner = FakeRunner::new();
        let fetcher = FakeFetcher::new();
        BinaryProvisioner::new(&settings, &layout, &runner, &fetcher)
            .provision(Architecture::Amd64)
            .unwrap();

        assert_eq!(fs::read(layout.binary_path()).unwrap(), b"ELF");
        assert_eq!(mode_of(&layout.binary_path()).unwrap(), 0o755);
    }

    #[test]
    fn test_falls_back_to_release_download() {
        let dir = tempdir().unwrap();
        let settings = settings_at(dir.path());
        let layout = settings.layout();

        let runner = FakeRunner::new().fail_on("get.hy2.sh");
        let fetcher = release_fetcher(b"binary").text(
            HASHES,
            "2a23e8de7c1e9d6c0ab1b8c0dbeba5b5dc2c4f5c1c26a6e1efb5c2a7cd4b1f6d  build/hysteria-linux-arm64\n",
        );

        BinaryProvisioner::new(&settings, &layout, &runner, &fetcher)
            .provision(Architecture::Amd64)
            .unwrap();

        assert_eq!(fs::read(layout.binary_path()).unwrap(), b"binary");
        assert!(fetcher.requested().contains(&ARTIFACT.to_string()));
    }

    #[test]
    fn test_checksum_mismatch_is_fatal_and_leaves_nothing() {
        let dir = tempdir().unwrap();
        let settings = settings_at(dir.path());
        let layout = settings.layout();

        let runner = FakeRunner::new().fail_on("get.hy2.sh");
        let fetcher = release_fetcher(b"tampered").text(
            HASHES,
            &format!("{}  build/hysteria-linux-amd64\n", "0".repeat(64)),
        );

        let err = BinaryProvisioner::new(&settings, &layout, &runner, &fetcher)
            .provision(Architecture::Amd64)
            .unwrap_err();

        assert!(matches!(
            err,
            InstallerError::BinaryAcquisition(ref m) if m.contains("checksum mismatch")
        ));
        let bin_dir = layout.resolve("/usr/local/bin");
        assert_eq!(fs::read_dir(bin_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_both_strategies_failing_is_fatal() {
        let dir = tempdir().unwrap();
        let settings = settings_at(dir.path());
        let layout = settings.layout();

        let runner = FakeRunner::new().fail_on("get.hy2.sh");
        let fetcher = FakeFetcher::new();
        let provisioner = BinaryProvisioner::new(&settings, &layout, &runner, &fetcher);
        assert!(matches!(
            provisioner.provision(Architecture::Arm64),
            Err(InstallerError::BinaryAcquisition(_))
        ));
    }

    #[test]
    fn test_failed_self_check_is_verification_error() {
        let dir = tempdir().unwrap();
        let settings = settings_at(dir.path());
        let layout = settings.layout();
        let binary = layout.binary_path();
        fs::create_dir_all(binary.parent().unwrap()).unwrap();
        fs::write(&binary, b"garbage").unwrap();

        let runner = FakeRunner::new().exit_with("hysteria version", 126);
        let fetcher = FakeFetcher::new();
        let err = BinaryProvisioner::new(&settings, &layout, &runner, &fetcher)
            .provision(Architecture::Amd64)
            .unwrap_err();

        assert!(matches!(err, InstallerError::BinaryVerification { .. }));
        assert!(err.remediation().unwrap().contains("version"));
    }
}
