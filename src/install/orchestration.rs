//! Lifecycle orchestration
//!
//! Sequences platform detection, dependencies, binary, config, credentials,
//! port hopping and service registration into the install workflow, and
//! provides the uninstall, inspect and rename-shortcut workflows.

use std::fmt;
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use super::certificates::{
    AcmeSh, CertificateSummary, CredentialMaterial, provision_credentials,
};
use super::dependencies::ensure_dependencies;
use super::detection::{OsFamily, PlatformProfile, detect_family, detect_platform};
use super::download::BinaryProvisioner;
use super::file_ops::mode_of;
use super::port_hop::{NetworkRemapper, PortHopRule};
use super::prompt::{Prompter, ask_until, parse_command_name};
use super::service_config::{InstalledConfig, ServiceConfig, patch_credential_paths};
use super::share::{DEFAULT_NODE_NAME, ShareDescriptor, lookup_public_address};
use super::shortcut::{self, RenameOutcome};
use super::uninstall::{self, UninstallReport};
use super::unit::{ServiceActivation, register_service};
use super::wizard::{InstallAnswers, gather_install_answers};
use crate::config::{HostLayout, InstallerSettings};
use crate::control::controller_for;
use crate::error::Result;
use crate::http::Fetcher;
use crate::process::CommandRunner;

/// Port assumed when an existing config has no parsable listen line
const DEFAULT_LISTEN_PORT: u16 = 443;

/// Install progress; each state is reached only after the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstallState {
    Uninstalled,
    DepsInstalled,
    BinaryReady,
    Configured,
    Credentialed,
    ServiceActive,
}

impl InstallState {
    const STEPS: u64 = 5;

    fn step(self) -> u64 {
        self as u64
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstallState::Uninstalled => "uninstalled",
            InstallState::DepsInstalled => "deps-installed",
            InstallState::BinaryReady => "binary-ready",
            InstallState::Configured => "configured",
            InstallState::Credentialed => "credentialed",
            InstallState::ServiceActive => "service-active",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortHopStatus {
    NotRequested,
    Applied(PortHopRule),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct InstallReport {
    pub state: InstallState,
    pub platform: PlatformProfile,
    pub binary_path: PathBuf,
    pub config_path: PathBuf,
    pub credentials: CredentialMaterial,
    pub port_hop: PortHopStatus,
    pub activation: ServiceActivation,
    pub shortcut: Option<PathBuf>,
    pub share: ShareDescriptor,
}

#[derive(Debug, Clone)]
pub struct InspectReport {
    pub config: InstalledConfig,
    pub share: ShareDescriptor,
    pub certificate: Option<CertificateSummary>,
    pub service_active: bool,
}

pub struct Installer<'a> {
    settings: &'a InstallerSettings,
    layout: HostLayout,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn Fetcher,
}

impl<'a> Installer<'a> {
    pub fn new(
        settings: &'a InstallerSettings,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn Fetcher,
    ) -> Self {
        Self {
            settings,
            layout: settings.layout(),
            runner,
            fetcher,
        }
    }

    /// Run the install workflow.
    ///
    /// All operator input is gathered before the host is touched. Every step
    /// but port hopping, the shortcut and the activation check is fatal.
    pub fn install(&self, prompter: &mut dyn Prompter) -> Result<InstallReport> {
        let platform = detect_platform(&self.layout, self.runner)?;
        let answers = gather_install_answers(prompter)?;

        let progress = install_progress();
        let mut state = InstallState::Uninstalled;
        let mut advance = |next: InstallState| {
            info!("Install state: {state} -> {next}");
            state = next;
            progress.set_position(next.step());
            progress.set_message(next.to_string());
        };

        progress.set_message("installing dependencies");
        ensure_dependencies(platform.family, self.runner)?;
        advance(InstallState::DepsInstalled);

        progress.set_message("provisioning binary");
        let binary_path =
            BinaryProvisioner::new(self.settings, &self.layout, self.runner, self.fetcher)
                .provision(platform.architecture)?;
        advance(InstallState::BinaryReady);

        let config = ServiceConfig::new(
            answers.listen_port,
            answers.auth_secret.clone(),
            self.settings.masquerade_url.clone(),
        );
        let config_path = config.write(&self.layout)?;
        advance(InstallState::Configured);

        progress.set_message("provisioning credentials");
        let issuer = AcmeSh::new(
            self.runner,
            self.layout.resolve(&self.settings.acme_home.to_string_lossy()),
            self.settings.acme_bootstrap_url.clone(),
        );
        let credentials = provision_credentials(&answers.credential, &self.layout, &issuer)?;
        patch_credential_paths(&self.layout, &credentials.certificate_path, &credentials.key_path)?;
        advance(InstallState::Credentialed);

        let port_hop = self.setup_port_hop(platform.family, &answers);

        progress.set_message("registering service");
        let controller = controller_for(platform.family, &self.layout, self.runner);
        let activation = register_service(controller.as_ref(), &self.layout)?;
        if activation.is_active() {
            advance(InstallState::ServiceActive);
        } else {
            warn!("{} is not active after start", self.layout.service_name());
        }
        progress.finish_and_clear();

        let shortcut = match shortcut::write_shortcut(
            &self.layout,
            &self.settings.shortcut_name,
            &self.settings.shortcut_source_url,
        ) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Could not create the shortcut command: {e}");
                None
            }
        };

        let share = ShareDescriptor {
            auth_secret: answers.auth_secret.clone(),
            server_address: lookup_public_address(self.fetcher, &self.settings.ip_endpoints),
            listen_port: answers.listen_port,
            node_name: answers.node_name.clone(),
        };

        Ok(InstallReport {
            state,
            platform,
            binary_path,
            config_path,
            credentials,
            port_hop,
            activation,
            shortcut,
            share,
        })
    }

    fn setup_port_hop(&self, family: OsFamily, answers: &InstallAnswers) -> PortHopStatus {
        let Some((start, end)) = answers.port_hop else {
            return PortHopStatus::NotRequested;
        };

        let remapper = NetworkRemapper::new(self.runner, family);
        let result = PortHopRule::new(start, end, answers.listen_port, remapper.default_interface())
            .and_then(|rule| remapper.apply(&rule).map(|()| rule));
        match result {
            Ok(rule) => PortHopStatus::Applied(rule),
            Err(e) => {
                warn!("Port hopping was not configured: {e}");
                PortHopStatus::Failed(e.to_string())
            }
        }
    }

    /// Remove the installation. Never fails; each step reports its own outcome.
    pub fn uninstall(&self) -> UninstallReport {
        // Unknown hosts were only ever installed with systemd
        let family = detect_family(&self.layout);
        let controller = controller_for(family, &self.layout, self.runner);
        let remapper = NetworkRemapper::new(self.runner, family);

        uninstall::uninstall(
            &self.layout,
            controller.as_ref(),
            self.runner,
            &remapper,
            &self.settings.shortcut_name,
        )
    }

    /// Read back the installed config and derive the share link.
    pub fn inspect(&self) -> Result<InspectReport> {
        let config = InstalledConfig::load(&self.layout)?;
        let config_path = self.layout.config_path();
        if let Ok(mode) = mode_of(&config_path)
            && mode & 0o077 != 0
        {
            warn!("{} is accessible to other users (mode {mode:o})", config_path.display());
        }

        let share = ShareDescriptor {
            auth_secret: config.password.clone().unwrap_or_default(),
            server_address: lookup_public_address(self.fetcher, &self.settings.ip_endpoints),
            listen_port: config.listen_port.unwrap_or(DEFAULT_LISTEN_PORT),
            node_name: DEFAULT_NODE_NAME.to_string(),
        };

        let certificate = config.cert_path.as_ref().and_then(|path| {
            let path = self.layout.resolve(&path.to_string_lossy());
            CertificateSummary::load(&path)
                .map_err(|e| debug!("cannot summarize {}: {e}", path.display()))
                .ok()
        });

        let controller = controller_for(detect_family(&self.layout), &self.layout, self.runner);
        let service_active = controller.is_active().unwrap_or(false);

        Ok(InspectReport {
            config,
            share,
            certificate,
            service_active,
        })
    }

    /// Ask for a new shortcut name and move (or create) the shortcut.
    pub fn rename_shortcut(&self, prompter: &mut dyn Prompter) -> Result<RenameOutcome> {
        let current = &self.settings.shortcut_name;
        let new_name = ask_until(
            prompter,
            "New shortcut name",
            Some(current.as_str()),
            parse_command_name,
        )?;
        shortcut::rename_shortcut(
            &self.layout,
            current,
            &new_name,
            &self.settings.shortcut_source_url,
        )
    }
}

fn install_progress() -> ProgressBar {
    let pb = ProgressBar::new(InstallState::STEPS);
    if let Ok(style) =
        ProgressStyle::default_bar().template("\n[{bar:40.cyan/blue}] {pos}/{len}  {msg}\n")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb
}
